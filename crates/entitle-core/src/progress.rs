//! Progress reporting for long-running activations.

/// Receiver of progress signals supplied by the caller.
pub trait ProgressSink {
    /// Called once, before activation starts.
    fn set_total(&mut self, total_steps: usize);

    /// Called when a step starts. `done_steps` counts completed steps.
    fn progress(&mut self, done_steps: usize, total_steps: usize, message: &str);

    /// Called once after the whole operation succeeded.
    fn finish(&mut self);
}

/// Wraps an optional [`ProgressSink`]; every signal is a no-op without one.
pub struct ProgressRelay<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
    total_steps: usize,
    done_steps: usize,
    finished: bool,
}

impl<'a> ProgressRelay<'a> {
    pub fn new(sink: Option<&'a mut dyn ProgressSink>) -> Self {
        Self {
            sink,
            total_steps: 0,
            done_steps: 0,
            finished: false,
        }
    }

    /// A relay that discards everything.
    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn set_total(&mut self, total_steps: usize) {
        self.total_steps = total_steps;
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.set_total(total_steps);
        }
    }

    /// Announce the next step and count the previous one as done.
    pub fn step(&mut self, message: &str) {
        let done = self.done_steps;
        self.done_steps += 1;
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.progress(done, self.total_steps, message);
        }
    }

    /// Forward a raw progress signal unchanged.
    pub fn progress(&mut self, done_steps: usize, total_steps: usize, message: &str) {
        self.done_steps = done_steps;
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.progress(done_steps, total_steps, message);
        }
    }

    /// Signal completion. Repeated calls are ignored.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.finish();
        }
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn done_steps(&self) -> usize {
        self.done_steps
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Sink that records every signal; useful for callers that render later.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingProgress {
    pub total: Option<usize>,
    pub steps: Vec<(usize, usize, String)>,
    pub finish_calls: usize,
}

impl ProgressSink for RecordingProgress {
    fn set_total(&mut self, total_steps: usize) {
        self.total = Some(total_steps);
    }

    fn progress(&mut self, done_steps: usize, total_steps: usize, message: &str) {
        self.steps
            .push((done_steps, total_steps, message.to_string()));
    }

    fn finish(&mut self) {
        self.finish_calls += 1;
    }
}
