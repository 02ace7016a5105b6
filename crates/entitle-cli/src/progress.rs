//! Terminal progress output.

use std::io::Write;

use console::style;

use entitle_core::progress::ProgressSink;

/// Writes `[done/total] message` lines as activation steps complete.
pub struct TerminalProgress<W: Write> {
    writer: W,
    total: usize,
}

impl TerminalProgress<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> TerminalProgress<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, total: 0 }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ProgressSink for TerminalProgress<W> {
    fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    fn progress(&mut self, done: usize, total: usize, message: &str) {
        let counter = format!("[{done}/{total}]");
        // Progress is best-effort; a closed stderr must not fail the operation.
        let _ = writeln!(self.writer, "{} {}", style(counter).dim(), message);
    }

    fn finish(&mut self) {
        if self.total > 0 {
            let _ = writeln!(self.writer, "{}", style("done").green());
        }
        let _ = self.writer.flush();
    }
}
