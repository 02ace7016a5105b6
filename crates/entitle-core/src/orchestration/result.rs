//! Builds the final [`EnableResult`].

use crate::entitlement::Activation;
use crate::orchestration::reconcile::StateDiff;
use crate::types::EnableResult;

pub fn assemble_result(diff: StateDiff, activation: &dyn Activation) -> EnableResult {
    let messages = activation
        .post_enable_messages()
        .into_iter()
        .filter_map(|message| match message {
            serde_json::Value::String(text) => Some(text),
            _ => None,
        })
        .collect();

    EnableResult {
        enabled: diff.enabled,
        disabled: diff.disabled,
        reboot_required: activation.reboot_required(),
        messages,
    }
}
