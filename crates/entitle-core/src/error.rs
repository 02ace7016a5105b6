//! Error taxonomy surfaced by the enable operation.

use thiserror::Error;

/// Generic reason used when an activation strategy fails without explaining why.
pub const GENERIC_UNKNOWN_ISSUE: &str = "an unknown issue happened";

/// Errors returned to callers of [`crate::orchestration::EnableOrchestrator::enable`].
///
/// Every variant maps to a stable machine-readable code (see [`EnableError::code`])
/// used by the JSON API envelope.
#[derive(Debug, Error)]
pub enum EnableError {
    /// Request options failed schema validation.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// The caller does not have elevated privilege.
    #[error("this command must be run as root (try using sudo)")]
    NonRootUser,

    /// The host is not attached to a subscription.
    #[error("this machine is not attached to a subscription")]
    Unattached,

    /// The service may not be enabled through this path.
    #[error("enabling '{service}' is not supported through the API")]
    NotSupported { service: String },

    /// Unknown service name or unknown variant of a known service.
    #[error("{}", not_found_message(.service, .variant))]
    EntitlementNotFound {
        service: String,
        variant: Option<String>,
    },

    /// Another mutating operation holds the host-wide lock.
    #[error("unable to obtain the lock: operation in progress: {holder} (pid: {pid})")]
    LockHeld { holder: String, pid: u32 },

    /// The activation strategy ran but did not succeed.
    #[error("could not enable {service}: {reason}")]
    EntitlementNotEnabled { service: String, reason: String },

    /// Any failure outside the enumerated taxonomy.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl EnableError {
    /// Stable error code for machine consumers.
    pub fn code(&self) -> &'static str {
        match self {
            EnableError::InvalidOptions(_) => "invalid-options",
            EnableError::NonRootUser => "nonroot-user",
            EnableError::Unattached => "unattached",
            EnableError::NotSupported { .. } => "not-supported",
            EnableError::EntitlementNotFound { .. } => "entitlement-not-found",
            EnableError::LockHeld { .. } => "lock-held",
            EnableError::EntitlementNotEnabled { .. } => "entitlement-not-enabled",
            EnableError::Unexpected(_) => "generic-error",
        }
    }

    /// Whether a caller may retry the same request after backing off.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EnableError::LockHeld { .. } | EnableError::EntitlementNotEnabled { .. }
        )
    }

    /// Structured details for the API envelope's `meta` object.
    pub fn meta(&self) -> serde_json::Value {
        match self {
            EnableError::NotSupported { service } => serde_json::json!({ "service": service }),
            EnableError::EntitlementNotFound { service, variant } => {
                serde_json::json!({ "service": service, "variant": variant })
            }
            EnableError::LockHeld { holder, pid } => {
                serde_json::json!({ "lock_holder": holder, "pid": pid })
            }
            EnableError::EntitlementNotEnabled { service, reason } => {
                serde_json::json!({ "service": service, "reason": reason })
            }
            _ => serde_json::json!({}),
        }
    }
}

fn not_found_message(service: &str, variant: &Option<String>) -> String {
    match variant {
        Some(variant) => format!("'{}' is not a valid variant of '{}'", variant, service),
        None => format!("could not find entitlement named '{}'", service),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(EnableError::NonRootUser.code(), "nonroot-user");
        assert_eq!(EnableError::Unattached.code(), "unattached");
        assert_eq!(
            EnableError::LockHeld {
                holder: "x".to_string(),
                pid: 1
            }
            .code(),
            "lock-held"
        );
    }

    #[test]
    fn test_not_found_message_mentions_variant() {
        let err = EnableError::EntitlementNotFound {
            service: "fips".to_string(),
            variant: Some("bogus".to_string()),
        };
        assert_eq!(err.to_string(), "'bogus' is not a valid variant of 'fips'");
    }

    #[test]
    fn test_only_lock_and_activation_failures_are_retriable() {
        assert!(
            EnableError::LockHeld {
                holder: "x".to_string(),
                pid: 1
            }
            .is_retriable()
        );
        assert!(!EnableError::NonRootUser.is_retriable());
        assert!(
            !EnableError::NotSupported {
                service: "landscape".to_string()
            }
            .is_retriable()
        );
    }
}
