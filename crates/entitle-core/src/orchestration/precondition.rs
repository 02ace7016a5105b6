//! Checks that run before any host state is touched.

use std::collections::BTreeSet;

use crate::error::EnableError;
use crate::host::HostFacts;
use crate::types::EnableRequest;

/// Services that must never be enabled through the API by default.
pub const DEFAULT_EXCLUDED_SERVICES: &[&str] = &["landscape"];

/// Which services may be enabled through this path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnablePolicy {
    excluded_services: BTreeSet<String>,
}

impl Default for EnablePolicy {
    fn default() -> Self {
        Self::with_excluded(DEFAULT_EXCLUDED_SERVICES.iter().map(|s| s.to_string()))
    }
}

impl EnablePolicy {
    pub fn with_excluded<I>(services: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            excluded_services: services.into_iter().collect(),
        }
    }

    pub fn is_excluded(&self, service: &str) -> bool {
        self.excluded_services.contains(service)
    }

    pub fn excluded_services(&self) -> &BTreeSet<String> {
        &self.excluded_services
    }
}

/// Validate privilege, then attachment, then the exclusion policy.
///
/// The order is fixed: a caller that is both unprivileged and asking for an
/// excluded service gets [`EnableError::NonRootUser`].
pub fn check_preconditions(
    facts: &dyn HostFacts,
    policy: &EnablePolicy,
    request: &EnableRequest,
) -> Result<(), EnableError> {
    if !facts.is_privileged() {
        return Err(EnableError::NonRootUser);
    }
    if !facts.is_attached()? {
        return Err(EnableError::Unattached);
    }
    if policy.is_excluded(request.service()) {
        return Err(EnableError::NotSupported {
            service: request.service().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Facts {
        privileged: bool,
        attached: bool,
    }

    impl HostFacts for Facts {
        fn is_privileged(&self) -> bool {
            self.privileged
        }

        fn is_attached(&self) -> anyhow::Result<bool> {
            Ok(self.attached)
        }
    }

    fn check(privileged: bool, attached: bool, service: &str) -> Result<(), EnableError> {
        let request = EnableRequest::new(service).expect("request should be valid");
        check_preconditions(
            &Facts {
                privileged,
                attached,
            },
            &EnablePolicy::default(),
            &request,
        )
    }

    #[test]
    fn test_check_order() {
        assert!(matches!(
            check(false, false, "landscape"),
            Err(EnableError::NonRootUser)
        ));
        assert!(matches!(
            check(true, false, "landscape"),
            Err(EnableError::Unattached)
        ));
        assert!(matches!(
            check(true, true, "landscape"),
            Err(EnableError::NotSupported { .. })
        ));
        assert!(check(true, true, "usg").is_ok());
    }

    #[test]
    fn test_custom_policy() {
        let policy = EnablePolicy::with_excluded(vec!["livepatch".to_string()]);
        assert!(policy.is_excluded("livepatch"));
        assert!(!policy.is_excluded("landscape"));
    }
}
