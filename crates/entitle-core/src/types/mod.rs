//! Request and result value types for the enable operation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::EnableError;

/// Options for enabling one service.
///
/// Fields are private so a constructed request is always valid: the service
/// name is non-empty and an empty variant is normalized to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEnableRequest")]
pub struct EnableRequest {
    service: String,
    variant: Option<String>,
    access_only: bool,
}

/// Wire shape of [`EnableRequest`]; rejects unknown keys.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnableRequest {
    service: String,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    access_only: bool,
}

impl TryFrom<RawEnableRequest> for EnableRequest {
    type Error = EnableError;

    fn try_from(raw: RawEnableRequest) -> Result<Self, Self::Error> {
        Ok(EnableRequest::new(raw.service)?
            .with_variant(raw.variant)
            .with_access_only(raw.access_only))
    }
}

impl EnableRequest {
    pub const FIELDS: [&'static str; 3] = ["service", "variant", "access_only"];

    /// Create a request for `service`.
    pub fn new(service: impl Into<String>) -> Result<Self, EnableError> {
        let service = service.into();
        if service.trim().is_empty() {
            return Err(EnableError::InvalidOptions(
                "'service' must be a non-empty string".to_string(),
            ));
        }
        Ok(Self {
            service,
            variant: None,
            access_only: false,
        })
    }

    /// Select a variant. Empty strings mean "no variant".
    pub fn with_variant(mut self, variant: Option<String>) -> Self {
        self.variant = variant.filter(|v| !v.is_empty());
        self
    }

    pub fn with_access_only(mut self, access_only: bool) -> Self {
        self.access_only = access_only;
        self
    }

    /// Parse `key=value` pairs as given on the command line.
    ///
    /// Unknown keys, repeated keys, pairs without `=` and a missing `service`
    /// are all rejected.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, EnableError> {
        let mut pairs: BTreeMap<&str, &str> = BTreeMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                EnableError::InvalidOptions(format!("expected key=value, got '{}'", arg))
            })?;
            let key = key.trim();
            if !Self::FIELDS.contains(&key) {
                return Err(EnableError::InvalidOptions(format!(
                    "unexpected field '{}' (expected one of: {})",
                    key,
                    Self::FIELDS.join(", ")
                )));
            }
            if pairs.insert(key, value).is_some() {
                return Err(EnableError::InvalidOptions(format!(
                    "field '{}' given more than once",
                    key
                )));
            }
        }

        let service = pairs
            .get("service")
            .ok_or_else(|| EnableError::InvalidOptions("missing field 'service'".to_string()))?;
        let access_only = match pairs.get("access_only") {
            None => false,
            Some(value) => parse_bool(value).ok_or_else(|| {
                EnableError::InvalidOptions(format!(
                    "'access_only' must be a boolean, got '{}'",
                    value
                ))
            })?,
        };

        Ok(Self::new(*service)?
            .with_variant(pairs.get("variant").map(|v| v.to_string()))
            .with_access_only(access_only))
    }

    /// Parse a JSON object such as `{"service": "usg"}`.
    pub fn from_json(data: &str) -> Result<Self, EnableError> {
        serde_json::from_str(data).map_err(|e| EnableError::InvalidOptions(e.to_string()))
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn access_only(&self) -> bool {
        self.access_only
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Outcome of a successful enable call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableResult {
    /// Services that became enabled during this call.
    pub enabled: BTreeSet<String>,
    /// Services that became disabled during this call.
    pub disabled: BTreeSet<String>,
    pub reboot_required: bool,
    /// Informational messages, in the order the service declared them.
    pub messages: Vec<String>,
}

impl EnableResult {
    /// Result for a service that was already enabled.
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self) -> bool {
        self.enabled.is_empty()
            && self.disabled.is_empty()
            && !self.reboot_required
            && self.messages.is_empty()
    }
}

/// Why an activation strategy reported failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReason {
    pub message: Option<String>,
}

impl FailureReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    /// A failure without any explanation.
    pub fn unclassified() -> Self {
        Self { message: None }
    }
}
