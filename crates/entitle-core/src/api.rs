//! Machine-facing API surface: endpoint metadata and the JSON response envelope.
//!
//! `entitle api u.pro.services.enable.v1 --args service=usg` prints:
//!
//! ```json
//! {
//!   "_schema_version": "v1",
//!   "data": {
//!     "attributes": {"enabled": ["usg"], "disabled": [], "messages": [], "reboot_required": false},
//!     "meta": {"environment_vars": []},
//!     "type": "EnableService"
//!   },
//!   "errors": [],
//!   "result": "success",
//!   "version": "0.1.0",
//!   "warnings": []
//! }
//! ```

use serde::Serialize;

use crate::commands::EnableCommand;
use crate::error::EnableError;
use crate::progress::ProgressSink;
use crate::types::{EnableRequest, EnableResult};

pub const SCHEMA_VERSION: &str = "v1";

/// Prefix of environment variables echoed back in `data.meta`.
pub const ENV_PREFIX: &str = "ENTITLE_";

/// Static description of an API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub name: &'static str,
    pub version: &'static str,
    pub result_type: &'static str,
    pub supports_progress: bool,
    pub introduced_in: &'static str,
}

pub const ENABLE_SERVICE_V1: Endpoint = Endpoint {
    name: "u.pro.services.enable.v1",
    version: "v1",
    result_type: "EnableService",
    supports_progress: true,
    introduced_in: "32",
};

pub const ENDPOINTS: &[Endpoint] = &[ENABLE_SERVICE_V1];

pub fn find_endpoint(name: &str) -> Option<&'static Endpoint> {
    ENDPOINTS.iter().find(|endpoint| endpoint.name == name)
}

/// How the caller supplied endpoint options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOptions {
    /// `key=value` pairs
    Args(Vec<String>),
    /// A JSON object
    Data(String),
}

impl ApiOptions {
    pub fn parse_enable(&self) -> Result<EnableRequest, EnableError> {
        match self {
            ApiOptions::Args(args) => EnableRequest::from_args(args),
            ApiOptions::Data(data) => EnableRequest::from_json(data),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiErrorEntry {
    pub code: String,
    pub title: String,
    pub meta: serde_json::Value,
}

impl From<&EnableError> for ApiErrorEntry {
    fn from(err: &EnableError) -> Self {
        Self {
            code: err.code().to_string(),
            title: format!("{:#}", err),
            meta: err.meta(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiMeta {
    pub environment_vars: Vec<EnvironmentVar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiData {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
    pub meta: ApiMeta,
}

/// Envelope wrapping every API response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    #[serde(rename = "_schema_version")]
    pub schema_version: String,
    pub data: ApiData,
    pub errors: Vec<ApiErrorEntry>,
    pub result: ApiResult,
    pub version: String,
    pub warnings: Vec<ApiErrorEntry>,
}

impl ApiResponse {
    pub fn success(endpoint: &Endpoint, attributes: serde_json::Value) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            data: ApiData {
                kind: Some(endpoint.result_type.to_string()),
                attributes: Some(attributes),
                meta: environment_meta(),
            },
            errors: Vec::new(),
            result: ApiResult::Success,
            version: env!("CARGO_PKG_VERSION").to_string(),
            warnings: Vec::new(),
        }
    }

    pub fn failure(err: &EnableError) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            data: ApiData {
                kind: None,
                attributes: None,
                meta: environment_meta(),
            },
            errors: vec![ApiErrorEntry::from(err)],
            result: ApiResult::Failure,
            version: env!("CARGO_PKG_VERSION").to_string(),
            warnings: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == ApiResult::Success
    }
}

fn environment_meta() -> ApiMeta {
    let mut environment_vars: Vec<EnvironmentVar> = std::env::vars()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX))
        .map(|(name, value)| EnvironmentVar { name, value })
        .collect();
    environment_vars.sort_by(|a, b| a.name.cmp(&b.name));
    ApiMeta { environment_vars }
}

/// Envelope for a finished enable call.
pub fn enable_response(outcome: &Result<EnableResult, EnableError>) -> ApiResponse {
    match outcome {
        Ok(result) => match serde_json::to_value(result) {
            Ok(attributes) => ApiResponse::success(&ENABLE_SERVICE_V1, attributes),
            Err(err) => ApiResponse::failure(&EnableError::Unexpected(err.into())),
        },
        Err(err) => ApiResponse::failure(err),
    }
}

/// Run `u.pro.services.enable.v1` and wrap the outcome in an envelope.
pub fn call_enable(
    command: &EnableCommand,
    options: &ApiOptions,
    progress: Option<&mut dyn ProgressSink>,
) -> ApiResponse {
    let outcome = options
        .parse_enable()
        .and_then(|request| command.execute(&request, progress));
    enable_response(&outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_endpoint() {
        let endpoint = find_endpoint("u.pro.services.enable.v1").expect("endpoint should exist");
        assert!(endpoint.supports_progress);
        assert_eq!(endpoint.result_type, "EnableService");
        assert!(find_endpoint("u.pro.services.disable.v1").is_none());
    }

    #[test]
    fn test_success_envelope() {
        let mut result = EnableResult::unchanged();
        result.enabled.insert("usg".to_string());
        let response = enable_response(&Ok(result));
        let json = serde_json::to_value(&response).expect("serialize should succeed");

        assert_eq!(json["_schema_version"], "v1");
        assert_eq!(json["result"], "success");
        assert_eq!(json["data"]["type"], "EnableService");
        assert_eq!(
            json["data"]["attributes"],
            serde_json::json!({
                "enabled": ["usg"],
                "disabled": [],
                "reboot_required": false,
                "messages": [],
            })
        );
        assert_eq!(json["errors"], serde_json::json!([]));
    }

    #[test]
    fn test_failure_envelope() {
        let err = EnableError::EntitlementNotEnabled {
            service: "usg".to_string(),
            reason: "disk full".to_string(),
        };
        let response = enable_response(&Err(err));
        assert!(!response.is_success());
        let json = serde_json::to_value(&response).expect("serialize should succeed");
        assert_eq!(json["result"], "failure");
        assert_eq!(json["errors"][0]["code"], "entitlement-not-enabled");
        assert_eq!(json["errors"][0]["title"], "could not enable usg: disk full");
        assert_eq!(json["errors"][0]["meta"]["reason"], "disk full");
        assert!(json["data"].get("attributes").is_none());
    }

    #[test]
    fn test_options_parse() {
        let args = ApiOptions::Args(vec!["service=usg".to_string()]);
        assert_eq!(
            args.parse_enable().expect("args should parse").service(),
            "usg"
        );
        let data = ApiOptions::Data(r#"{"service": "fips", "variant": "updates"}"#.to_string());
        assert_eq!(
            data.parse_enable().expect("data should parse").variant(),
            Some("updates")
        );
    }
}
