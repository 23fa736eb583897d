//! Wire types of the container engine's authorization plugin protocol
//!
//! The engine POSTs the same request shape to `/AuthZPlugin.AuthZReq` before a
//! call and to `/AuthZPlugin.AuthZRes` after it; the response fields are only
//! populated on the second.

use crate::types::AuthorizationVerdict;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handshake response advertising the authz capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateResponse {
    #[serde(rename = "Implements")]
    pub implements: Vec<String>,
}

impl Default for ActivateResponse {
    fn default() -> Self {
        Self {
            implements: vec!["authz".to_string()],
        }
    }
}

/// An API call as seen by the plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginRequest {
    /// Authenticated caller; empty when the engine has no authn configured
    #[serde(rename = "User", default)]
    pub user: String,

    #[serde(rename = "UserAuthNMethod", default)]
    pub user_authn_method: String,

    #[serde(rename = "RequestMethod", default)]
    pub request_method: String,

    #[serde(rename = "RequestURI", default)]
    pub request_uri: String,

    #[serde(rename = "RequestBody", default, with = "base64_bytes")]
    pub request_body: Option<Vec<u8>>,

    #[serde(rename = "RequestHeaders", default)]
    pub request_headers: Option<HashMap<String, String>>,

    /// Zero on the pre-call leg
    #[serde(rename = "ResponseStatusCode", default)]
    pub response_status_code: u16,

    #[serde(rename = "ResponseBody", default, with = "base64_bytes")]
    pub response_body: Option<Vec<u8>>,

    #[serde(rename = "ResponseHeaders", default)]
    pub response_headers: Option<HashMap<String, String>>,
}

impl PluginRequest {
    /// Build a pre-call request
    pub fn new(user: impl Into<String>, method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            request_method: method.into(),
            request_uri: uri.into(),
            ..Default::default()
        }
    }

    /// Attach the outcome of the call, turning this into a post-call request
    pub fn with_response(mut self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.response_status_code = status;
        self.response_body = Some(body.into());
        self
    }

    /// Response body, empty when absent
    pub fn response_body(&self) -> &[u8] {
        self.response_body.as_deref().unwrap_or_default()
    }
}

/// Plugin answer to either leg
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginResponse {
    #[serde(rename = "Allow")]
    pub allow: bool,

    #[serde(rename = "Msg", default, skip_serializing_if = "String::is_empty")]
    pub msg: String,

    #[serde(rename = "Err", default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

impl From<AuthorizationVerdict> for PluginResponse {
    fn from(verdict: AuthorizationVerdict) -> Self {
        Self {
            allow: verdict.allow,
            msg: verdict.text().unwrap_or_default().to_string(),
            err: verdict.error.unwrap_or_default(),
        }
    }
}

/// `[]byte` fields travel as base64 strings (or `null`)
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
