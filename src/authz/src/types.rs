//! Core authorization types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Message key carrying the human-readable denial reason
pub const MSG_TEXT: &str = "text";

/// Message key naming the kind of resource that triggered a denial
pub const MSG_RESOURCE_TYPE: &str = "resource_type";

/// Message key naming the resource that triggered a denial
pub const MSG_RESOURCE_VALUE: &str = "resource_value";

/// Identity used for ownership bookkeeping when the caller is unauthenticated
pub const DEFAULT_OWNER: &str = "root";

/// Kind of resource a policy question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// An image repository path (exact or namespace prefix)
    Image,
    /// A whole registry host
    Registry,
    /// A named configuration switch (e.g. `image_create_official`)
    Config,
}

impl ResourceType {
    /// Name used by the policy store
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Registry => "registry",
            ResourceType::Config => "config",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single question posed to the policy store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyQuery {
    /// Caller identity, passed through unchanged (may be empty)
    pub subject: String,

    /// What kind of resource is being asked about
    pub resource_type: ResourceType,

    /// The resource itself (image path, registry host, config key)
    pub resource_value: String,

    /// Serialized options blob; empty means none
    #[serde(default)]
    pub options: String,
}

impl PolicyQuery {
    /// Create a query without options
    pub fn new(
        subject: impl Into<String>,
        resource_type: ResourceType,
        resource_value: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            resource_type,
            resource_value: resource_value.into(),
            options: String::new(),
        }
    }

    /// Attach a serialized options blob
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }
}

/// Options attached to an image grant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    /// The grant also covers every image beneath the granted path
    #[serde(default)]
    pub sub_images: bool,
}

impl ImageOptions {
    /// Options matching a namespace grant that covers sub-images
    pub fn sub_images() -> Self {
        Self { sub_images: true }
    }

    /// Serialize into the blob form stored alongside grants
    pub fn encode(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Result of a pre-call (or post-call) decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationVerdict {
    /// Whether the call may proceed
    pub allow: bool,

    /// Denial details, present only when `allow == false`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<HashMap<String, String>>,

    /// Internal failure, distinct from a policy denial
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthorizationVerdict {
    /// Allow verdict
    pub fn allow() -> Self {
        Self {
            allow: true,
            message: None,
            error: None,
        }
    }

    /// Deny verdict carrying only a reason
    pub fn deny(text: impl Into<String>) -> Self {
        let mut message = HashMap::new();
        message.insert(MSG_TEXT.to_string(), text.into());

        Self {
            allow: false,
            message: Some(message),
            error: None,
        }
    }

    /// Deny verdict naming the resource that triggered it
    pub fn deny_resource(
        text: impl Into<String>,
        resource_type: ResourceType,
        resource_value: impl Into<String>,
    ) -> Self {
        let mut verdict = Self::deny(text);
        if let Some(message) = verdict.message.as_mut() {
            message.insert(MSG_RESOURCE_TYPE.to_string(), resource_type.to_string());
            message.insert(MSG_RESOURCE_VALUE.to_string(), resource_value.into());
        }
        verdict
    }

    /// System-error verdict; never carries a message
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            allow: false,
            message: None,
            error: Some(error.into()),
        }
    }

    /// Human-readable denial reason, if any
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.get(MSG_TEXT))
            .map(String::as_str)
    }
}

/// Association between a caller identity and a container it created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipRecord {
    /// Identity that created the container
    pub owner: String,

    /// Caller-assigned container name (may be empty)
    pub name: String,

    /// Engine-assigned container id; the record key
    pub id: String,
}

impl OwnershipRecord {
    /// Create a record, mapping an empty owner to the default identity
    pub fn new(owner: &str, name: impl Into<String>, id: impl Into<String>) -> Self {
        let owner = if owner.is_empty() { DEFAULT_OWNER } else { owner };

        Self {
            owner: owner.to_string(),
            name: name.into(),
            id: id.into(),
        }
    }
}
