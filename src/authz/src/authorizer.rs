//! Pre-call authorization
//!
//! Only image pulls are policy-checked; every other call is allowed here.
//! Malformed request URIs are denied.

use crate::error::Result;
use crate::image::ImageReference;
use crate::plugin::PluginRequest;
use crate::resolver::PolicyResolver;
use crate::types::{AuthorizationVerdict, ResourceType};
use crate::uri::RequestUri;
use tracing::{debug, info};

/// Query parameter naming the image being pulled
pub const FROM_IMAGE_PARAM: &str = "fromImage";

/// Query parameter carrying the tag when `fromImage` has none
pub const TAG_PARAM: &str = "tag";

/// Denial text for a request URI that cannot be parsed
pub const QUERY_PARSE_ERROR: &str = "Could not parse URL query";

/// What a pre-call request asks for, as far as policy is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreCallKind {
    /// Pull of an image; `raw` is the identifier exactly as sent
    ImagePull { raw: String, image: ImageReference },
    /// Anything else
    Other,
}

impl PreCallKind {
    /// Classify a parsed request
    pub fn classify(uri: &RequestUri) -> Self {
        match uri.param(FROM_IMAGE_PARAM) {
            Some(raw) => PreCallKind::ImagePull {
                raw: raw.to_string(),
                image: ImageReference::parse(raw).with_default_tag(uri.param(TAG_PARAM)),
            },
            None => PreCallKind::Other,
        }
    }
}

/// Decides whether an inbound call may proceed
#[derive(Clone)]
pub struct PreCallAuthorizer {
    resolver: PolicyResolver,
}

impl PreCallAuthorizer {
    pub fn new(resolver: PolicyResolver) -> Self {
        Self { resolver }
    }

    /// Verdict for a request whose URI could not be parsed
    fn malformed() -> AuthorizationVerdict {
        AuthorizationVerdict::deny(QUERY_PARSE_ERROR)
    }

    /// Parse and evaluate a raw plugin request
    pub async fn authorize(&self, request: &PluginRequest) -> Result<AuthorizationVerdict> {
        match RequestUri::parse(&request.request_uri) {
            Ok(uri) => self.evaluate(&request.user, &uri).await,
            Err(e) => {
                debug!(uri = %request.request_uri, error = %e, "rejecting malformed request URI");
                Ok(Self::malformed())
            }
        }
    }

    /// Evaluate an already-parsed request for `subject`
    ///
    /// `Err` means the policy store failed, not that the call was denied.
    pub async fn evaluate(&self, subject: &str, uri: &RequestUri) -> Result<AuthorizationVerdict> {
        let (raw, image) = match PreCallKind::classify(uri) {
            PreCallKind::ImagePull { raw, image } => (raw, image),
            PreCallKind::Other => return Ok(AuthorizationVerdict::allow()),
        };

        if self.resolver.is_image_pull_allowed(subject, &image).await? {
            return Ok(AuthorizationVerdict::allow());
        }

        info!(subject, image = %raw, "image pull denied");
        Ok(AuthorizationVerdict::deny_resource(
            format!("Image {} is not allowed to be pulled", raw),
            ResourceType::Image,
            raw,
        ))
    }
}
