//! Request dispatcher
//!
//! Single entry point for both legs of an engine API call.
//!
//! ```text
//! AuthZReq → skip list? → PreCallAuthorizer → verdict
//!              ↓ raw path      ↓ malformed  ↓ store failure
//!            allow           deny         error verdict
//!
//! AuthZRes → OwnershipTracker → allow
//! ```
//!
//! Holds no mutable state; one dispatcher serves every call concurrently.

use crate::authorizer::PreCallAuthorizer;
use crate::config::AuthorizationConfig;
use crate::endpoints::Endpoints;
use crate::error::Result;
use crate::ownership::OwnershipStore;
use crate::plugin::PluginRequest;
use crate::policy::PolicyStore;
use crate::resolver::PolicyResolver;
use crate::tracker::OwnershipTracker;
use crate::types::AuthorizationVerdict;
use crate::uri::split_target;
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

/// Routes plugin calls to the authorizer or the ownership tracker
#[derive(Clone)]
pub struct Dispatcher {
    endpoints: Arc<Endpoints>,
    authorizer: PreCallAuthorizer,
    tracker: OwnershipTracker,
}

impl Dispatcher {
    /// Assemble a dispatcher from its parts
    pub fn new(endpoints: Arc<Endpoints>, authorizer: PreCallAuthorizer, tracker: OwnershipTracker) -> Self {
        Self {
            endpoints,
            authorizer,
            tracker,
        }
    }

    /// Wire up a dispatcher from configuration and the two stores
    pub fn from_config(
        config: &AuthorizationConfig,
        policy_store: Arc<dyn PolicyStore>,
        ownership_store: Arc<dyn OwnershipStore>,
    ) -> Result<Self> {
        let endpoints = Arc::new(
            Endpoints::new(config.skip_endpoints.as_slice())?.with_options_bypass(config.bypass_options),
        );
        let resolver = PolicyResolver::new(policy_store).with_ancestor_walk(config.ancestor_walk);

        Ok(Self::new(
            endpoints.clone(),
            PreCallAuthorizer::new(resolver),
            OwnershipTracker::new(ownership_store, endpoints),
        ))
    }

    /// Decide whether a call may proceed
    pub async fn handle_pre_call(&self, request: &PluginRequest) -> AuthorizationVerdict {
        let span = info_span!(
            "pre_call",
            request_id = %Uuid::new_v4(),
            method = %request.request_method,
            subject = %request.user,
        );

        async {
            let (path, _) = split_target(&request.request_uri);
            if self.endpoints.is_skipped(&request.request_method, path) {
                debug!(path, "skipped endpoint");
                return AuthorizationVerdict::allow();
            }

            match self.authorizer.authorize(request).await {
                Ok(verdict) => verdict,
                Err(e) => {
                    error!(path, error = %e, "policy evaluation failed");
                    AuthorizationVerdict::error(e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Record the effects of a completed call. Always allows.
    pub async fn handle_post_call(&self, request: &PluginRequest) -> AuthorizationVerdict {
        let span = info_span!(
            "post_call",
            request_id = %Uuid::new_v4(),
            method = %request.request_method,
            status = request.response_status_code,
        );

        self.tracker.observe(request).instrument(span).await
    }
}
