//! Post-call ownership bookkeeping
//!
//! Correlates a successful container create with the identity that asked for
//! it, and forgets that association when the container is deleted. The call
//! has already completed by the time this runs, so nothing here can deny it:
//! failures are logged and dropped.

use crate::endpoints::Endpoints;
use crate::error::{AuthzError, Result};
use crate::ownership::OwnershipStore;
use crate::plugin::PluginRequest;
use crate::types::{AuthorizationVerdict, OwnershipRecord};
use crate::uri::RequestUri;
use http::{Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Query parameter carrying the caller-assigned container name
pub const NAME_PARAM: &str = "name";

/// Collection segment of per-container paths
const CONTAINERS_SEGMENT: &str = "containers";

/// Body of a successful container create
#[derive(Debug, Deserialize)]
struct CreatedBody {
    #[serde(rename = "Id")]
    id: String,
}

/// What a completed call means for ownership
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostCallEvent {
    /// A container was created
    Created(OwnershipRecord),
    /// A container was deleted
    Removed(OwnershipRecord),
    /// Nothing to record
    Other,
}

/// Issues ownership store commands for completed calls
#[derive(Clone)]
pub struct OwnershipTracker {
    store: Arc<dyn OwnershipStore>,
    endpoints: Arc<Endpoints>,
}

impl OwnershipTracker {
    pub fn new(store: Arc<dyn OwnershipStore>, endpoints: Arc<Endpoints>) -> Self {
        Self { store, endpoints }
    }

    /// Decide what, if anything, a completed call means for ownership
    ///
    /// `Err` only when a create response body cannot be read.
    pub fn classify(&self, request: &PluginRequest, uri: &RequestUri) -> Result<PostCallEvent> {
        let status = request.response_status_code;
        let name = uri.param(NAME_PARAM).unwrap_or_default();

        if status == StatusCode::CREATED.as_u16() && self.endpoints.is_container_create(uri.path()) {
            let body: CreatedBody = serde_json::from_slice(request.response_body())?;
            if body.id.is_empty() {
                return Err(AuthzError::InvalidInput(
                    "container create response has an empty Id".to_string(),
                ));
            }
            return Ok(PostCallEvent::Created(OwnershipRecord::new(
                &request.user,
                name,
                body.id,
            )));
        }

        if status == StatusCode::NO_CONTENT.as_u16()
            && request.request_method.eq_ignore_ascii_case(Method::DELETE.as_str())
            && self.endpoints.is_container_item(uri.path())
        {
            // api version / collection / id
            let segments = uri.segments();
            if segments.len() < 3 || segments[1] != CONTAINERS_SEGMENT {
                return Ok(PostCallEvent::Other);
            }
            return Ok(PostCallEvent::Removed(OwnershipRecord::new(
                &request.user,
                name,
                segments[2],
            )));
        }

        Ok(PostCallEvent::Other)
    }

    /// Record the effect of a completed call. Always allows.
    pub async fn observe(&self, request: &PluginRequest) -> AuthorizationVerdict {
        let uri = match RequestUri::parse(&request.request_uri) {
            Ok(uri) => uri,
            Err(e) => {
                warn!(uri = %request.request_uri, error = %e, "skipping bookkeeping for unparseable URI");
                return AuthorizationVerdict::allow();
            }
        };

        let event = match self.classify(request, &uri) {
            Ok(event) => event,
            Err(e) => {
                warn!(path = %uri.path(), error = %e, "skipping bookkeeping for unreadable create response");
                return AuthorizationVerdict::allow();
            }
        };

        if let Err(e) = self.apply(&event).await {
            warn!(error = %e, "ownership store command failed");
        }

        AuthorizationVerdict::allow()
    }

    async fn apply(&self, event: &PostCallEvent) -> Result<()> {
        match event {
            PostCallEvent::Created(record) => {
                info!(owner = %record.owner, name = %record.name, container_id = %record.id, "container created");
                self.store.set_owner(record).await
            }
            PostCallEvent::Removed(record) => {
                info!(owner = %record.owner, container_id = %record.id, "container removed");
                self.store.remove_owner(record).await
            }
            PostCallEvent::Other => {
                debug!("no ownership change");
                Ok(())
            }
        }
    }
}
