//! # HBM Authorization Plugin
//!
//! Authorization interceptor for a container engine's management API.
//!
//! Every API call reaches the plugin twice:
//!
//! - **before** it runs, to be allowed or denied. Image pulls are checked
//!   against a policy store with a fixed, first-match-wins sequence of
//!   questions (official image, registry, exact path, parent namespace);
//!   everything else is allowed.
//! - **after** it runs, so successful container creates and deletes can be
//!   recorded against the calling identity in an ownership store.
//!
//! Both stores are capabilities ([`PolicyStore`], [`OwnershipStore`]) with
//! in-memory and PostgreSQL implementations.
//!
//! ## Example
//!
//! ```rust
//! use hbm_authz::{
//!     AuthorizationConfig, Dispatcher, InMemoryOwnershipStore, InMemoryPolicyStore,
//!     PluginRequest, PolicyQuery, ResourceType,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let policies = InMemoryPolicyStore::new();
//!     policies
//!         .grant(PolicyQuery::new("alice", ResourceType::Config, "image_create_official"))
//!         .await;
//!
//!     let dispatcher = Dispatcher::from_config(
//!         &AuthorizationConfig::default(),
//!         Arc::new(policies),
//!         Arc::new(InMemoryOwnershipStore::new()),
//!     )?;
//!
//!     let request = PluginRequest::new("alice", "POST", "/v1.40/images/create?fromImage=ubuntu");
//!     let verdict = dispatcher.handle_pre_call(&request).await;
//!
//!     if verdict.allow {
//!         println!("Pull granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod authorizer;
pub mod config;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
pub mod image;
pub mod ownership;
pub mod plugin;
pub mod policy;
pub mod resolver;
pub mod tracker;
pub mod types;
pub mod uri;

// Re-export commonly used types
pub use authorizer::PreCallAuthorizer;
pub use config::{AuthorizationConfig, PluginConfig, StorageBackend, StorageConfig};
pub use dispatcher::Dispatcher;
pub use endpoints::Endpoints;
pub use error::{AuthzError, Result};
pub use image::ImageReference;
pub use ownership::{InMemoryOwnershipStore, OwnershipStore};
pub use plugin::{ActivateResponse, PluginRequest, PluginResponse};
pub use policy::{InMemoryPolicyStore, PolicySession, PolicyStore};
pub use resolver::{AncestorWalk, PolicyResolver};
pub use tracker::OwnershipTracker;
pub use types::{AuthorizationVerdict, ImageOptions, OwnershipRecord, PolicyQuery, ResourceType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
