//! Image pull policy resolution
//!
//! Asks the policy store a fixed sequence of increasingly general questions
//! and stops at the first grant:
//!
//! ```text
//! official image?  → config / image_create_official
//! registry host?   → registry / <host>
//! exact path       → image / <path>
//! parent namespace → image / <parent>  {"sub_images":true}
//! otherwise        → deny
//! ```

use crate::error::Result;
use crate::image::ImageReference;
use crate::policy::PolicyStore;
use crate::types::{ImageOptions, PolicyQuery, ResourceType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Config key granting pulls of official images
pub const IMAGE_CREATE_OFFICIAL: &str = "image_create_official";

/// How far up the namespace tree sub-image grants are looked for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AncestorWalk {
    /// Only the immediate parent namespace
    #[default]
    Parent,
    /// Every enclosing namespace, nearest first
    All,
}

/// Resolves image pull requests against the policy store
#[derive(Clone)]
pub struct PolicyResolver {
    store: Arc<dyn PolicyStore>,
    ancestor_walk: AncestorWalk,
}

impl PolicyResolver {
    /// Create a resolver that checks the immediate parent namespace only
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self {
            store,
            ancestor_walk: AncestorWalk::Parent,
        }
    }

    /// Choose how far sub-image grants are looked for
    pub fn with_ancestor_walk(mut self, ancestor_walk: AncestorWalk) -> Self {
        self.ancestor_walk = ancestor_walk;
        self
    }

    /// May `subject` pull `image`?
    ///
    /// A store failure is an error, not a denial.
    pub async fn is_image_pull_allowed(&self, subject: &str, image: &ImageReference) -> Result<bool> {
        Ok(self.resolve(subject, image).await?.is_some())
    }

    /// Return the first query the store granted, or `None` when denied
    pub async fn resolve(&self, subject: &str, image: &ImageReference) -> Result<Option<PolicyQuery>> {
        let mut session = self.store.open().await?;

        for query in self.candidate_queries(subject, image)? {
            if session.validate(&query).await? {
                debug!(
                    subject,
                    image = %image,
                    resource_type = %query.resource_type,
                    resource_value = %query.resource_value,
                    "image pull granted"
                );
                return Ok(Some(query));
            }
        }

        debug!(subject, image = %image, "no grant covers image pull");
        Ok(None)
    }

    /// Queries in evaluation order
    fn candidate_queries(&self, subject: &str, image: &ImageReference) -> Result<Vec<PolicyQuery>> {
        let mut queries = Vec::with_capacity(4);

        if image.official {
            queries.push(PolicyQuery::new(subject, ResourceType::Config, IMAGE_CREATE_OFFICIAL));
        }

        if !image.registry.is_empty() {
            queries.push(PolicyQuery::new(subject, ResourceType::Registry, image.registry.as_str()));
        }

        queries.push(PolicyQuery::new(subject, ResourceType::Image, image.path.as_str()));

        let options = ImageOptions::sub_images().encode()?;
        let namespaces: Vec<&str> = match self.ancestor_walk {
            AncestorWalk::Parent => image.parent_dir().into_iter().collect(),
            AncestorWalk::All => image.ancestors().collect(),
        };
        for dir in namespaces {
            queries.push(
                PolicyQuery::new(subject, ResourceType::Image, dir).with_options(options.as_str()),
            );
        }

        Ok(queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::InMemoryPolicyStore;

    fn sub_images() -> String {
        ImageOptions::sub_images().encode().unwrap()
    }

    #[tokio::test]
    async fn test_official_image_grant() {
        let store = InMemoryPolicyStore::new();
        store
            .grant(PolicyQuery::new("alice", ResourceType::Config, IMAGE_CREATE_OFFICIAL))
            .await;
        let resolver = PolicyResolver::new(Arc::new(store));

        let allowed = resolver
            .is_image_pull_allowed("alice", &ImageReference::parse("ubuntu"))
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_official_grant_does_not_cover_namespaced_image() {
        let store = InMemoryPolicyStore::new();
        store
            .grant(PolicyQuery::new("alice", ResourceType::Config, IMAGE_CREATE_OFFICIAL))
            .await;
        let resolver = PolicyResolver::new(Arc::new(store));

        let allowed = resolver
            .is_image_pull_allowed("alice", &ImageReference::parse("myorg/app"))
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_registry_grant() {
        let store = InMemoryPolicyStore::new();
        store
            .grant(PolicyQuery::new("alice", ResourceType::Registry, "quay.io"))
            .await;
        let resolver = PolicyResolver::new(Arc::new(store));

        let allowed = resolver
            .is_image_pull_allowed("alice", &ImageReference::parse("quay.io/any/thing:v1"))
            .await
            .unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn test_prefix_grant_covers_child() {
        let store = InMemoryPolicyStore::new();
        store
            .grant(PolicyQuery::new("alice", ResourceType::Image, "myorg").with_options(sub_images()))
            .await;
        let resolver = PolicyResolver::new(Arc::new(store));

        let matched = resolver
            .resolve("alice", &ImageReference::parse("myorg/app"))
            .await
            .unwrap()
            .expect("prefix grant should match");
        assert_eq!(matched.resource_value, "myorg");
    }

    #[tokio::test]
    async fn test_prefix_grant_without_sub_images_does_not_cover_child() {
        let store = InMemoryPolicyStore::new();
        store
            .grant(PolicyQuery::new("alice", ResourceType::Image, "myorg"))
            .await;
        let resolver = PolicyResolver::new(Arc::new(store));

        let allowed = resolver
            .is_image_pull_allowed("alice", &ImageReference::parse("myorg/app"))
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_parent_walk_stops_at_immediate_parent() {
        let store = InMemoryPolicyStore::new();
        store
            .grant(PolicyQuery::new("alice", ResourceType::Image, "myorg").with_options(sub_images()))
            .await;
        let store = Arc::new(store);
        let image = ImageReference::parse("myorg/team/app");

        let parent_only = PolicyResolver::new(store.clone());
        assert!(!parent_only.is_image_pull_allowed("alice", &image).await.unwrap());

        let all = PolicyResolver::new(store).with_ancestor_walk(AncestorWalk::All);
        assert!(all.is_image_pull_allowed("alice", &image).await.unwrap());
    }

    #[test]
    fn test_candidate_order() {
        let resolver = PolicyResolver::new(Arc::new(InMemoryPolicyStore::new()));
        let image = ImageReference::parse("registry.local/team/app");

        let queries = resolver.candidate_queries("bob", &image).unwrap();
        let kinds: Vec<(ResourceType, &str)> = queries
            .iter()
            .map(|q| (q.resource_type, q.resource_value.as_str()))
            .collect();

        assert_eq!(
            kinds,
            vec![
                (ResourceType::Registry, "registry.local"),
                (ResourceType::Image, "team/app"),
                (ResourceType::Image, "team"),
            ]
        );
        assert_eq!(queries[2].options, sub_images());
        assert!(queries[..2].iter().all(|q| q.options.is_empty()));
    }
}
