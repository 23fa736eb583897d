//! Policy resolution against stub stores

mod common;

use common::{BrokenPolicyStore, RecordingPolicyStore};
use hbm_authz::resolver::IMAGE_CREATE_OFFICIAL;
use hbm_authz::{
    AncestorWalk, AuthzError, ImageOptions, ImageReference, InMemoryPolicyStore, PolicyQuery,
    PolicyResolver, ResourceType,
};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Evaluation order
// ============================================================================

#[tokio::test]
async fn test_denied_pull_asks_every_question_once_in_one_session() {
    let store = RecordingPolicyStore::denying();
    let resolver = PolicyResolver::new(Arc::new(store.clone()));

    let allowed = resolver
        .is_image_pull_allowed("bob", &ImageReference::parse("registry.local/team/app:1.0"))
        .await
        .unwrap();
    assert!(!allowed);

    let queries = store.queries();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0], PolicyQuery::new("bob", ResourceType::Registry, "registry.local"));
    assert_eq!(queries[1], PolicyQuery::new("bob", ResourceType::Image, "team/app"));
    assert_eq!(
        queries[2],
        PolicyQuery::new("bob", ResourceType::Image, "team")
            .with_options(ImageOptions::sub_images().encode().unwrap())
    );

    assert_eq!(store.opened(), 1);
    assert_eq!(store.closed(), 1);
}

#[tokio::test]
async fn test_official_grant_stops_evaluation() {
    let store = RecordingPolicyStore::new(|_, q| q.resource_type == ResourceType::Config);
    let resolver = PolicyResolver::new(Arc::new(store.clone()));

    let matched = resolver
        .resolve("alice", &ImageReference::parse("ubuntu"))
        .await
        .unwrap()
        .expect("official grant should match");

    assert_eq!(matched.resource_value, IMAGE_CREATE_OFFICIAL);
    assert_eq!(store.queries().len(), 1);
    assert_eq!(store.closed(), 1);
}

#[tokio::test]
async fn test_official_image_skips_registry_and_parent() {
    let store = RecordingPolicyStore::denying();
    let resolver = PolicyResolver::new(Arc::new(store.clone()));

    resolver
        .is_image_pull_allowed("alice", &ImageReference::parse("ubuntu"))
        .await
        .unwrap();

    let kinds: Vec<ResourceType> = store.queries().iter().map(|q| q.resource_type).collect();
    assert_eq!(kinds, vec![ResourceType::Config, ResourceType::Image]);
}

#[tokio::test]
async fn test_unauthenticated_subject_is_passed_through() {
    let store = RecordingPolicyStore::denying();
    let resolver = PolicyResolver::new(Arc::new(store.clone()));

    resolver
        .is_image_pull_allowed("", &ImageReference::parse("myorg/app"))
        .await
        .unwrap();

    assert!(store.queries().iter().all(|q| q.subject.is_empty()));
}

#[tokio::test]
async fn test_all_ancestors_nearest_first() {
    let store = RecordingPolicyStore::denying();
    let resolver =
        PolicyResolver::new(Arc::new(store.clone())).with_ancestor_walk(AncestorWalk::All);

    resolver
        .is_image_pull_allowed("alice", &ImageReference::parse("a/b/c/app"))
        .await
        .unwrap();

    let values: Vec<String> = store
        .queries()
        .into_iter()
        .map(|q| q.resource_value)
        .collect();
    assert_eq!(values, vec!["a/b/c/app", "a/b/c", "a/b", "a"]);
}

// ============================================================================
// Grants in the in-memory store
// ============================================================================

#[tokio::test]
async fn test_namespace_grant_scenario() {
    let store = InMemoryPolicyStore::new();
    store
        .grant(
            PolicyQuery::new("alice", ResourceType::Image, "myorg")
                .with_options(ImageOptions::sub_images().encode().unwrap()),
        )
        .await;
    let resolver = PolicyResolver::new(Arc::new(store));

    assert!(resolver
        .is_image_pull_allowed("alice", &ImageReference::parse("myorg/app"))
        .await
        .unwrap());
    assert!(!resolver
        .is_image_pull_allowed("mallory", &ImageReference::parse("myorg/app"))
        .await
        .unwrap());
    assert!(!resolver
        .is_image_pull_allowed("alice", &ImageReference::parse("otherorg/app"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_registry_grant_ignores_tag_and_digest() {
    let store = InMemoryPolicyStore::new();
    store
        .grant(PolicyQuery::new("alice", ResourceType::Registry, "localhost:5000"))
        .await;
    let resolver = PolicyResolver::new(Arc::new(store));

    let image = ImageReference::parse("localhost:5000/app@sha256:0123456789abcdef");
    assert!(resolver.is_image_pull_allowed("alice", &image).await.unwrap());
}

#[tokio::test]
async fn test_tag_never_reaches_the_store() {
    let store = RecordingPolicyStore::denying();
    let resolver = PolicyResolver::new(Arc::new(store.clone()));

    let image = ImageReference::parse("myorg/app").with_default_tag(Some("1.2"));
    assert_eq!(image.to_string(), "myorg/app:1.2");
    resolver.is_image_pull_allowed("alice", &image).await.unwrap();

    let pinned = ImageReference::parse("myorg/app:1.2@sha256:abc");
    resolver.is_image_pull_allowed("alice", &pinned).await.unwrap();

    let values: Vec<String> = store
        .queries()
        .into_iter()
        .map(|q| q.resource_value)
        .collect();
    assert_eq!(values, vec!["myorg/app", "myorg", "myorg/app", "myorg"]);
}

#[tokio::test]
async fn test_untagged_grant_covers_every_tag() {
    let store = InMemoryPolicyStore::new();
    store
        .grant(PolicyQuery::new("alice", ResourceType::Image, "myorg/app"))
        .await;
    let resolver = PolicyResolver::new(Arc::new(store));

    for raw in ["myorg/app", "myorg/app:1.2", "myorg/app@sha256:abc"] {
        assert!(
            resolver.is_image_pull_allowed("alice", &ImageReference::parse(raw)).await.unwrap(),
            "{} should be covered",
            raw
        );
    }
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_store_failure_is_an_error_not_a_denial() {
    let store = BrokenPolicyStore::default();
    let resolver = PolicyResolver::new(Arc::new(store.clone()));

    let result = resolver
        .is_image_pull_allowed("alice", &ImageReference::parse("myorg/app"))
        .await;

    assert!(matches!(result, Err(AuthzError::PolicyStore(_))));
    assert_eq!(store.closed(), 1, "session must be released on failure");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Granting only the Nth question allows the pull after exactly N questions
    #[test]
    fn prop_first_grant_wins(
        registry in proptest::option::of("[a-z]{1,8}\\.io"),
        namespace in "[a-z]{1,8}",
        name in "[a-z]{1,8}",
        step_seed in 0usize..8,
    ) {
        let raw = match &registry {
            Some(host) => format!("{}/{}/{}", host, namespace, name),
            None => format!("{}/{}", namespace, name),
        };
        let image = ImageReference::parse(&raw);
        let total = if registry.is_some() { 3 } else { 2 };
        let step = step_seed % total + 1;

        let store = RecordingPolicyStore::new(move |position, _| position == step);
        let resolver = PolicyResolver::new(Arc::new(store.clone()));

        let allowed = tokio_test::block_on(resolver.is_image_pull_allowed("alice", &image)).unwrap();

        prop_assert!(allowed);
        prop_assert_eq!(store.queries().len(), step);
        prop_assert_eq!(store.closed(), 1);
    }

    /// An empty store denies everything
    #[test]
    fn prop_empty_store_denies(raw in "[a-z][a-z0-9./:-]{0,30}") {
        let resolver = PolicyResolver::new(Arc::new(InMemoryPolicyStore::new()));
        let allowed = tokio_test::block_on(
            resolver.is_image_pull_allowed("alice", &ImageReference::parse(&raw)),
        )
        .unwrap();
        prop_assert!(!allowed);
    }
}
