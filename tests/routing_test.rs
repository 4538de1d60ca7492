//! Tests for [`RoutingInstanceManager`] — feature-toggle strategy selection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use muninn::{
    CacheKey, FEATURE_TTL_INSTANCE_CACHE, HostConfig, InstanceManager, InstanceProvider,
    ManagerKind, PluginContext, PluginInstance, Result, RoutingInstanceManager, SharedInstance,
};

struct TestInstance;
impl PluginInstance for TestInstance {}

#[derive(Default)]
struct TestProvider {
    created: AtomicUsize,
}

#[async_trait]
impl InstanceProvider for TestProvider {
    fn get_key(&self, ctx: &PluginContext) -> Result<CacheKey> {
        Ok(CacheKey::from(ctx.org_id))
    }

    async fn new_instance(&self, _ctx: &PluginContext) -> Result<SharedInstance> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TestInstance))
    }
}

fn host_with_toggles(list: &str) -> HostConfig {
    HostConfig::new(HashMap::from([(
        "feature_toggles.enable".to_string(),
        list.to_string(),
    )]))
}

fn context_with_toggles(list: &str) -> PluginContext {
    PluginContext::new(1, "test-plugin").with_host(host_with_toggles(list))
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn absent_host_config_selects_standard() {
    let manager = RoutingInstanceManager::new(Arc::new(TestProvider::default()));
    let ctx = PluginContext::new(1, "test-plugin");
    assert_eq!(manager.select(&ctx), ManagerKind::Standard);
}

#[tokio::test]
async fn empty_toggle_list_selects_standard() {
    let manager = RoutingInstanceManager::new(Arc::new(TestProvider::default()));
    assert_eq!(
        manager.select(&context_with_toggles("")),
        ManagerKind::Standard
    );
}

#[tokio::test]
async fn unrelated_toggles_select_standard() {
    let manager = RoutingInstanceManager::new(Arc::new(TestProvider::default()));
    assert_eq!(
        manager.select(&context_with_toggles("alpha,beta")),
        ManagerKind::Standard
    );
}

#[tokio::test]
async fn ttl_toggle_alone_selects_ttl() {
    let manager = RoutingInstanceManager::new(Arc::new(TestProvider::default()));
    assert_eq!(
        manager.select(&context_with_toggles(FEATURE_TTL_INSTANCE_CACHE)),
        ManagerKind::Ttl
    );
}

#[tokio::test]
async fn ttl_toggle_among_others_selects_ttl() {
    let manager = RoutingInstanceManager::new(Arc::new(TestProvider::default()));
    assert_eq!(
        manager.select(&context_with_toggles("alpha,ttlInstanceCache,beta")),
        ManagerKind::Ttl
    );
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn routed_gets_hit_the_selected_manager() {
    let provider = Arc::new(TestProvider::default());
    let manager = RoutingInstanceManager::new(provider.clone());

    manager
        .get(&PluginContext::new(1, "test-plugin"))
        .await
        .unwrap();
    assert_eq!(manager.standard().len().await, 1);
    assert!(manager.ttl().is_empty());

    manager
        .get(&context_with_toggles(FEATURE_TTL_INSTANCE_CACHE))
        .await
        .unwrap();
    manager.ttl().run_pending_tasks();
    assert_eq!(manager.ttl().len(), 1);
}

#[tokio::test]
async fn flag_flip_leaves_one_instance_per_cache() {
    // Both caches legitimately hold an instance for the same key while
    // the toggle flips between calls; neither copy replaces the other.
    let provider = Arc::new(TestProvider::default());
    let manager = RoutingInstanceManager::new(provider.clone());

    let standard_ctx = PluginContext::new(1, "test-plugin");
    let ttl_ctx = context_with_toggles(FEATURE_TTL_INSTANCE_CACHE);

    let from_standard = manager.get(&standard_ctx).await.unwrap();
    let from_ttl = manager.get(&ttl_ctx).await.unwrap();

    assert!(!Arc::ptr_eq(&from_standard, &from_ttl));
    assert_eq!(provider.created.load(Ordering::SeqCst), 2);

    // Flipping back reuses the standard cache's copy.
    let again = manager.get(&standard_ctx).await.unwrap();
    assert!(Arc::ptr_eq(&from_standard, &again));
    assert_eq!(provider.created.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn selection_is_reevaluated_per_call() {
    let provider = Arc::new(TestProvider::default());
    let manager = RoutingInstanceManager::new(provider.clone());

    let ttl_ctx = context_with_toggles(FEATURE_TTL_INSTANCE_CACHE);
    manager.get(&ttl_ctx).await.unwrap();
    assert_eq!(manager.select(&ttl_ctx), ManagerKind::Ttl);

    // The same tenant with the toggle removed routes to standard.
    let standard_ctx = PluginContext::new(1, "test-plugin");
    assert_eq!(manager.select(&standard_ctx), ManagerKind::Standard);
    manager.get(&standard_ctx).await.unwrap();
    assert_eq!(manager.standard().len().await, 1);
}
