//! Tests for [`TtlInstanceManager`] — idle-expiring cache with per-key locks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;

use muninn::{
    CacheKey, DataSourceInstanceSettings, Disposer, InstanceManager, InstanceProvider,
    MuninnError, PluginContext, PluginInstance, Result, SharedInstance, TtlConfig,
    TtlInstanceManager,
};

// ============================================================================
// Test instance and provider
// ============================================================================

struct TestInstance {
    disposals: Arc<AtomicUsize>,
}

impl PluginInstance for TestInstance {
    fn as_disposer(&self) -> Option<&dyn Disposer> {
        Some(self)
    }
}

impl Disposer for TestInstance {
    fn dispose(&self) {
        self.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Provider whose construction delay depends on the data-source uid.
#[derive(Default)]
struct TestProvider {
    created: AtomicUsize,
    disposals: Arc<AtomicUsize>,
    slow_uid: Option<(&'static str, Duration)>,
}

impl TestProvider {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn disposals(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceProvider for TestProvider {
    fn get_key(&self, ctx: &PluginContext) -> Result<CacheKey> {
        let settings = ctx
            .data_source_instance_settings
            .as_ref()
            .ok_or(MuninnError::MissingSettings("data source"))?;
        Ok(CacheKey::from(format!("{}#{}", ctx.org_id, settings.uid)))
    }

    async fn new_instance(&self, ctx: &PluginContext) -> Result<SharedInstance> {
        if let Some((uid, delay)) = self.slow_uid {
            let settings = ctx.data_source_instance_settings.as_ref().unwrap();
            if settings.uid == uid {
                tokio::time::sleep(delay).await;
            }
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TestInstance {
            disposals: Arc::clone(&self.disposals),
        }))
    }
}

fn context(uid: &str, updated_secs: u64) -> PluginContext {
    PluginContext::new(1, "test-plugin").with_data_source(
        DataSourceInstanceSettings::new(1, uid)
            .updated(SystemTime::UNIX_EPOCH + Duration::from_secs(updated_secs)),
    )
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_defaults() {
    let config = TtlConfig::default();
    assert_eq!(config.ttl, Duration::from_secs(3600));
    assert_eq!(config.cleanup_interval, Duration::from_secs(7200));
    assert_eq!(config.max_entries, None);
}

#[test]
fn config_builder() {
    let config = TtlConfig::new()
        .ttl(Duration::from_secs(60))
        .cleanup_interval(Duration::from_secs(120))
        .max_entries(500);
    assert_eq!(config.ttl, Duration::from_secs(60));
    assert_eq!(config.cleanup_interval, Duration::from_secs(120));
    assert_eq!(config.max_entries, Some(500));
}

// ============================================================================
// Caching semantics
// ============================================================================

#[tokio::test]
async fn unchanged_context_returns_identical_instance() {
    let provider = Arc::new(TestProvider::default());
    let manager = TtlInstanceManager::new(provider.clone());

    let ctx = context("ds-1", 100);
    let first = manager.get(&ctx).await.unwrap();
    let second = manager.get(&ctx).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(provider.created(), 1);
    assert_eq!(provider.disposals(), 0);
}

#[tokio::test]
async fn updated_context_rebuilds_and_disposes_exactly_once() {
    let provider = Arc::new(TestProvider::default());
    let manager = TtlInstanceManager::new(provider.clone());

    let first = manager.get(&context("ds-1", 100)).await.unwrap();
    let second = manager.get(&context("ds-1", 101)).await.unwrap();
    manager.run_pending_tasks();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(provider.created(), 2);
    assert_eq!(provider.disposals(), 1);

    // The fresh entry stays cached and undisturbed.
    let third = manager.get(&context("ds-1", 101)).await.unwrap();
    manager.run_pending_tasks();
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(provider.disposals(), 1);
}

#[tokio::test]
async fn failed_construction_is_not_cached() {
    struct FailingProvider {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl InstanceProvider for FailingProvider {
        fn get_key(&self, ctx: &PluginContext) -> Result<CacheKey> {
            Ok(CacheKey::from(ctx.org_id))
        }

        async fn new_instance(&self, _ctx: &PluginContext) -> Result<SharedInstance> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(MuninnError::Construction("backend unreachable".into()));
            }
            Ok(Arc::new(TestInstance {
                disposals: Arc::new(AtomicUsize::new(0)),
            }))
        }
    }

    let provider = Arc::new(FailingProvider {
        attempts: AtomicUsize::new(0),
    });
    let manager = TtlInstanceManager::new(provider.clone());

    let ctx = PluginContext::new(1, "test-plugin");
    assert!(manager.get(&ctx).await.is_err());
    assert!(manager.get(&ctx).await.is_ok());
    assert_eq!(provider.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_gets_for_new_key_construct_once() {
    let provider = Arc::new(TestProvider {
        slow_uid: Some(("ds-1", Duration::from_millis(100))),
        ..Default::default()
    });
    let manager = Arc::new(TtlInstanceManager::new(provider.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager.get(&context("ds-1", 100)).await.unwrap()
        }));
    }

    let mut instances = Vec::new();
    for handle in handles {
        instances.push(handle.await.unwrap());
    }

    assert_eq!(provider.created(), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }
}

#[tokio::test]
async fn slow_construction_does_not_block_other_keys() {
    let provider = Arc::new(TestProvider {
        slow_uid: Some(("ds-slow", Duration::from_secs(1))),
        ..Default::default()
    });
    let manager = Arc::new(TtlInstanceManager::new(provider.clone()));

    let slow = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.get(&context("ds-slow", 100)).await.unwrap() })
    };
    // Let the slow construction take its per-key lock.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let start = Instant::now();
    manager.get(&context("ds-fast", 100)).await.unwrap();
    assert!(
        start.elapsed() < Duration::from_millis(500),
        "independent key waited on a slow construction"
    );

    slow.await.unwrap();
    assert_eq!(provider.created(), 2);
}

// ============================================================================
// Eviction
// ============================================================================

#[tokio::test]
async fn idle_instance_is_evicted_and_disposed_once() {
    let provider = Arc::new(TestProvider::default());
    let config = TtlConfig::new()
        .ttl(Duration::from_millis(250))
        .cleanup_interval(Duration::from_millis(50));
    let manager = TtlInstanceManager::with_config(provider.clone(), config);

    let first = manager.get(&context("ds-1", 100)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.run_pending_tasks();

    assert_eq!(provider.disposals(), 1);
    assert!(manager.is_empty());

    // A later call for the same configuration constructs afresh.
    let second = manager.get(&context("ds-1", 100)).await.unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(provider.created(), 2);
    assert_eq!(provider.disposals(), 1);
}

#[tokio::test]
async fn touched_instance_survives_past_its_original_deadline() {
    let provider = Arc::new(TestProvider::default());
    let config = TtlConfig::new()
        .ttl(Duration::from_secs(3))
        .cleanup_interval(Duration::from_millis(100));
    let manager = TtlInstanceManager::with_config(provider.clone(), config);

    let ctx = context("ds-1", 100);
    let first = manager.get(&ctx).await.unwrap();

    // Touch at ~70% of the TTL; the idle deadline moves out.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let touched = manager.get(&ctx).await.unwrap();
    assert!(Arc::ptr_eq(&first, &touched));

    // Past the original deadline, before the refreshed one.
    tokio::time::sleep(Duration::from_secs(2)).await;
    manager.run_pending_tasks();
    let still_cached = manager.get(&ctx).await.unwrap();
    assert!(Arc::ptr_eq(&first, &still_cached));
    assert_eq!(provider.created(), 1);
    assert_eq!(provider.disposals(), 0);
}
