//! Time-indexed instance manager with automatic idle eviction.
//!
//! Instances untouched for the idle TTL are evicted by the store and
//! disposed exactly once in its eviction listener. Lookups use
//! double-checked per-key locking: concurrent `get` calls for different
//! keys never block on each other beyond their own construction time,
//! while concurrent calls for the same never-before-seen key produce
//! exactly one construction that every caller observes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument};

use super::busy::BusyTrackedInstance;
use super::locker::Locker;
use super::provider::{CacheKey, InstanceProvider};
use super::{CachedInstance, InstanceManager, dispose_instance};
use crate::capability::SharedInstance;
use crate::context::PluginContext;
use crate::error::Result;
use crate::telemetry::InstanceMetrics;

/// Default idle time before an untouched instance is evicted.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default interval between background eviction sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(2 * 3600);

/// Configuration for [`TtlInstanceManager`].
///
/// ```rust
/// # use muninn::TtlConfig;
/// # use std::time::Duration;
/// let config = TtlConfig::new()
///     .ttl(Duration::from_secs(600))
///     .cleanup_interval(Duration::from_secs(1200));
/// ```
#[derive(Debug, Clone)]
pub struct TtlConfig {
    /// Idle time before eviction. Default: 1 hour.
    pub ttl: Duration,
    /// Interval between background eviction sweeps. Default: 2 hours.
    pub cleanup_interval: Duration,
    /// Optional bound on cached instances. Default: unbounded.
    pub max_entries: Option<u64>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_entries: None,
        }
    }
}

impl TtlConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle time before eviction.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the interval between background eviction sweeps.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Bound the number of cached instances.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }
}

/// Instance manager backed by an idle-expiring store with per-key locks.
pub struct TtlInstanceManager {
    provider: Arc<dyn InstanceProvider>,
    cache: Cache<CacheKey, CachedInstance>,
    locker: Arc<Locker>,
    metrics: InstanceMetrics,
    track_busy: bool,
    sweeper: JoinHandle<()>,
}

impl TtlInstanceManager {
    /// Create a manager with default TTL configuration.
    ///
    /// Spawns the background sweep task; call from within a tokio runtime.
    pub fn new(provider: Arc<dyn InstanceProvider>) -> Self {
        Self::with_config(provider, TtlConfig::default())
    }

    /// Create a manager with the given TTL configuration and its own
    /// `"ttl"`-labelled metrics sink.
    pub fn with_config(provider: Arc<dyn InstanceProvider>, config: TtlConfig) -> Self {
        Self::with_metrics(provider, config, InstanceMetrics::new("ttl"))
    }

    /// Create a manager with an injected metrics sink.
    pub fn with_metrics(
        provider: Arc<dyn InstanceProvider>,
        config: TtlConfig,
        metrics: InstanceMetrics,
    ) -> Self {
        let locker = Arc::new(Locker::new());

        let listener = {
            let metrics = metrics.clone();
            let locker = Arc::clone(&locker);
            move |key: Arc<CacheKey>, entry: CachedInstance, cause: RemovalCause| {
                debug!(key = %key, ?cause, "evicting instance");
                dispose_instance(&entry.instance, &metrics);
                // Idle and capacity evictions also retire the key's lock;
                // an explicit invalidation is mid-rebuild under that lock,
                // which must survive until the rebuilder releases it.
                if matches!(cause, RemovalCause::Expired | RemovalCause::Size) {
                    locker.release(&key);
                }
            }
        };

        let mut builder = Cache::builder()
            .time_to_idle(config.ttl)
            .eviction_listener(listener);
        if let Some(max) = config.max_entries {
            builder = builder.max_capacity(max);
        }
        let cache = builder.build();

        let sweeper = tokio::spawn(sweep(cache.clone(), config.cleanup_interval));

        Self {
            provider,
            cache,
            locker,
            metrics,
            track_busy: false,
            sweeper,
        }
    }

    /// Wrap newly constructed instances in [`BusyTrackedInstance`].
    ///
    /// Busy state is observability infrastructure only; no disposal path
    /// consults it.
    pub fn track_busy(mut self, enabled: bool) -> Self {
        self.track_busy = enabled;
        self
    }

    /// Number of cached instances. May lag behind pending evictions;
    /// see [`run_pending_tasks`](Self::run_pending_tasks).
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Process pending store maintenance (expirations, notifications) now
    /// instead of waiting for the next background sweep.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    fn wrap(&self, instance: SharedInstance) -> SharedInstance {
        if self.track_busy {
            Arc::new(BusyTrackedInstance::new(instance))
        } else {
            instance
        }
    }
}

impl Drop for TtlInstanceManager {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[async_trait]
impl InstanceManager for TtlInstanceManager {
    #[instrument(skip_all, fields(org_id = ctx.org_id, plugin_id = %ctx.plugin_id))]
    async fn get(&self, ctx: &PluginContext) -> Result<SharedInstance> {
        let key = self.provider.get_key(ctx)?;

        // Fast path under the per-key read lock. The lookup itself
        // refreshes the entry's idle timer.
        {
            let _guard = self.locker.read(&key).await;
            if let Some(entry) = self.cache.get(&key) {
                if !self.provider.needs_update(ctx, &entry) {
                    self.metrics.cache_hit();
                    return Ok(entry.instance);
                }
            }
        }
        self.metrics.cache_miss();

        // Slow path: exclusive for this key only. Re-check under the
        // lock — the entry may have been rebuilt while we waited.
        let _guard = self.locker.write(&key).await;
        if let Some(entry) = self.cache.get(&key) {
            if !self.provider.needs_update(ctx, &entry) {
                return Ok(entry.instance);
            }
            // Disposal runs in the eviction listener, not inline.
            self.cache.invalidate(&key);
        }

        let instance = self.wrap(self.provider.new_instance(ctx).await?);
        debug!(key = %key, "instance created");
        self.metrics.instance_created();
        self.cache.insert(
            key,
            CachedInstance {
                context: ctx.clone(),
                instance: Arc::clone(&instance),
            },
        );
        Ok(instance)
    }
}

/// Periodically drives the store's maintenance so idle entries are
/// evicted (and disposed) even when no lookups arrive.
async fn sweep(cache: Cache<CacheKey, CachedInstance>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        cache.run_pending_tasks();
    }
}
