//! Map-based instance manager with one global read/write lock.
//!
//! The simplest strategy: a `HashMap` behind a single rwlock. Fresh
//! lookups share the read lock; misses and stale entries take the write
//! lock, under which the entry is re-checked, a replaced instance is
//! disposed, and the new instance is constructed and stored. Holding the
//! write lock across construction means constructions for *different*
//! keys serialize with each other — a simplicity/performance tradeoff;
//! [`TtlInstanceManager`](super::TtlInstanceManager) pays for per-key
//! granularity instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::busy::BusyTrackedInstance;
use super::provider::{CacheKey, InstanceProvider};
use super::{CachedInstance, InstanceManager, dispose_instance};
use crate::capability::SharedInstance;
use crate::context::PluginContext;
use crate::error::Result;
use crate::telemetry::InstanceMetrics;

/// Instance manager backed by a map under one process-wide rwlock.
pub struct StandardInstanceManager {
    provider: Arc<dyn InstanceProvider>,
    cache: RwLock<HashMap<CacheKey, CachedInstance>>,
    metrics: InstanceMetrics,
    track_busy: bool,
}

impl StandardInstanceManager {
    /// Create a manager with its own `"standard"`-labelled metrics sink.
    pub fn new(provider: Arc<dyn InstanceProvider>) -> Self {
        Self::with_metrics(provider, InstanceMetrics::new("standard"))
    }

    /// Create a manager with an injected metrics sink.
    pub fn with_metrics(provider: Arc<dyn InstanceProvider>, metrics: InstanceMetrics) -> Self {
        Self {
            provider,
            cache: RwLock::new(HashMap::new()),
            metrics,
            track_busy: false,
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

    /// Number of cached instances.
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    fn wrap(&self, instance: SharedInstance) -> SharedInstance {
        if self.track_busy {
            Arc::new(BusyTrackedInstance::new(instance))
        } else {
            instance
        }
    }
}

#[async_trait]
impl InstanceManager for StandardInstanceManager {
    #[instrument(skip_all, fields(org_id = ctx.org_id, plugin_id = %ctx.plugin_id))]
    async fn get(&self, ctx: &PluginContext) -> Result<SharedInstance> {
        let key = self.provider.get_key(ctx)?;

        // Fast path: cached and fresh, shared read lock only.
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&key) {
                if !self.provider.needs_update(ctx, entry) {
                    self.metrics.cache_hit();
                    return Ok(Arc::clone(&entry.instance));
                }
            }
        }
        self.metrics.cache_miss();

        // Slow path. The write lock spans the staleness re-check, the
        // disposal of a replaced instance, and the construction of its
        // successor: a stale instance is disposed exactly once, and at
        // most one construction is in flight — across all keys.
        let mut cache = self.cache.write().await;

        let fresh = match cache.get(&key) {
            Some(entry) if !self.provider.needs_update(ctx, entry) => {
                Some(Arc::clone(&entry.instance))
            }
            _ => None,
        };
        if let Some(instance) = fresh {
            // Another caller rebuilt the entry while we waited.
            return Ok(instance);
        }

        if let Some(stale) = cache.remove(&key) {
            debug!(key = %key, "disposing stale instance");
            dispose_instance(&stale.instance, &self.metrics);
        }

        let instance = self.wrap(self.provider.new_instance(ctx).await?);
        debug!(key = %key, "instance created");
        self.metrics.instance_created();
        cache.insert(
            key,
            CachedInstance {
                context: ctx.clone(),
                instance: Arc::clone(&instance),
            },
        );
        Ok(instance)
    }
}
