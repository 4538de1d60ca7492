//! Instance managers.
//!
//! A manager owns the lifecycle of per-configuration backend instances:
//! it resolves a [`CacheKey`] for each incoming [`PluginContext`] via the
//! [`InstanceProvider`], returns the cached instance when it is still
//! fresh, and otherwise constructs a replacement, disposing the instance
//! it replaces exactly once. Construction is serialized per key, so at
//! most one construction is ever in flight for a given configuration.
//!
//! Two strategies exist:
//!
//! - [`StandardInstanceManager`] — a map behind one process-wide
//!   read/write lock; constructions for different keys serialize with
//!   each other.
//! - [`TtlInstanceManager`] — a time-indexed store with idle eviction and
//!   per-key locking; operations on distinct keys never contend.
//!
//! [`RoutingInstanceManager`] selects between them per call from the
//! snapshot's host feature toggles, and [`BusyTrackedInstance`] optionally
//! decorates cached instances with an in-flight request counter.

mod busy;
mod locker;
mod provider;
mod routing;
mod standard;
mod ttl;

pub use busy::BusyTrackedInstance;
pub use locker::Locker;
pub use provider::{CacheKey, DataSourceInstanceProvider, InstanceFactory, InstanceProvider};
pub use routing::{ManagerKind, RoutingInstanceManager};
pub use standard::StandardInstanceManager;
pub use ttl::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL, TtlConfig, TtlInstanceManager};

use async_trait::async_trait;

use crate::capability::SharedInstance;
use crate::context::PluginContext;
use crate::error::Result;
use crate::telemetry::InstanceMetrics;

/// A cache entry: the configuration snapshot an instance was built from,
/// plus the instance itself.
///
/// Providers receive the entry in
/// [`needs_update`](InstanceProvider::needs_update) and may compare any
/// part of the stored snapshot against the incoming one.
#[derive(Clone)]
pub struct CachedInstance {
    pub context: PluginContext,
    pub instance: SharedInstance,
}

/// Resolves the live instance for a configuration snapshot.
#[async_trait]
pub trait InstanceManager: Send + Sync {
    /// Get the instance for `ctx`, constructing it if absent or stale.
    ///
    /// For an unchanged snapshot the returned handle is reference-identical
    /// across calls. May block waiting on a concurrent construction of the
    /// same key; caller cancellation is not propagated into an in-flight
    /// construction — a cancelled caller simply stops waiting, while the
    /// construction runs to completion and is cached for the next call.
    async fn get(&self, ctx: &PluginContext) -> Result<SharedInstance>;
}

/// Callback combinator over [`InstanceManager::get`].
#[async_trait]
pub trait InstanceManagerExt: InstanceManager {
    /// Resolve the instance for `ctx` and run `f` on it.
    ///
    /// The instance handle passed to `f` is only guaranteed live for the
    /// duration of the call; narrow it to a concrete type with
    /// [`downcast`](crate::capability::downcast).
    async fn with_instance<F, T>(&self, ctx: &PluginContext, f: F) -> Result<T>
    where
        F: FnOnce(SharedInstance) -> T + Send,
        T: Send,
    {
        let instance = self.get(ctx).await?;
        Ok(f(instance))
    }
}

#[async_trait]
impl<M: InstanceManager + ?Sized> InstanceManagerExt for M {}

/// Dispose an instance leaving a cache and record it.
///
/// The gauge is decremented whether or not the instance carries the
/// disposer capability; "disposed" means "no longer cached".
pub(crate) fn dispose_instance(instance: &SharedInstance, metrics: &InstanceMetrics) {
    if let Some(disposer) = instance.as_disposer() {
        disposer.dispose();
    }
    metrics.instance_disposed();
}
