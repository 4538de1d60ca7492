//! Per-call strategy selection between the standard and TTL managers.
//!
//! Both managers are constructed once, share the same provider, and
//! coexist for the process lifetime; every call re-reads the snapshot's
//! feature toggles to pick one. Toggling
//! [`FEATURE_TTL_INSTANCE_CACHE`] between calls for the same
//! configuration therefore leaves an instance transiently alive in each
//! cache until one copy is replaced or ages out — entries are not
//! migrated between caches on a flip.

use std::sync::Arc;

use async_trait::async_trait;

use super::provider::InstanceProvider;
use super::standard::StandardInstanceManager;
use super::ttl::{TtlConfig, TtlInstanceManager};
use super::InstanceManager;
use crate::capability::SharedInstance;
use crate::context::{FEATURE_TTL_INSTANCE_CACHE, PluginContext};
use crate::error::Result;

/// Which concrete manager a call routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Standard,
    Ttl,
}

/// Routes each call to the standard or TTL manager by feature toggle.
pub struct RoutingInstanceManager {
    standard: StandardInstanceManager,
    ttl: TtlInstanceManager,
}

impl RoutingInstanceManager {
    /// Create a router over both managers with default TTL configuration.
    ///
    /// Spawns the TTL manager's sweep task; call from within a tokio
    /// runtime.
    pub fn new(provider: Arc<dyn InstanceProvider>) -> Self {
        Self::with_ttl_config(provider, TtlConfig::default())
    }

    /// Create a router with a custom TTL configuration.
    pub fn with_ttl_config(provider: Arc<dyn InstanceProvider>, config: TtlConfig) -> Self {
        Self {
            standard: StandardInstanceManager::new(Arc::clone(&provider)),
            ttl: TtlInstanceManager::with_config(provider, config),
        }
    }

    /// Wrap newly constructed instances in
    /// [`BusyTrackedInstance`](super::BusyTrackedInstance) on both
    /// managers.
    pub fn track_busy(mut self, enabled: bool) -> Self {
        self.standard = self.standard.track_busy(enabled);
        self.ttl = self.ttl.track_busy(enabled);
        self
    }

    /// Evaluate the routing decision for a snapshot.
    ///
    /// Re-evaluated on every call, never cached per key. An absent host
    /// config routes to the standard manager.
    pub fn select(&self, ctx: &PluginContext) -> ManagerKind {
        if ctx.feature_toggles().is_enabled(FEATURE_TTL_INSTANCE_CACHE) {
            ManagerKind::Ttl
        } else {
            ManagerKind::Standard
        }
    }

    /// The standard manager behind this router.
    pub fn standard(&self) -> &StandardInstanceManager {
        &self.standard
    }

    /// The TTL manager behind this router.
    pub fn ttl(&self) -> &TtlInstanceManager {
        &self.ttl
    }
}

#[async_trait]
impl InstanceManager for RoutingInstanceManager {
    async fn get(&self, ctx: &PluginContext) -> Result<SharedInstance> {
        match self.select(ctx) {
            ManagerKind::Standard => self.standard.get(ctx).await,
            ManagerKind::Ttl => self.ttl.get(ctx).await,
        }
    }
}
