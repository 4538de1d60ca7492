//! Muninn - Instance lifecycle cache for backend plugin hosts
//!
//! This crate maps each distinct plugin/data-source configuration to at
//! most one live backend instance. Instances are expensive to build (they
//! may open HTTP clients, pools, or connections); muninn constructs them
//! at most once per configuration, serializes construction per cache key,
//! disposes replaced or idle instances exactly once, and can select its
//! caching strategy per request from host feature toggles.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use muninn::{
//!     CacheKey, InstanceManager, InstanceProvider, PluginContext, PluginInstance, Result,
//!     SharedInstance, StandardInstanceManager,
//! };
//!
//! struct Backend {
//!     // http client, pools, ...
//! }
//!
//! impl PluginInstance for Backend {}
//!
//! struct BackendProvider;
//!
//! #[async_trait::async_trait]
//! impl InstanceProvider for BackendProvider {
//!     fn get_key(&self, ctx: &PluginContext) -> Result<CacheKey> {
//!         Ok(CacheKey::from(ctx.org_id))
//!     }
//!
//!     async fn new_instance(&self, _ctx: &PluginContext) -> Result<SharedInstance> {
//!         Ok(Arc::new(Backend {}))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = StandardInstanceManager::new(Arc::new(BackendProvider));
//!     let ctx = PluginContext::new(1, "example-datasource");
//!     let instance = manager.get(&ctx).await?;
//!     # let _ = instance;
//!     Ok(())
//! }
//! ```

pub mod capability;
pub mod context;
pub mod error;
pub mod manager;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use capability::{
    Disposer, HealthChecker, PacketStream, PluginInstance, QueryHandler, ResourceHandler,
    SharedInstance, StreamHandler, downcast,
};
pub use context::{
    AppInstanceSettings, DataSourceInstanceSettings, FEATURE_TTL_INSTANCE_CACHE, FeatureToggles,
    HostConfig, PluginContext,
};
pub use error::{MuninnError, Result};
pub use manager::{
    BusyTrackedInstance, CacheKey, CachedInstance, DataSourceInstanceProvider, InstanceFactory,
    InstanceManager, InstanceManagerExt, InstanceProvider, Locker, ManagerKind,
    RoutingInstanceManager, StandardInstanceManager, TtlConfig, TtlInstanceManager,
};
pub use telemetry::InstanceMetrics;
