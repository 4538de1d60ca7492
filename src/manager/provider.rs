//! Instance provider contract and cache keys.
//!
//! Plugin authors supply an [`InstanceProvider`]: it derives a cache key
//! from a configuration snapshot, decides whether a cached instance is
//! stale, and constructs new instances. The managers depend on nothing
//! else. [`DataSourceInstanceProvider`] is the common case packaged up —
//! an author supplies only a factory, and instances are keyed on
//! `org_id#uid` with staleness by settings timestamp.

use std::fmt;

use async_trait::async_trait;

use super::CachedInstance;
use crate::capability::SharedInstance;
use crate::context::PluginContext;
use crate::error::{MuninnError, Result};

/// Opaque, comparable identity of a cached instance.
///
/// Stable across calls for an unchanged configuration, distinct across
/// different configurations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<i64> for CacheKey {
    fn from(key: i64) -> Self {
        Self(key.to_string())
    }
}

/// Contract between plugin authors and the instance managers.
#[async_trait]
pub trait InstanceProvider: Send + Sync + 'static {
    /// Derive the cache key for a configuration snapshot.
    ///
    /// Fails when the snapshot is structurally incomplete (e.g. missing
    /// settings); on failure the cache is neither read nor written.
    fn get_key(&self, ctx: &PluginContext) -> Result<CacheKey>;

    /// Whether the cached instance no longer matches `ctx`.
    ///
    /// Must be deterministic and side-effect free. The default compares
    /// the settings `updated` timestamps.
    fn needs_update(&self, ctx: &PluginContext, cached: &CachedInstance) -> bool {
        ctx.updated() != cached.context.updated()
    }

    /// Construct a new instance for `ctx`. May perform arbitrary I/O.
    ///
    /// On failure nothing is cached, so the next call for the same key
    /// retries construction from scratch.
    async fn new_instance(&self, ctx: &PluginContext) -> Result<SharedInstance>;
}

/// Factory invoked by [`DataSourceInstanceProvider`] to build instances.
#[async_trait]
pub trait InstanceFactory: Send + Sync + 'static {
    async fn create(&self, ctx: &PluginContext) -> Result<SharedInstance>;
}

/// Provider for data-source plugins.
///
/// Keys instances on `org_id#uid` of the data-source settings and uses
/// the default timestamp staleness check. Construction is delegated to
/// the supplied [`InstanceFactory`].
pub struct DataSourceInstanceProvider<F> {
    factory: F,
}

impl<F: InstanceFactory> DataSourceInstanceProvider<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F: InstanceFactory> InstanceProvider for DataSourceInstanceProvider<F> {
    fn get_key(&self, ctx: &PluginContext) -> Result<CacheKey> {
        let settings = ctx
            .data_source_instance_settings
            .as_ref()
            .ok_or(MuninnError::MissingSettings("data source"))?;
        Ok(CacheKey::from(format!("{}#{}", ctx.org_id, settings.uid)))
    }

    async fn new_instance(&self, ctx: &PluginContext) -> Result<SharedInstance> {
        self.factory.create(ctx).await
    }
}
