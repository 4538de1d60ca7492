//! Configuration snapshot types.
//!
//! A [`PluginContext`] describes which backend instance a request targets:
//! the tenant, the plugin, the instance settings payload with its
//! last-modified timestamp, and the read-only configuration the host
//! process hands down (including feature toggles). Contexts are immutable
//! values; managers clone them into cache entries and compare their
//! `updated` timestamps to detect staleness.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Feature toggle that routes instance caching to the TTL manager.
pub const FEATURE_TTL_INSTANCE_CACHE: &str = "ttlInstanceCache";

/// Host config key listing enabled feature toggles, comma-separated.
pub const FEATURE_TOGGLES_ENABLE_KEY: &str = "feature_toggles.enable";

/// Immutable request-time description of the targeted instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginContext {
    /// Organization/tenant identifier.
    pub org_id: i64,
    /// Identifier of the plugin handling the request.
    pub plugin_id: String,
    /// Settings for an app instance, when the request targets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_instance_settings: Option<AppInstanceSettings>,
    /// Settings for a data-source instance, when the request targets one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_instance_settings: Option<DataSourceInstanceSettings>,
    /// Read-only configuration handed down by the host process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostConfig>,
}

impl PluginContext {
    /// Create a context for the given tenant and plugin.
    pub fn new(org_id: i64, plugin_id: impl Into<String>) -> Self {
        Self {
            org_id,
            plugin_id: plugin_id.into(),
            ..Default::default()
        }
    }

    /// Attach data-source instance settings.
    pub fn with_data_source(mut self, settings: DataSourceInstanceSettings) -> Self {
        self.data_source_instance_settings = Some(settings);
        self
    }

    /// Attach app instance settings.
    pub fn with_app(mut self, settings: AppInstanceSettings) -> Self {
        self.app_instance_settings = Some(settings);
        self
    }

    /// Attach host configuration.
    pub fn with_host(mut self, host: HostConfig) -> Self {
        self.host = Some(host);
        self
    }

    /// Last-modified timestamp of the targeted instance settings.
    ///
    /// Data-source settings take precedence over app settings; `None`
    /// when the context carries neither.
    pub fn updated(&self) -> Option<SystemTime> {
        self.data_source_instance_settings
            .as_ref()
            .map(|s| s.updated)
            .or_else(|| self.app_instance_settings.as_ref().map(|s| s.updated))
    }

    /// Feature toggles from the host configuration.
    ///
    /// An absent host config yields an empty toggle set.
    pub fn feature_toggles(&self) -> FeatureToggles {
        self.host
            .as_ref()
            .map(HostConfig::feature_toggles)
            .unwrap_or_default()
    }
}

/// Settings payload for an app plugin instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInstanceSettings {
    /// Plugin-defined settings, opaque to muninn.
    #[serde(default)]
    pub json_data: Value,
    /// Decrypted secure settings.
    #[serde(default)]
    pub decrypted_secure_json_data: HashMap<String, String>,
    /// When the settings were last modified.
    #[serde(default = "unix_epoch")]
    pub updated: SystemTime,
}

impl AppInstanceSettings {
    pub fn new() -> Self {
        Self {
            json_data: Value::Null,
            decrypted_secure_json_data: HashMap::new(),
            updated: SystemTime::UNIX_EPOCH,
        }
    }

    /// Set the last-modified timestamp.
    pub fn updated(mut self, at: SystemTime) -> Self {
        self.updated = at;
        self
    }
}

impl Default for AppInstanceSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings payload for a data-source plugin instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInstanceSettings {
    /// Numeric identifier assigned by the host.
    pub id: i64,
    /// Stable unique identifier.
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Backend URL, if the data source has one.
    #[serde(default)]
    pub url: String,
    /// Plugin-defined settings, opaque to muninn.
    #[serde(default)]
    pub json_data: Value,
    /// Decrypted secure settings.
    #[serde(default)]
    pub decrypted_secure_json_data: HashMap<String, String>,
    /// When the settings were last modified.
    #[serde(default = "unix_epoch")]
    pub updated: SystemTime,
}

impl DataSourceInstanceSettings {
    /// Create settings with the given identifiers; the display name
    /// defaults to the uid.
    pub fn new(id: i64, uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            id,
            name: uid.clone(),
            uid,
            url: String::new(),
            json_data: Value::Null,
            decrypted_secure_json_data: HashMap::new(),
            updated: SystemTime::UNIX_EPOCH,
        }
    }

    /// Set the last-modified timestamp.
    pub fn updated(mut self, at: SystemTime) -> Self {
        self.updated = at;
        self
    }
}

fn unix_epoch() -> SystemTime {
    SystemTime::UNIX_EPOCH
}

/// Read-only key/value configuration handed down by the host process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    config: HashMap<String, String>,
}

impl HostConfig {
    pub fn new(config: HashMap<String, String>) -> Self {
        Self { config }
    }

    /// Look up a raw config value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Parse the enabled feature toggles.
    pub fn feature_toggles(&self) -> FeatureToggles {
        FeatureToggles::from_csv(self.get(FEATURE_TOGGLES_ENABLE_KEY).unwrap_or(""))
    }
}

/// Set of feature toggles enabled by the host.
#[derive(Debug, Clone, Default)]
pub struct FeatureToggles {
    enabled: HashSet<String>,
}

impl FeatureToggles {
    /// Parse a comma-separated toggle list. Whitespace around entries is
    /// ignored; empty entries are dropped.
    pub fn from_csv(list: &str) -> Self {
        Self {
            enabled: list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Whether the named toggle is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }
}
