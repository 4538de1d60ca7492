//! Telemetry metric name constants and the instance metrics sink.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `manager` — manager kind the metric was recorded by ("standard" | "ttl")

use metrics::{Counter, Gauge};

/// Number of instances currently held by a manager.
///
/// Incremented on construction, decremented on disposal.
/// Labels: `manager`.
pub const ACTIVE_INSTANCES: &str = "muninn_active_instances";

/// Total instances constructed.
///
/// Labels: `manager`.
pub const INSTANCE_CREATIONS_TOTAL: &str = "muninn_instance_creations_total";

/// Total instances disposed (replaced, evicted, or invalidated).
///
/// Labels: `manager`.
pub const INSTANCE_DISPOSALS_TOTAL: &str = "muninn_instance_disposals_total";

/// Total lookups that returned a fresh cached instance.
///
/// Labels: `manager`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total lookups that missed or found a stale instance.
///
/// Labels: `manager`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Metrics sink handed to each manager at construction time.
///
/// Resolves its `metrics` handles once and is cloned into eviction
/// callbacks, so no manager reaches for recorder state at call time.
/// Build one per manager kind with [`InstanceMetrics::new`], or inject a
/// shared sink through the managers' `with_metrics` constructors.
#[derive(Clone)]
pub struct InstanceMetrics {
    active: Gauge,
    creations: Counter,
    disposals: Counter,
    hits: Counter,
    misses: Counter,
}

impl InstanceMetrics {
    /// Resolve the metric handles for the given manager label.
    pub fn new(manager: &'static str) -> Self {
        Self {
            active: metrics::gauge!(ACTIVE_INSTANCES, "manager" => manager),
            creations: metrics::counter!(INSTANCE_CREATIONS_TOTAL, "manager" => manager),
            disposals: metrics::counter!(INSTANCE_DISPOSALS_TOTAL, "manager" => manager),
            hits: metrics::counter!(CACHE_HITS_TOTAL, "manager" => manager),
            misses: metrics::counter!(CACHE_MISSES_TOTAL, "manager" => manager),
        }
    }

    pub(crate) fn instance_created(&self) {
        self.active.increment(1.0);
        self.creations.increment(1);
    }

    pub(crate) fn instance_disposed(&self) {
        self.active.decrement(1.0);
        self.disposals.increment(1);
    }

    pub(crate) fn cache_hit(&self) {
        self.hits.increment(1);
    }

    pub(crate) fn cache_miss(&self) {
        self.misses.increment(1);
    }
}
