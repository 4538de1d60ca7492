//! Capability traits implemented by plugin instances.
//!
//! Instances implement capability-specific traits (e.g. [`QueryHandler`],
//! [`HealthChecker`]) rather than a single "god trait". The base
//! [`PluginInstance`] trait exposes each capability through an optional
//! accessor defaulting to `None`, so the managers and decorators can
//! narrow an opaque instance to exactly the capabilities it supports —
//! most importantly [`Disposer`], which the managers invoke when an
//! instance is replaced or evicted. Never assume an instance is
//! disposable.

use std::any::Any;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;

use crate::Result;
use crate::types::{
    CallResourceRequest, CallResourceResponse, CheckHealthResult, PublishStreamRequest,
    PublishStreamResponse, QueryDataRequest, QueryDataResponse, RunStreamRequest, StreamPacket,
    SubscribeStreamRequest, SubscribeStreamResponse,
};

/// A stream of packets produced by [`StreamHandler::run_stream`].
pub type PacketStream = Pin<Box<dyn Stream<Item = Result<StreamPacket>> + Send>>;

/// Base trait for plugin-author-defined instances.
///
/// An instance is an opaque resource bound to one configuration — it may
/// hold HTTP clients, connection pools, or anything else that is expensive
/// to build. The cache never inspects or mutates an instance's internals;
/// it only narrows it via the capability accessors below.
///
/// Override the accessors for the capabilities the instance supports; the
/// defaults report every capability as absent. Instances are handed out by
/// shared reference to many concurrent callers and must be internally safe
/// for concurrent invocation.
pub trait PluginInstance: Any + Send + Sync {
    fn as_query_handler(&self) -> Option<&dyn QueryHandler> {
        None
    }

    fn as_health_checker(&self) -> Option<&dyn HealthChecker> {
        None
    }

    fn as_resource_handler(&self) -> Option<&dyn ResourceHandler> {
        None
    }

    fn as_stream_handler(&self) -> Option<&dyn StreamHandler> {
        None
    }

    fn as_disposer(&self) -> Option<&dyn Disposer> {
        None
    }
}

/// Shared handle to a cached instance.
///
/// Callers borrow the instance for the duration of one handler call;
/// holding the handle does not keep the instance in the cache.
pub type SharedInstance = Arc<dyn PluginInstance>;

/// Narrow a shared instance to its concrete type.
///
/// Callbacks passed to
/// [`with_instance`](crate::manager::InstanceManagerExt::with_instance)
/// receive a [`SharedInstance`]; this recovers the author's own type.
pub fn downcast<T: PluginInstance>(instance: &SharedInstance) -> Option<&T> {
    (instance.as_ref() as &dyn Any).downcast_ref::<T>()
}

/// Capability: handle data queries.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn query_data(&self, request: QueryDataRequest) -> Result<QueryDataResponse>;
}

/// Capability: report backend health.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check_health(&self) -> Result<CheckHealthResult>;
}

/// Capability: serve HTTP-shaped resource calls.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn call_resource(&self, request: CallResourceRequest) -> Result<CallResourceResponse>;
}

/// Capability: serve streaming channels.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn subscribe_stream(
        &self,
        request: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse>;

    async fn publish_stream(
        &self,
        request: PublishStreamRequest,
    ) -> Result<PublishStreamResponse>;

    /// Run a stream, producing packets until the returned stream is dropped.
    async fn run_stream(&self, request: RunStreamRequest) -> Result<PacketStream>;
}

/// Capability: release resources before the instance is discarded.
///
/// Invoked exactly once by the owning manager when the instance is
/// replaced by a newer configuration or evicted after its idle TTL.
/// Implementations should release promptly; long-running teardown delays
/// the construction of the replacement instance.
pub trait Disposer: Send + Sync {
    fn dispose(&self);
}
