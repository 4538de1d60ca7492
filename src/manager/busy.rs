//! In-flight request tracking decorator.
//!
//! [`BusyTrackedInstance`] wraps an instance with an atomic in-flight
//! counter. Every capability invocation holds a scoped guard for its
//! full duration — including the lifetime of a running stream — so
//! [`busy`](BusyTrackedInstance::busy) reports whether any handler call
//! is currently in flight.
//!
//! No manager consults the busy state before disposing; this is
//! infrastructure for a future never-dispose-while-busy policy.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use pin_project_lite::pin_project;

use crate::capability::{
    Disposer, HealthChecker, PacketStream, PluginInstance, QueryHandler, ResourceHandler,
    SharedInstance, StreamHandler,
};
use crate::error::{MuninnError, Result};
use crate::types::{
    CallResourceRequest, CallResourceResponse, CheckHealthResult, PublishStreamRequest,
    PublishStreamResponse, QueryDataRequest, QueryDataResponse, RunStreamRequest, StreamPacket,
    SubscribeStreamRequest, SubscribeStreamResponse,
};

/// Decorator wrapping an instance with an in-flight request counter.
///
/// Implements [`PluginInstance`], reporting exactly the capabilities the
/// wrapped instance supports but routing every invocation through the
/// counter. The disposer capability is always present: it delegates to
/// the wrapped instance's disposer, or is a no-op without one.
pub struct BusyTrackedInstance {
    inner: SharedInstance,
    in_flight: Arc<AtomicI64>,
}

impl BusyTrackedInstance {
    pub fn new(inner: SharedInstance) -> Self {
        Self {
            inner,
            in_flight: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Whether any capability invocation is currently in flight.
    pub fn busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// The wrapped instance.
    pub fn inner(&self) -> &SharedInstance {
        &self.inner
    }

    fn track(&self) -> BusyGuard {
        BusyGuard::enter(Arc::clone(&self.in_flight))
    }
}

/// Scoped in-flight marker: increments on enter, decrements on drop,
/// whether the invocation succeeds, fails, or panics.
struct BusyGuard {
    counter: Arc<AtomicI64>,
}

impl BusyGuard {
    fn enter(counter: Arc<AtomicI64>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PluginInstance for BusyTrackedInstance {
    fn as_query_handler(&self) -> Option<&dyn QueryHandler> {
        self.inner
            .as_query_handler()
            .map(|_| self as &dyn QueryHandler)
    }

    fn as_health_checker(&self) -> Option<&dyn HealthChecker> {
        self.inner
            .as_health_checker()
            .map(|_| self as &dyn HealthChecker)
    }

    fn as_resource_handler(&self) -> Option<&dyn ResourceHandler> {
        self.inner
            .as_resource_handler()
            .map(|_| self as &dyn ResourceHandler)
    }

    fn as_stream_handler(&self) -> Option<&dyn StreamHandler> {
        self.inner
            .as_stream_handler()
            .map(|_| self as &dyn StreamHandler)
    }

    fn as_disposer(&self) -> Option<&dyn Disposer> {
        Some(self)
    }
}

#[async_trait]
impl QueryHandler for BusyTrackedInstance {
    async fn query_data(&self, request: QueryDataRequest) -> Result<QueryDataResponse> {
        let _guard = self.track();
        match self.inner.as_query_handler() {
            Some(handler) => handler.query_data(request).await,
            None => Err(MuninnError::Unsupported("query")),
        }
    }
}

#[async_trait]
impl HealthChecker for BusyTrackedInstance {
    async fn check_health(&self) -> Result<CheckHealthResult> {
        let _guard = self.track();
        match self.inner.as_health_checker() {
            Some(handler) => handler.check_health().await,
            None => Err(MuninnError::Unsupported("health checks")),
        }
    }
}

#[async_trait]
impl ResourceHandler for BusyTrackedInstance {
    async fn call_resource(&self, request: CallResourceRequest) -> Result<CallResourceResponse> {
        let _guard = self.track();
        match self.inner.as_resource_handler() {
            Some(handler) => handler.call_resource(request).await,
            None => Err(MuninnError::Unsupported("resource calls")),
        }
    }
}

#[async_trait]
impl StreamHandler for BusyTrackedInstance {
    async fn subscribe_stream(
        &self,
        request: SubscribeStreamRequest,
    ) -> Result<SubscribeStreamResponse> {
        let _guard = self.track();
        match self.inner.as_stream_handler() {
            Some(handler) => handler.subscribe_stream(request).await,
            None => Err(MuninnError::Unsupported("streaming")),
        }
    }

    async fn publish_stream(
        &self,
        request: PublishStreamRequest,
    ) -> Result<PublishStreamResponse> {
        let _guard = self.track();
        match self.inner.as_stream_handler() {
            Some(handler) => handler.publish_stream(request).await,
            None => Err(MuninnError::Unsupported("streaming")),
        }
    }

    async fn run_stream(&self, request: RunStreamRequest) -> Result<PacketStream> {
        let guard = self.track();
        let handler = self
            .inner
            .as_stream_handler()
            .ok_or(MuninnError::Unsupported("streaming"))?;
        let stream = handler.run_stream(request).await?;
        // The guard rides inside the returned stream; the instance stays
        // busy until the stream is dropped.
        Ok(Box::pin(TrackedStream {
            inner: stream,
            _guard: guard,
        }))
    }
}

impl Disposer for BusyTrackedInstance {
    fn dispose(&self) {
        if let Some(disposer) = self.inner.as_disposer() {
            disposer.dispose();
        }
    }
}

pin_project! {
    struct TrackedStream {
        #[pin]
        inner: PacketStream,
        _guard: BusyGuard,
    }
}

impl Stream for TrackedStream {
    type Item = Result<StreamPacket>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}
