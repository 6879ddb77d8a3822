//! Transports that carry GraphQL requests to the server.
//!
//! Queries and mutations are request/response calls. Subscriptions are
//! served by a background producer that feeds a channel; the caller gets a
//! [`Subscription`] stream that owns the producer's cancellation token.

mod http;
#[cfg(test)]
pub(crate) mod mock;
mod ws;

pub use http::HttpTransport;
pub use ws::WsTransport;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::MythicConfig;
use crate::error::Result;
use crate::graphql::GraphqlRequest;

/// Events buffered between a subscription producer and its consumer.
pub const SUBSCRIPTION_BUFFER: usize = 64;

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Request/response and streaming access to the GraphQL API.
///
/// Every method returns the decoded `data` object. Server-side GraphQL
/// errors are reported as [`crate::MythicError::Graphql`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a query and return its `data` object.
    async fn query(&self, request: GraphqlRequest) -> Result<Value>;

    /// Run a mutation. Transports that make no distinction reuse `query`.
    async fn mutate(&self, request: GraphqlRequest) -> Result<Value> {
        self.query(request).await
    }

    /// Open a subscription. `timeout` bounds how long the producer runs.
    async fn subscribe(
        &self,
        request: GraphqlRequest,
        timeout: Option<Duration>,
    ) -> Result<Subscription>;
}

/// Sending half handed to a subscription producer.
#[derive(Debug, Clone)]
pub struct SubscriptionSink {
    events: mpsc::Sender<Result<Value>>,
    cancel: CancellationToken,
}

impl SubscriptionSink {
    /// Deliver one event. Returns false once the consumer is gone.
    pub async fn send(&self, event: Result<Value>) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    /// Token the producer watches to learn the consumer is gone.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// A live event stream for one subscription.
///
/// Each item is the `data` object of one event. Cancelling (explicitly or
/// by dropping) tells the producer to stop and release its connection.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<Result<Value>>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Create a subscription and the sink its producer writes to.
    pub fn channel(buffer: usize) -> (SubscriptionSink, Subscription) {
        let (tx, rx) = mpsc::channel(buffer);
        let cancel = CancellationToken::new();
        (
            SubscriptionSink {
                events: tx,
                cancel: cancel.clone(),
            },
            Subscription { events: rx, cancel },
        )
    }

    /// Next event, or `None` once the producer has finished.
    pub async fn next_event(&mut self) -> Option<Result<Value>> {
        self.events.recv().await
    }

    /// Stop the producer. Events already buffered can still be read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for Subscription {
    type Item = Result<Value>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// HTTP for queries and mutations, WebSocket for subscriptions.
pub struct CombinedTransport {
    http: HttpTransport,
    ws: WsTransport,
}

impl CombinedTransport {
    /// Build both transports. Fails when no credentials are configured.
    pub fn new(config: Arc<MythicConfig>) -> Result<Self> {
        Ok(Self {
            http: HttpTransport::new(config.clone())?,
            ws: WsTransport::new(config)?,
        })
    }
}

#[async_trait]
impl Transport for CombinedTransport {
    async fn query(&self, request: GraphqlRequest) -> Result<Value> {
        self.http.query(request).await
    }

    async fn subscribe(
        &self,
        request: GraphqlRequest,
        timeout: Option<Duration>,
    ) -> Result<Subscription> {
        self.ws.subscribe(request, timeout).await
    }
}
