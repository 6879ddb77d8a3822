//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{Subscription, Transport};
use crate::error::{MythicError, Result};
use crate::graphql::GraphqlRequest;

type QueryHandler = Box<dyn Fn(&GraphqlRequest) -> Result<Value> + Send + Sync>;

/// One step a scripted subscription producer performs.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Event(Value),
    Fail(String),
    Sleep(Duration),
}

/// A scripted subscription. After the steps run, the stream either closes
/// or stays open until cancelled.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    steps: Vec<Step>,
    hold_open: bool,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            hold_open: false,
        }
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[derive(Default)]
pub(crate) struct MockTransport {
    handlers: Mutex<HashMap<String, QueryHandler>>,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GraphqlRequest>>,
    cancellations: Mutex<Vec<CancellationToken>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request for `operation` with `handler`.
    pub fn on<F>(self, operation: &str, handler: F) -> Self
    where
        F: Fn(&GraphqlRequest) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(operation.to_string(), Box::new(handler));
        self
    }

    /// Queue a script for the next `subscribe` call.
    pub fn subscription(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn requests(&self) -> Vec<GraphqlRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, operation: &str) -> Vec<GraphqlRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.operation_name() == Some(operation))
            .collect()
    }

    /// Cancellation tokens of every subscription opened so far.
    pub fn cancellations(&self) -> Vec<CancellationToken> {
        self.cancellations.lock().unwrap().clone()
    }

    fn record(&self, request: &GraphqlRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn query(&self, request: GraphqlRequest) -> Result<Value> {
        self.record(&request);
        let operation = request.operation_name().unwrap_or_default().to_string();
        let handlers = self.handlers.lock().unwrap();
        match handlers.get(&operation) {
            Some(handler) => handler(&request),
            None => Err(MythicError::Graphql(format!(
                "no mock handler for operation '{}'",
                operation
            ))),
        }
    }

    async fn subscribe(
        &self,
        request: GraphqlRequest,
        _timeout: Option<Duration>,
    ) -> Result<Subscription> {
        self.record(&request);
        let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
            MythicError::Subscription("no scripted subscription left".to_string())
        })?;

        let (sink, subscription) = Subscription::channel(16);
        self.cancellations
            .lock()
            .unwrap()
            .push(sink.cancellation().clone());

        tokio::spawn(async move {
            for step in script.steps {
                let delivered = match step {
                    Step::Event(value) => sink.send(Ok(value)).await,
                    Step::Fail(message) => sink.send(Err(MythicError::Subscription(message))).await,
                    Step::Sleep(duration) => {
                        tokio::select! {
                            _ = sink.cancellation().cancelled() => false,
                            _ = tokio::time::sleep(duration) => true,
                        }
                    }
                };
                if !delivered {
                    return;
                }
            }
            if script.hold_open {
                sink.cancellation().cancelled().await;
            }
        });

        Ok(subscription)
    }
}
