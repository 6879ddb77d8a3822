//! GraphQL subscriptions over WebSocket using the `graphql-ws` protocol.
//!
//! ```text
//!   client                         server
//!     │ ── connection_init ─────────▶ │
//!     │ ◀──────────── connection_ack  │
//!     │ ── start {query, variables} ▶ │
//!     │ ◀──────────────────── data *  │   (ka frames interleaved)
//!     │ ◀──────────────── complete    │
//!     │ ── stop ────────────────────▶ │   (on cancellation)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

use super::{sleep_until, Subscription, SubscriptionSink, Transport, SUBSCRIPTION_BUFFER};
use crate::config::MythicConfig;
use crate::error::{MythicError, Result};
use crate::graphql::{GraphqlRequest, GraphqlResponse};

pub const GRAPHQL_WS_PROTOCOL: &str = "graphql-ws";

/// Upper bound on connect + `connection_ack`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Serialize)]
struct ClientMessage<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl ClientMessage<'_> {
    fn into_message(self) -> Result<Message> {
        Ok(Message::Text(serde_json::to_string(&self)?.into()))
    }
}

#[derive(Debug, Deserialize)]
struct ServerMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// What the producer should do with one server frame.
#[derive(Debug)]
enum Frame {
    Ack,
    Event(Result<Value>),
    KeepAlive,
    Complete,
    Failed(MythicError),
    Ignored,
}

fn classify(text: &str) -> Frame {
    let msg: ServerMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => return Frame::Failed(MythicError::Decode(e)),
    };
    match msg.kind.as_str() {
        "connection_ack" => Frame::Ack,
        "ka" => Frame::KeepAlive,
        "data" => {
            let payload = msg.payload.unwrap_or(Value::Null);
            let event = serde_json::from_value::<GraphqlResponse>(payload)
                .map_err(MythicError::Decode)
                .and_then(GraphqlResponse::into_data);
            Frame::Event(event)
        }
        "complete" => Frame::Complete,
        "error" | "connection_error" => Frame::Failed(MythicError::Subscription(
            describe_error_payload(msg.payload.as_ref()),
        )),
        _ => Frame::Ignored,
    }
}

fn describe_error_payload(payload: Option<&Value>) -> String {
    match payload {
        Some(Value::Array(errors)) => errors
            .iter()
            .map(|e| e.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error"))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "subscription failed without details".to_string(),
    }
}

pub struct WsTransport {
    url: String,
    auth: (&'static str, String),
    accept_invalid_certs: bool,
}

impl WsTransport {
    pub fn new(config: Arc<MythicConfig>) -> Result<Self> {
        Ok(Self {
            url: config.ws_url(),
            auth: config.auth_header()?,
            accept_invalid_certs: config.ssl,
        })
    }

    /// Point at an explicit endpoint instead of the one derived from config.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn connect(&self) -> Result<WsStream> {
        let mut request = self.url.as_str().into_client_request()?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
        );

        let connector = if self.accept_invalid_certs {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| MythicError::Subscription(format!("TLS setup failed: {}", e)))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        let (stream, _) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await?;
        Ok(stream)
    }

    /// Connect, authenticate and wait for `connection_ack`.
    async fn handshake(&self) -> Result<WsStream> {
        let mut ws = self.connect().await?;

        let mut headers = serde_json::Map::new();
        headers.insert(self.auth.0.to_string(), json!(self.auth.1));
        let init = ClientMessage {
            kind: "connection_init",
            id: None,
            payload: Some(json!({ "headers": headers })),
        };
        ws.send(init.into_message()?).await?;

        while let Some(msg) = ws.next().await {
            let text = match msg? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match classify(text.as_str()) {
                Frame::Ack => return Ok(ws),
                Frame::Failed(e) => return Err(e),
                _ => continue,
            }
        }
        Err(MythicError::Subscription(
            "connection closed before connection_ack".to_string(),
        ))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn query(&self, _request: GraphqlRequest) -> Result<Value> {
        Err(MythicError::Subscription(
            "queries are not supported over the subscription socket".to_string(),
        ))
    }

    async fn subscribe(
        &self,
        request: GraphqlRequest,
        timeout: Option<Duration>,
    ) -> Result<Subscription> {
        let mut ws = match tokio::time::timeout(HANDSHAKE_TIMEOUT, self.handshake()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MythicError::Subscription(format!(
                    "no connection_ack from {} within {}s",
                    self.url,
                    HANDSHAKE_TIMEOUT.as_secs()
                )))
            }
        };

        let operation_id = uuid::Uuid::new_v4().to_string();
        let start = ClientMessage {
            kind: "start",
            id: Some(&operation_id),
            payload: Some(serde_json::to_value(&request)?),
        };
        ws.send(start.into_message()?).await?;

        tracing::debug!(
            operation = request.operation_name().unwrap_or("anonymous"),
            id = %operation_id,
            "Subscription started"
        );

        let (sink, subscription) = Subscription::channel(SUBSCRIPTION_BUFFER);
        let deadline = timeout.map(|t| Instant::now() + t);
        tokio::spawn(pump(ws, sink, operation_id, deadline));
        Ok(subscription)
    }
}

/// Forward `data` frames to the sink until completion, failure, timeout or
/// cancellation, then stop the operation and close the socket.
async fn pump(
    mut ws: WsStream,
    sink: SubscriptionSink,
    operation_id: String,
    deadline: Option<Instant>,
) {
    let cancel = sink.cancellation().clone();
    let mut send_stop = true;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(id = %operation_id, "Subscription cancelled");
                break;
            }
            _ = sleep_until(deadline) => {
                tracing::debug!(id = %operation_id, "Subscription timed out");
                break;
            }
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => classify(text.as_str()),
                Some(Ok(Message::Close(_))) | None => {
                    send_stop = false;
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    send_stop = false;
                    sink.send(Err(e.into())).await;
                    break;
                }
            },
        };

        match frame {
            Frame::Event(event) => {
                if !sink.send(event).await {
                    break;
                }
            }
            Frame::Complete => {
                send_stop = false;
                break;
            }
            Frame::Failed(e) => {
                tracing::warn!(id = %operation_id, "Subscription failed: {}", e);
                sink.send(Err(e)).await;
                break;
            }
            Frame::Ack | Frame::KeepAlive | Frame::Ignored => {}
        }
    }

    if send_stop {
        let stop = ClientMessage {
            kind: "stop",
            id: Some(&operation_id),
            payload: None,
        };
        if let Ok(msg) = stop.into_message() {
            let _ = ws.send(msg).await;
        }
    }
    let _ = ws.close(None).await;
}
