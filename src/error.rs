//! Error types for the Mythic client.
//!
//! Every failure is returned to the immediate caller. Composite operations
//! wrap the underlying cause in [`MythicError::Stage`] so the caller can tell
//! whether task creation, the completion wait or output collection failed.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The step of a composite operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TaskCreation,
    CompletionWait,
    OutputCollection,
    SubscriptionSetup,
    SubtaskWalk,
    SubtaskOutput,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreation => "task creation",
            Self::CompletionWait => "completion wait",
            Self::OutputCollection => "output collection",
            Self::SubscriptionSetup => "subscription setup",
            Self::SubtaskWalk => "subtask walk",
            Self::SubtaskOutput => "subtask output fetch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum MythicError {
    /// Network, TLS or connection failure on the HTTP transport.
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failure on the subscription WebSocket.
    #[error("WebSocket transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The server answered with a GraphQL `errors` list.
    #[error("GraphQL error: {0}")]
    Graphql(String),

    /// The response did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("task {task_display_id} has malformed base64 output: {source}")]
    Base64 {
        task_display_id: i64,
        #[source]
        source: base64::DecodeError,
    },

    /// No terminal status (or no more output) was observed before the
    /// deadline elapsed or the event stream ended.
    #[error("task {task_display_id} not completed{}", fmt_timeout(.timeout))]
    NotCompleted {
        task_display_id: i64,
        timeout: Option<Duration>,
    },

    /// `createTask` reported a non-success status.
    #[error("failed to create task: {0}")]
    TaskCreation(String),

    #[error("subscription error: {0}")]
    Subscription(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<MythicError>,
    },
}

fn fmt_timeout(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!(" within {}s", t.as_secs()),
        None => String::new(),
    }
}

impl MythicError {
    /// Wrap this error with the stage it occurred in.
    pub fn in_stage(self, stage: Stage) -> Self {
        MythicError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through stage wrappers.
    pub fn root_cause(&self) -> &MythicError {
        let mut current = self;
        while let MythicError::Stage { source, .. } = current {
            current = source;
        }
        current
    }

    /// Stage reported by the outermost wrapper, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            MythicError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True for the timeout/exhaustion condition, even when wrapped.
    pub fn is_not_completed(&self) -> bool {
        matches!(self.root_cause(), MythicError::NotCompleted { .. })
    }
}

pub type Result<T> = std::result::Result<T, MythicError>;
