//! Typed shapes decoded from GraphQL `data` objects.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MythicError, Result};
use crate::status::TaskStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackRef {
    pub id: i64,
    pub display_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRef {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRef {
    pub token_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRef {
    pub id: i64,
}

/// Full task record as returned by `task_fragment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFragment {
    pub callback: CallbackRef,
    pub id: i64,
    pub display_id: i64,
    pub operator: OperatorRef,
    pub status: TaskStatus,
    pub completed: bool,
    #[serde(default)]
    pub original_params: Option<String>,
    #[serde(default)]
    pub display_params: Option<String>,
    pub timestamp: String,
    pub command_name: String,
    #[serde(default)]
    pub tasks: Vec<ChildRef>,
    #[serde(default)]
    pub token: Option<TokenRef>,
}

/// One event from the status subscription.
///
/// Fields requested beyond the defaults end up in `attributes`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatusFragment {
    pub id: i64,
    pub display_id: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub completed: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl TaskStatusFragment {
    /// Either a terminal status or the independent `completed` flag.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal() || self.completed
    }
}

/// A single response entry. `response_text` is base64 on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFragment {
    #[serde(default)]
    pub id: Option<i64>,
    pub response_text: String,
    pub timestamp: String,
}

impl ResponseFragment {
    pub fn decode(&self, task_display_id: i64) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.response_text.as_bytes())
            .map_err(|source| MythicError::Base64 {
                task_display_id,
                source,
            })
    }
}

/// One event from the output subscription: the task with its responses so far.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskOutputFragment {
    pub id: i64,
    pub display_id: i64,
    pub status: TaskStatus,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub responses: Vec<ResponseFragment>,
}

impl TaskOutputFragment {
    /// Either a terminal status or the independent `completed` flag.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal() || self.completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TaskIds {
    pub id: i64,
    pub display_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskResult {
    pub status: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub display_id: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadTypeRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub os: String,
    pub payloadtype: PayloadTypeRef,
    #[serde(default)]
    pub description: Option<String>,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackFragment {
    pub architecture: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub external_ip: Option<String>,
    pub host: String,
    pub id: i64,
    pub display_id: i64,
    pub integrity_level: i64,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub extra_info: Option<String>,
    #[serde(default)]
    pub sleep_info: Option<String>,
    #[serde(default)]
    pub pid: Option<i64>,
    pub os: String,
    pub user: String,
    pub agent_callback_id: String,
    pub operation_id: i64,
    #[serde(default)]
    pub process_name: Option<String>,
    pub payload: CallbackPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutationStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

// Data wrappers, one per top-level field.

#[derive(Debug, Deserialize)]
pub struct TaskStreamData<T> {
    pub task_stream: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct TaskListData<T> {
    pub task: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseListData {
    pub response: Vec<ResponseFragment>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackListData {
    pub callback: Vec<CallbackFragment>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskData {
    #[serde(rename = "createTask")]
    pub create_task: CreateTaskResult,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCallbackData {
    #[serde(rename = "updateCallback")]
    pub update_callback: MutationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_decode() {
        let resp = ResponseFragment {
            id: Some(1),
            response_text: "aGVsbG8gd29ybGQ=".to_string(),
            timestamp: "2024-01-01T00:00:00".to_string(),
        };
        assert_eq!(resp.decode(3).unwrap(), b"hello world");

        let bad = ResponseFragment {
            response_text: "not*base64".to_string(),
            ..resp
        };
        match bad.decode(3) {
            Err(MythicError::Base64 { task_display_id, .. }) => assert_eq!(task_display_id, 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_status_fragment_keeps_custom_attributes() {
        let fragment: TaskStatusFragment = serde_json::from_value(json!({
            "id": 40,
            "display_id": 9,
            "status": "processing",
            "completed": true,
            "command_name": "shell"
        }))
        .unwrap();
        assert!(fragment.is_finished());
        assert_eq!(fragment.attributes["command_name"], json!("shell"));
        assert_eq!(fragment.attributes.len(), 1);
    }

    #[test]
    fn test_task_fragment_nullable_fields() {
        let fragment: TaskFragment = serde_json::from_value(json!({
            "callback": {"id": 2, "display_id": 1},
            "id": 10,
            "display_id": 4,
            "operator": {"username": "mythic_admin"},
            "status": "completed",
            "completed": true,
            "original_params": null,
            "display_params": "-path /tmp",
            "timestamp": "2024-03-02T10:00:00",
            "command_name": "ls",
            "tasks": [{"id": 11}],
            "token": null
        }))
        .unwrap();
        assert_eq!(fragment.status, TaskStatus::Completed);
        assert_eq!(fragment.tasks, vec![ChildRef { id: 11 }]);
        assert!(fragment.token.is_none());
        assert!(fragment.original_params.is_none());
    }
}
