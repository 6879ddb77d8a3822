//! Task Issuer.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{MythicError, Result, Stage};
use crate::graphql::queries;
use crate::graphql::types::CreateTaskData;
use crate::graphql::GraphqlRequest;
use crate::session::Mythic;
use crate::status::TaskStatus;

use super::output::wait_for_task_output;
use super::wait::{wait_for_task_complete, TaskResult};

/// Parameters for a new task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskParams {
    /// A command line, forwarded untouched.
    Text(String),
    /// Named parameters, sent as a JSON object string.
    Structured(Map<String, Value>),
}

impl TaskParams {
    /// `scripting` for structured parameters, `command_line` for text.
    pub fn tasking_location(&self) -> TaskingLocation {
        match self {
            Self::Text(_) => TaskingLocation::CommandLine,
            Self::Structured(_) => TaskingLocation::Scripting,
        }
    }

    fn to_wire(&self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text.clone()),
            Self::Structured(map) => Ok(serde_json::to_string(map)?),
        }
    }
}

impl From<&str> for TaskParams {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TaskParams {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Map<String, Value>> for TaskParams {
    fn from(value: Map<String, Value>) -> Self {
        Self::Structured(value)
    }
}

/// Tells the server how the parameters were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskingLocation {
    CommandLine,
    Scripting,
}

impl TaskingLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CommandLine => "command_line",
            Self::Scripting => "scripting",
        }
    }
}

impl std::fmt::Display for TaskingLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything `createTask` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub command: String,
    pub params: TaskParams,
    pub callback_display_id: i64,
    pub token_id: Option<i64>,
    pub original_params: Option<String>,
    pub parameter_group_name: Option<String>,
}

impl TaskRequest {
    /// A request with no token, raw parameters or parameter group.
    pub fn new(
        command: impl Into<String>,
        params: impl Into<TaskParams>,
        callback_display_id: i64,
    ) -> Self {
        Self {
            command: command.into(),
            params: params.into(),
            callback_display_id,
            token_id: None,
            original_params: None,
            parameter_group_name: None,
        }
    }

    pub fn with_token_id(mut self, token_id: i64) -> Self {
        self.token_id = Some(token_id);
        self
    }

    pub fn with_original_params(mut self, original_params: impl Into<String>) -> Self {
        self.original_params = Some(original_params.into());
        self
    }

    pub fn with_parameter_group(mut self, name: impl Into<String>) -> Self {
        self.parameter_group_name = Some(name.into());
        self
    }

    /// The mutation with every variable present; unset options go out as
    /// `0` or `""`.
    fn to_graphql(&self) -> Result<GraphqlRequest> {
        Ok(GraphqlRequest::new(queries::CREATE_TASK)
            .var("callback_id", self.callback_display_id)
            .var("command", self.command.as_str())
            .var("params", self.params.to_wire()?)
            .var("token_id", self.token_id.unwrap_or(0))
            .var("tasking_location", self.params.tasking_location().as_str())
            .var(
                "original_params",
                self.original_params.as_deref().unwrap_or(""),
            )
            .var(
                "parameter_group_name",
                self.parameter_group_name.as_deref().unwrap_or(""),
            ))
    }
}

/// Create a task, optionally waiting for it to complete.
///
/// Without `wait_for_complete` the result reflects the freshly created task
/// (status `preprocessing`). With it, the result is the waiter's; a wait
/// failure comes back wrapped in [`Stage::CompletionWait`].
pub async fn issue_task(
    mythic: &Mythic,
    request: &TaskRequest,
    wait_for_complete: bool,
    timeout: Option<Duration>,
) -> Result<TaskResult> {
    let mutation = request.to_graphql()?;
    let data: CreateTaskData = mythic
        .mutate(mutation)
        .await
        .map_err(|e| e.in_stage(Stage::TaskCreation))?;
    let created = data.create_task;

    if created.status != "success" {
        let message = created.error.unwrap_or_default();
        tracing::warn!(
            command = %request.command,
            callback = request.callback_display_id,
            "Task creation rejected: {}",
            message
        );
        return Err(MythicError::TaskCreation(message));
    }
    let (id, display_id) = match (created.id, created.display_id) {
        (Some(id), Some(display_id)) => (id, display_id),
        _ => {
            return Err(MythicError::TaskCreation(
                "server reported success without task ids".to_string(),
            ))
        }
    };

    tracing::info!(
        display_id,
        command = %request.command,
        callback = request.callback_display_id,
        "Issued task"
    );

    if !wait_for_complete {
        return Ok(TaskResult {
            id,
            display_id,
            status: TaskStatus::Preprocessing,
            completed: false,
            error: None,
            attributes: Map::new(),
        });
    }

    wait_for_task_complete(mythic, display_id, timeout)
        .await
        .map_err(|e| e.in_stage(Stage::CompletionWait))
}

/// Create a task, wait for it to complete, then collect its output.
///
/// Any failure names the step it came from: task creation, completion wait
/// or output collection.
pub async fn issue_task_and_wait_for_output(
    mythic: &Mythic,
    request: &TaskRequest,
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let task = issue_task(mythic, request, true, timeout)
        .await
        .map_err(|e| {
            if matches!(e, MythicError::TaskCreation(_)) {
                e.in_stage(Stage::TaskCreation)
            } else {
                e
            }
        })?;

    wait_for_task_output(mythic, task.display_id, timeout)
        .await
        .map_err(|e| e.in_stage(Stage::OutputCollection))
}
