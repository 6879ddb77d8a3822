//! Output Collector: live responses first, then a sweep over every subtask.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, Stage};
use crate::graphql::queries;
use crate::graphql::types::{ResponseListData, TaskOutputFragment, TaskStreamData};
use crate::graphql::GraphqlRequest;
use crate::session::Mythic;
use crate::transport::sleep_until;

use super::tree::get_all_subtask_ids;

/// One decoded response of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutput {
    pub response: Vec<u8>,
    pub timestamp: String,
}

/// Every response of one task in server order, base64 decoded.
///
/// A response that is not valid base64 fails the whole call.
pub async fn get_all_task_output_by_id(
    mythic: &Mythic,
    task_display_id: i64,
) -> Result<Vec<TaskOutput>> {
    let request =
        GraphqlRequest::new(queries::TASK_OUTPUT).var("task_display_id", task_display_id);
    let data: ResponseListData = mythic.query(request).await?;
    data.response
        .into_iter()
        .map(|resp| {
            Ok(TaskOutput {
                response: resp.decode(task_display_id)?,
                timestamp: resp.timestamp,
            })
        })
        .collect()
}

/// Collect all output of a task and its subtasks.
///
/// Responses pushed on the output subscription are appended as they arrive.
/// The live phase ends when an event shows the task finished, when the
/// deadline passes or when the stream ends. Then the subtask tree is walked
/// and each subtask's stored output is appended in walk order. Output of the
/// task itself only comes from the live phase, and a response that lands in
/// both phases is kept twice.
///
/// Each event carries every response seen so far, so the live phase skips
/// response ids it has already appended.
pub async fn wait_for_task_output(
    mythic: &Mythic,
    task_display_id: i64,
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let timeout = mythic.resolve_timeout(timeout);
    let request =
        GraphqlRequest::new(queries::TASK_WAIT_FOR_OUTPUT).var("display_id", task_display_id);
    let mut subscription = mythic
        .subscribe(request, timeout)
        .await
        .map_err(|e| e.in_stage(Stage::SubscriptionSetup))?;
    let deadline = timeout.map(|t| Instant::now() + t);

    let mut output = Vec::new();
    let mut seen = HashSet::new();
    loop {
        let event = tokio::select! {
            _ = sleep_until(deadline) => {
                tracing::debug!(display_id = task_display_id, "Live output deadline reached");
                break;
            }
            event = subscription.next_event() => event,
        };
        let data = match event {
            Some(event) => event?,
            None => {
                tracing::debug!(display_id = task_display_id, "Output stream ended");
                break;
            }
        };
        let batch: TaskStreamData<TaskOutputFragment> = serde_json::from_value(data)?;
        let mut finished = false;
        for fragment in &batch.task_stream {
            for resp in &fragment.responses {
                if let Some(id) = resp.id {
                    if !seen.insert(id) {
                        continue;
                    }
                }
                output.extend(resp.decode(task_display_id)?);
            }
            finished |= fragment.is_finished();
        }
        if finished {
            tracing::debug!(display_id = task_display_id, "Task finished, ending live output");
            break;
        }
    }
    subscription.cancel();

    let live = output.len();
    let subtasks = get_all_subtask_ids(mythic, task_display_id, true)
        .await
        .map_err(|e| e.in_stage(Stage::SubtaskWalk))?;
    for subtask in &subtasks {
        let responses = get_all_task_output_by_id(mythic, *subtask)
            .await
            .map_err(|e| e.in_stage(Stage::SubtaskOutput))?;
        for resp in responses {
            output.extend(resp.response);
        }
    }

    tracing::debug!(
        display_id = task_display_id,
        live_bytes = live,
        subtasks = subtasks.len(),
        total_bytes = output.len(),
        "Collected task output"
    );
    Ok(output)
}
