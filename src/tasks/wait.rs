//! Completion Waiter: block on the status subscription until a task settles.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;

use crate::error::{MythicError, Result, Stage};
use crate::graphql::queries;
use crate::graphql::types::{TaskStatusFragment, TaskStreamData};
use crate::graphql::GraphqlRequest;
use crate::session::Mythic;
use crate::status::TaskStatus;
use crate::transport::sleep_until;

/// Final state of a task as seen by a waiter.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub id: i64,
    pub display_id: i64,
    pub status: TaskStatus,
    pub completed: bool,
    /// Set when the task finished with the `error` status.
    pub error: Option<String>,
    /// Extra fields requested through a custom result shape.
    pub attributes: Map<String, Value>,
}

impl TaskResult {
    pub fn is_error(&self) -> bool {
        self.status == TaskStatus::Error
    }
}

impl From<TaskStatusFragment> for TaskResult {
    fn from(fragment: TaskStatusFragment) -> Self {
        let error = (fragment.status == TaskStatus::Error)
            .then(|| format!("task {} finished with status error", fragment.display_id));
        Self {
            id: fragment.id,
            display_id: fragment.display_id,
            status: fragment.status,
            completed: fragment.completed,
            error,
            attributes: fragment.attributes,
        }
    }
}

/// Wait until the task reaches `error` or `completed`, or its `completed`
/// flag is set.
///
/// `timeout` falls back to the session's global timeout; with neither, the
/// wait only ends with the task or the subscription. Fails with
/// [`MythicError::NotCompleted`] when the deadline passes or the stream ends
/// first.
pub async fn wait_for_task_complete(
    mythic: &Mythic,
    task_display_id: i64,
    timeout: Option<Duration>,
) -> Result<TaskResult> {
    wait_for_task_complete_with(mythic, task_display_id, timeout, None).await
}

/// [`wait_for_task_complete`] with extra fields requested on every event.
///
/// `custom_attributes` is a space separated GraphQL selection appended to the
/// default status fields; the values land in [`TaskResult::attributes`].
pub async fn wait_for_task_complete_with(
    mythic: &Mythic,
    task_display_id: i64,
    timeout: Option<Duration>,
    custom_attributes: Option<&str>,
) -> Result<TaskResult> {
    wait_until(
        mythic,
        task_display_id,
        timeout,
        custom_attributes,
        TaskStatusFragment::is_finished,
    )
    .await
}

/// Wait until the task's status is at least `status`.
///
/// The `completed` flag also ends the wait. Statuses this client does not
/// recognize are skipped unless they are paired with that flag.
///
/// # Panics
///
/// Panics when `status` itself is unrecognized and a comparison is needed.
pub async fn wait_for_task_status(
    mythic: &Mythic,
    task_display_id: i64,
    status: TaskStatus,
    timeout: Option<Duration>,
) -> Result<TaskResult> {
    wait_until(mythic, task_display_id, timeout, None, |fragment| {
        if fragment.completed {
            return true;
        }
        if fragment.status.rank().is_none() {
            tracing::debug!(
                display_id = fragment.display_id,
                status = %fragment.status,
                "Skipping unrecognized status"
            );
            return false;
        }
        fragment.status.greater_than_or_equal(&status)
    })
    .await
}

async fn wait_until<F>(
    mythic: &Mythic,
    task_display_id: i64,
    timeout: Option<Duration>,
    custom_attributes: Option<&str>,
    done: F,
) -> Result<TaskResult>
where
    F: Fn(&TaskStatusFragment) -> bool,
{
    let timeout = mythic.resolve_timeout(timeout);
    let request = GraphqlRequest::new(queries::task_wait_for_status(custom_attributes))
        .var("display_id", task_display_id);
    let mut subscription = mythic
        .subscribe(request, timeout)
        .await
        .map_err(|e| e.in_stage(Stage::SubscriptionSetup))?;
    let deadline = timeout.map(|t| Instant::now() + t);

    let finished = loop {
        let event = tokio::select! {
            _ = sleep_until(deadline) => {
                tracing::debug!(display_id = task_display_id, "Deadline reached before completion");
                break None;
            }
            event = subscription.next_event() => event,
        };
        let data = match event {
            Some(event) => event?,
            None => {
                tracing::debug!(display_id = task_display_id, "Status stream ended");
                break None;
            }
        };
        let batch: TaskStreamData<TaskStatusFragment> = serde_json::from_value(data)?;
        if let Some(fragment) = batch.task_stream.into_iter().find(|f| done(f)) {
            break Some(fragment);
        }
    };
    subscription.cancel();

    match finished {
        Some(fragment) => {
            tracing::debug!(
                display_id = task_display_id,
                status = %fragment.status,
                "Task reached wait condition"
            );
            Ok(fragment.into())
        }
        None => Err(MythicError::NotCompleted {
            task_display_id,
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::session;
    use crate::transport::mock::{MockTransport, Script, Step};
    use serde_json::json;

    fn status_event(status: &str, completed: bool) -> Step {
        Step::Event(json!({
            "task_stream": [{
                "id": 70,
                "display_id": 7,
                "status": status,
                "completed": completed
            }]
        }))
    }

    #[tokio::test]
    async fn test_returns_on_completed() {
        let script = Script::new(vec![
            status_event("submitted", false),
            status_event("processing", false),
            status_event("completed", true),
        ])
        .hold_open();
        let (mythic, transport) = session(MockTransport::new().subscription(script));

        let result = wait_for_task_complete(&mythic, 7, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!((result.id, result.display_id), (70, 7));
        assert!(result.error.is_none());

        let sub = &transport.requests_for("TaskWaitForStatus")[0];
        assert_eq!(sub.variables["display_id"], json!(7));
        assert!(transport.cancellations()[0].is_cancelled());
    }

    #[tokio::test]
    async fn test_returns_on_error_status() {
        let script = Script::new(vec![status_event("error", false)]).hold_open();
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let result = wait_for_task_complete(&mythic, 7, None).await.unwrap();
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("task 7"));
    }

    #[tokio::test]
    async fn test_completed_flag_alone_finishes() {
        let script = Script::new(vec![status_event("processed", true)]).hold_open();
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let result = wait_for_task_complete(&mythic, 7, None).await.unwrap();
        assert_eq!(result.status, TaskStatus::Processed);
        assert!(result.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_at_deadline() {
        let script = Script::new(vec![
            status_event("submitted", false),
            status_event("processing", false),
        ])
        .hold_open();
        let (mythic, transport) = session(MockTransport::new().subscription(script));

        let start = Instant::now();
        let err = wait_for_task_complete(&mythic, 7, Some(Duration::from_secs(30)))
            .await
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(err.is_not_completed());
        assert!(transport.cancellations()[0].is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_after_start_do_not_shorten_deadline() {
        let script = Script::new(vec![
            Step::Sleep(Duration::from_secs(10)),
            status_event("processing", false),
            Step::Sleep(Duration::from_secs(50)),
            status_event("completed", true),
        ]);
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let start = Instant::now();
        let err = wait_for_task_complete(&mythic, 7, Some(Duration::from_secs(20)))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed < Duration::from_secs(60));
        assert!(matches!(
            err,
            MythicError::NotCompleted { task_display_id: 7, timeout: Some(t) } if t == Duration::from_secs(20)
        ));
    }

    #[tokio::test]
    async fn test_stream_end_without_terminal_status() {
        let script = Script::new(vec![status_event("processing", false)]);
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let err = wait_for_task_complete(&mythic, 7, None).await.unwrap_err();
        assert!(err.is_not_completed());
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let script = Script::new(vec![Step::Fail("connection reset".to_string())]).hold_open();
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let err = wait_for_task_complete(&mythic, 7, None).await.unwrap_err();
        assert!(matches!(err, MythicError::Subscription(ref m) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_subscription_setup_failure_is_staged() {
        let (mythic, _) = session(MockTransport::new());
        let err = wait_for_task_complete(&mythic, 7, None).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::SubscriptionSetup));
    }

    #[tokio::test]
    async fn test_custom_attributes() {
        let script = Script::new(vec![Step::Event(json!({
            "task_stream": [{
                "id": 70,
                "display_id": 7,
                "status": "completed",
                "completed": true,
                "command_name": "ls"
            }]
        }))]);
        let (mythic, transport) = session(MockTransport::new().subscription(script));

        let result = wait_for_task_complete_with(&mythic, 7, None, Some("command_name"))
            .await
            .unwrap();
        assert_eq!(result.attributes["command_name"], json!("ls"));
        let sub = &transport.requests_for("TaskWaitForStatus")[0];
        assert!(sub.query.contains("completed command_name"));
    }

    #[tokio::test]
    async fn test_wait_for_status_milestone() {
        let script = Script::new(vec![
            status_event("submitted", false),
            status_event("agent custom status", false),
            status_event("processed", false),
        ])
        .hold_open();
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let result = wait_for_task_status(&mythic, 7, TaskStatus::Processing, None)
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Processed);
    }

    #[tokio::test]
    async fn test_wait_for_status_error_dominates() {
        let script = Script::new(vec![status_event("error", false)]).hold_open();
        let (mythic, _) = session(MockTransport::new().subscription(script));

        let result = wait_for_task_status(&mythic, 7, TaskStatus::Processed, None)
            .await
            .unwrap();
        assert!(result.is_error());
    }
}
