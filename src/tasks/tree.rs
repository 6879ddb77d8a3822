//! Subtask discovery.

use crate::error::Result;
use crate::graphql::queries;
use crate::graphql::types::{TaskIds, TaskListData};
use crate::graphql::GraphqlRequest;
use crate::session::Mythic;

/// Every descendant of `task_display_id`, direct children first, then the
/// rest in depth-first order.
///
/// The walk uses an explicit stack, so the order is last-in first-out and
/// stable for a fixed tree. Returns display ids when `use_display_ids` is
/// set, internal ids otherwise.
///
/// Parent links are assumed to form a tree. A cycle on the server would
/// make this loop forever.
pub async fn get_all_subtask_ids(
    mythic: &Mythic,
    task_display_id: i64,
    use_display_ids: bool,
) -> Result<Vec<i64>> {
    let pick = |task: &TaskIds| {
        if use_display_ids {
            task.display_id
        } else {
            task.id
        }
    };

    let request = GraphqlRequest::new(queries::SUBTASKS_BY_PARENT_DISPLAY_ID)
        .var("task_display_id", task_display_id);
    let roots: TaskListData<TaskIds> = mythic.query(request).await?;

    let mut found = Vec::new();
    let mut stack = Vec::new();
    for child in &roots.task {
        found.push(pick(child));
        stack.push(child.id);
    }

    while let Some(task_id) = stack.pop() {
        let request =
            GraphqlRequest::new(queries::SUBTASKS_BY_PARENT_ID).var("task_id", task_id);
        let children: TaskListData<TaskIds> = mythic.query(request).await?;
        for child in &children.task {
            found.push(pick(child));
            stack.push(child.id);
        }
    }

    tracing::debug!(
        display_id = task_display_id,
        count = found.len(),
        "Collected subtasks"
    );
    Ok(found)
}
