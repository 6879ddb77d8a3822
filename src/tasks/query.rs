//! Task listing.

use crate::error::Result;
use crate::graphql::queries;
use crate::graphql::types::{TaskFragment, TaskListData};
use crate::graphql::GraphqlRequest;
use crate::session::Mythic;

/// All tasks, newest first, or only those of one callback in creation order.
pub async fn get_all_tasks(
    mythic: &Mythic,
    callback_display_id: Option<i64>,
) -> Result<Vec<TaskFragment>> {
    let request = match callback_display_id {
        Some(display_id) => GraphqlRequest::new(queries::get_all_tasks_for_callback())
            .var("callback_display_id", display_id),
        None => GraphqlRequest::new(queries::get_all_tasks()),
    };
    let data: TaskListData<TaskFragment> = mythic.query(request).await?;
    Ok(data.task)
}
