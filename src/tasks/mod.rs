//! Task operations: issuing, waiting, collecting output, walking subtasks.
//!
//! Every operation takes the [`Mythic`](crate::Mythic) session by reference.
//! The two waiters race a subscription against a deadline:
//!
//! ```text
//! issue_task ──► createTask mutation
//!      │ wait
//!      ▼
//! wait_for_task_complete ──► task_stream subscription ──► TaskResult
//!
//! wait_for_task_output ──► task_stream (responses) ──► live bytes
//!      │ deadline / stream end
//!      ▼
//! get_all_subtask_ids ──► get_all_task_output_by_id (per subtask) ──► more bytes
//! ```

mod issue;
mod output;
mod query;
mod tree;
mod wait;

pub use issue::{issue_task, issue_task_and_wait_for_output, TaskParams, TaskRequest, TaskingLocation};
pub use output::{get_all_task_output_by_id, wait_for_task_output, TaskOutput};
pub use query::get_all_tasks;
pub use tree::get_all_subtask_ids;
pub use wait::{
    wait_for_task_complete, wait_for_task_complete_with, wait_for_task_status, TaskResult,
};
