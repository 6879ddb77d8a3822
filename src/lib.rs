//! # Mythic Scripting
//!
//! Async client for the Mythic C2 GraphQL API.
//!
//! This library provides:
//! - Task creation against a callback, optionally blocking until completion
//! - Completion waits over a live `task_stream` subscription with a deadline
//! - Output collection that falls back to walking the subtask tree
//! - Task and callback listing
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │             Mythic               │
//!        │  (config + shared Transport)     │
//!        └────────────────┬─────────────────┘
//!                         │
//!           ┌─────────────┴─────────────┐
//!           ▼                           ▼
//!   ┌───────────────┐           ┌───────────────┐
//!   │ HttpTransport │           │  WsTransport  │
//!   │ query/mutate  │           │  graphql-ws   │
//!   └───────────────┘           └───────────────┘
//! ```
//!
//! ## Task Flow
//! 1. `createTask` mutation returns the new task's display id
//! 2. Status subscription until `completed` / `error`
//! 3. Output subscription until the deadline, then a subtask sweep
//! 4. Return the decoded output bytes
//!
//! ## Modules
//! - `session`: the `Mythic` handle every operation takes
//! - `tasks`: issuing, waiting, output collection, subtask walk
//! - `callbacks`: callback listing and updates
//! - `transport`: HTTP and WebSocket transports behind one trait

pub mod callbacks;
pub mod config;
pub mod error;
pub mod graphql;
pub mod session;
pub mod status;
pub mod tasks;
pub mod transport;

pub use config::MythicConfig;
pub use error::{MythicError, Result, Stage};
pub use session::Mythic;
pub use status::TaskStatus;
pub use tasks::{TaskParams, TaskRequest, TaskResult};
