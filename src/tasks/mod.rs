//! Background side effects.
//!
//! Request handlers hand `Task`s to the [`TaskDispatcher`], which runs them on
//! a fixed pool of worker threads after the response has gone out. Failures
//! are logged by the worker and never reach the submitting request.

mod dispatcher;
mod handler;

pub use dispatcher::{DispatchError, TaskDispatcher};
pub use handler::{NotificationHandler, TaskError, TaskHandler};

use serde::Serialize;
use uuid::Uuid;

/// One unit of fire-and-forget work. Each kind carries its own payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Task {
    SendWelcomeEmail { email: String, name: String },
    LogActivity { principal_id: Uuid, message: String },
}

impl Task {
    pub fn kind(&self) -> &'static str {
        match self {
            Task::SendWelcomeEmail { .. } => "SEND_EMAIL",
            Task::LogActivity { .. } => "LOG_ACTIVITY",
        }
    }
}
