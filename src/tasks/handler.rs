use thiserror::Error;
use tracing::info;

use super::Task;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("task execution failed: {0}")]
    Failed(String),
}

/// Executes tasks on a worker thread. Implementations may block.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: &Task) -> Result<(), TaskError>;
}

/// Delivers welcome emails and records activity through the log pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationHandler;

impl TaskHandler for NotificationHandler {
    fn handle(&self, task: &Task) -> Result<(), TaskError> {
        match task {
            Task::SendWelcomeEmail { email, name } => {
                if email.is_empty() {
                    return Err(TaskError::InvalidPayload("welcome email without recipient".into()));
                }
                info!(target: "email_service", recipient = %email, name = %name, "Sending welcome email");
            }
            Task::LogActivity { principal_id, message } => {
                info!(target: "activity_log", principal_id = %principal_id, "{}", message);
            }
        }
        Ok(())
    }
}
