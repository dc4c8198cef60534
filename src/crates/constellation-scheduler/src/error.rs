#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is shutting down")]
    ShuttingDown,

    #[error("task was cancelled while waiting for a scheduler slot")]
    Cancelled,
}
