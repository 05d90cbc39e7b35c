use crate::fetch::FetchError;
use crate::slack::NotifyError;

/// Failure of a single task invocation. Never handled inside the task; the
/// scheduler logs it and waits for the next firing.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),
}
