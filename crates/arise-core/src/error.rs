use thiserror::Error;

/// Failure to launch a background task. Launch is the only operation that
/// reports errors to the caller; dispatch and polling failures are recorded
/// on the task itself. When launch fails, nothing has been registered.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    SessionCreate { source: anyhow::Error },

    #[error("session service returned no session id")]
    NoSessionId,
}
