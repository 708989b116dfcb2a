pub mod coordinator;
pub mod error;
pub mod session;
pub mod shadows;
pub mod task;
#[cfg(test)]
pub(crate) mod testing;
pub mod tools;

// Re-export key types
pub use coordinator::{TaskCoordinator, POLL_INTERVAL};
pub use error::LaunchError;
pub use session::{
    MessageInfo, MessagePart, Notifier, ServerEvent, SessionMessage, SessionService,
    SessionStatus, Toast,
};
pub use shadows::ShadowKind;
pub use task::{Task, TaskStatus};
pub use tools::ToolRegistry;
