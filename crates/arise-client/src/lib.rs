//! HTTP client for the OpenCode server.
//!
//! Implements the session and notification traits from `arise-core` on top
//! of the server's REST API, plus an SSE subscription to its event feed.

pub mod client;
pub mod events;

// Re-export key types
pub use client::{OpenCodeClient, SessionInfo};
pub use events::EventSubscription;
