//! Continuous NetPath monitoring sessions

pub mod history;
pub mod manager;
pub mod types;

pub use history::BoundedHistory;
pub use manager::PathSessionManager;
pub use types::{Session, SessionStatus};

use crate::traceroute::TracerouteError;
use thiserror::Error;

/// Errors returned by the session manager
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session limit reached
    #[error("Session limit reached ({limit} sessions)")]
    CapacityExceeded {
        /// Configured maximum
        limit: usize,
    },

    /// No session exists for the target
    #[error("No session for target {0}")]
    NotFound(String),

    /// The manager has been shut down
    #[error("Session manager is shut down")]
    ShutDown,

    /// A probe cycle crashed before producing a result
    #[error("Probe cycle aborted: {0}")]
    CycleAborted(String),

    /// Resolution or socket failure
    #[error(transparent)]
    Trace(#[from] TracerouteError),
}
