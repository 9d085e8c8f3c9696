//! Error types for path probing operations

use crate::dns::DnsError;
use crate::socket::TransportError;
use thiserror::Error;

/// Privileges needed to open a raw ICMP socket
pub const REQUIRED_PRIVILEGES: &str =
    "Administrator privileges (Windows) or root/CAP_NET_RAW (Unix)";

/// Errors that abort a probing cycle or one-shot trace
///
/// Per-probe timeouts and malformed replies never show up here: they are
/// folded into the hop's loss statistics instead.
///
/// # Examples
///
/// ```
/// # use netpath::TracerouteError;
/// fn describe(err: &TracerouteError) -> String {
///     match err {
///         TracerouteError::InsufficientPermissions { suggestion, .. } => {
///             format!("not a network problem: {suggestion}")
///         }
///         TracerouteError::ResolutionError(msg) => format!("bad target: {msg}"),
///         other => other.to_string(),
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum TracerouteError {
    /// Raw socket creation was refused by the OS
    ///
    /// Distinct from a network timeout: the remedy is to elevate the
    /// process, not to look at the network.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Description of required permissions
        required: String,
        /// Suggested remedy
        suggestion: String,
    },

    /// Socket creation or use failed for other reasons
    #[error("Failed to create socket: {0}")]
    SocketError(String),

    /// The target has no IPv4 address
    #[error("Failed to resolve host: {0}")]
    ResolutionError(String),

    /// An externally imposed wall-clock limit expired before the trace finished
    #[error("Trace interrupted after {elapsed_ms} ms")]
    DeadlineExceeded {
        /// Time spent before giving up
        elapsed_ms: u64,
    },
}

impl TracerouteError {
    /// Structured permission error with the standard remedy
    pub fn insufficient_permissions() -> Self {
        TracerouteError::InsufficientPermissions {
            required: REQUIRED_PRIVILEGES.to_string(),
            suggestion: "Run as Administrator, or grant the binary CAP_NET_RAW \
                         (sudo setcap cap_net_raw+ep <binary>)"
                .to_string(),
        }
    }

    /// True if this is a privilege problem rather than a network one
    pub fn is_permission_error(&self) -> bool {
        matches!(self, TracerouteError::InsufficientPermissions { .. })
    }
}

impl From<TransportError> for TracerouteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::PermissionDenied(_) => TracerouteError::insufficient_permissions(),
            other => TracerouteError::SocketError(other.to_string()),
        }
    }
}

impl From<DnsError> for TracerouteError {
    fn from(err: DnsError) -> Self {
        TracerouteError::ResolutionError(err.to_string())
    }
}
