//! ICMP transport abstraction used by the hop prober
//!
//! A transport owns one raw ICMP socket. Each [`IcmpTransport::send`] call
//! sets the TTL on that shared socket, sends one echo request and waits for
//! the matching reply, so calls against one transport must never overlap.
//! Separate sessions use separate transports obtained from a
//! [`TransportFactory`].

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub mod factory;
pub mod icmp_v4;

pub use factory::RawIcmpTransportFactory;
pub use icmp_v4::RawIcmpV4Transport;

/// Kind of ICMP message accepted as an answer to an echo request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// ICMP Echo Reply, sent by the target itself
    EchoReply,
    /// ICMP Time Exceeded (TTL expired in transit)
    TimeExceeded,
    /// ICMP Destination Unreachable, with its code
    DestinationUnreachable(u8),
}

/// A decoded answer to one probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReply {
    /// Address of the host that sent the reply
    pub responder: Ipv4Addr,
    /// Time between sending the request and receiving the reply
    pub rtt: Duration,
    /// ICMP message type of the reply
    pub kind: ReplyKind,
}

impl ProbeReply {
    /// Round-trip time in milliseconds
    pub fn rtt_ms(&self) -> f64 {
        self.rtt.as_secs_f64() * 1000.0
    }
}

/// Errors raised by a transport for a single probe or while opening
#[derive(Debug, Error)]
pub enum TransportError {
    /// No matching reply arrived before the deadline
    #[error("no reply before deadline")]
    Timeout,

    /// The OS refused raw socket access (needs Administrator/root/CAP_NET_RAW)
    #[error("raw socket access denied: {0}")]
    PermissionDenied(String),

    /// Opening, configuring, reading or writing the socket failed
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// A received datagram could not be decoded as an acceptable ICMP reply
    #[error("failed to decode reply: {0}")]
    Decode(String),
}

impl TransportError {
    /// Classify an I/O error, separating permission problems from the rest
    pub fn from_io(err: std::io::Error) -> Self {
        if is_permission_error(&err) {
            TransportError::PermissionDenied(err.to_string())
        } else {
            TransportError::Socket(err)
        }
    }

    /// True if the error means raw sockets are not available to this process
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TransportError::PermissionDenied(_))
    }
}

// Common POSIX error codes
const EPERM: i32 = 1; // Operation not permitted
const EACCES: i32 = 13; // Permission denied
// WSAEACCES, returned by Windows for raw sockets without elevation
const WSAEACCES: i32 = 10013;

fn is_permission_error(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        return true;
    }
    matches!(err.raw_os_error(), Some(EPERM) | Some(EACCES) | Some(WSAEACCES))
}

/// One raw ICMP socket able to send TTL-limited echo requests
#[async_trait]
pub trait IcmpTransport: Send {
    /// Send one echo request and wait for its reply
    ///
    /// `sequence` identifies this probe among the ones in flight on the
    /// transport. Fails with [`TransportError::Timeout`] when nothing
    /// matching arrives before `deadline`.
    async fn send(
        &mut self,
        target: Ipv4Addr,
        ttl: u8,
        sequence: u16,
        deadline: Instant,
    ) -> Result<ProbeReply, TransportError>;
}

/// Opens a fresh transport for each probing cycle
pub trait TransportFactory: Send + Sync {
    /// Open a new transport, surfacing permission problems distinctly
    fn open(&self) -> Result<Box<dyn IcmpTransport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_permission_errors_are_classified() {
        let err = TransportError::from_io(Error::from_raw_os_error(EPERM));
        assert!(err.is_permission_denied());

        let err = TransportError::from_io(Error::from_raw_os_error(EACCES));
        assert!(err.is_permission_denied());

        let err = TransportError::from_io(Error::new(ErrorKind::PermissionDenied, "nope"));
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_other_io_errors_stay_socket_errors() {
        let err = TransportError::from_io(Error::new(ErrorKind::AddrNotAvailable, "gone"));
        assert!(matches!(err, TransportError::Socket(_)));
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_rtt_ms() {
        let reply = ProbeReply {
            responder: Ipv4Addr::new(10, 0, 0, 1),
            rtt: Duration::from_micros(12_500),
            kind: ReplyKind::TimeExceeded,
        };
        assert!((reply.rtt_ms() - 12.5).abs() < f64::EPSILON);
    }
}
