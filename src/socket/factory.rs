//! Factory for opening probe transports

use super::icmp_v4::RawIcmpV4Transport;
use super::{IcmpTransport, TransportError, TransportFactory};
use tracing::{debug, warn};

/// Opens a new raw ICMPv4 socket for every probing cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct RawIcmpTransportFactory;

impl RawIcmpTransportFactory {
    /// Create the factory
    pub fn new() -> Self {
        Self
    }
}

impl TransportFactory for RawIcmpTransportFactory {
    fn open(&self) -> Result<Box<dyn IcmpTransport>, TransportError> {
        match RawIcmpV4Transport::open() {
            Ok(transport) => {
                debug!(
                    identifier = transport.identifier(),
                    "Opened raw ICMPv4 transport"
                );
                Ok(Box::new(transport))
            }
            Err(e) => {
                if e.is_permission_denied() {
                    warn!(error = %e, "Raw ICMP sockets require elevated privileges");
                }
                Err(e)
            }
        }
    }
}
