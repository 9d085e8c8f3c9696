//! Raw ICMPv4 transport
//!
//! Echo requests are built with pnet and sent on a socket2 raw socket whose
//! TTL is changed before every send. Replies arrive with their IPv4 header
//! attached; time-exceeded and unreachable messages quote the original IPv4
//! header plus the first 8 bytes of our echo request, which is where the
//! identifier and sequence used for matching are recovered from.

use super::{IcmpTransport, ProbeReply, ReplyKind, TransportError};
use async_trait::async_trait;
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::util::checksum as pnet_checksum;
use socket2::{Domain, Protocol, Socket, Type};
use std::mem::MaybeUninit;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Size of ICMP echo payload
const ICMP_ECHO_PAYLOAD_SIZE: usize = 16;
/// Marker at the start of every echo payload
const PAYLOAD_MARKER: &[u8; 8] = b"NETPATH\0";
/// ICMP header length in bytes (type, code, checksum, rest-of-header)
const ICMP_HEADER_LEN_BYTES: usize = 8;
/// IPv4 header minimum length in bytes
const IPV4_HEADER_MIN_LEN_BYTES: usize = 20;
/// Receive buffer size, one Ethernet MTU
const RECV_BUFFER_SIZE: usize = 1500;

/// A reply that belongs to this transport, before timing is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedReply {
    /// ICMP message type of the reply
    pub kind: ReplyKind,
    /// Sequence number of the echo request being answered
    pub sequence: u16,
}

/// Build an ICMP echo request with the given identifier and sequence
pub fn build_echo_request(identifier: u16, sequence: u16) -> Result<Vec<u8>, TransportError> {
    let mut icmp_buf =
        vec![0u8; MutableEchoRequestPacket::minimum_packet_size() + ICMP_ECHO_PAYLOAD_SIZE];
    let mut echo_req_packet = MutableEchoRequestPacket::new(&mut icmp_buf)
        .ok_or_else(|| TransportError::Decode("echo request buffer too small".to_string()))?;

    echo_req_packet.set_icmp_type(IcmpTypes::EchoRequest);
    echo_req_packet.set_icmp_code(IcmpCode(0));
    echo_req_packet.set_identifier(identifier);
    echo_req_packet.set_sequence_number(sequence);

    let mut payload = [0u8; ICMP_ECHO_PAYLOAD_SIZE];
    payload[..PAYLOAD_MARKER.len()].copy_from_slice(PAYLOAD_MARKER);
    payload[8..10].copy_from_slice(&identifier.to_be_bytes());
    payload[10..12].copy_from_slice(&sequence.to_be_bytes());
    echo_req_packet.set_payload(&payload);

    let checksum = pnet_checksum(echo_req_packet.packet(), 1);
    echo_req_packet.set_checksum(checksum);

    Ok(icmp_buf)
}

/// Decode a datagram read from a raw ICMPv4 socket
///
/// Returns `Ok(None)` for well-formed ICMP traffic that does not answer one
/// of our probes (other processes' pings, our own outbound requests seen on
/// loopback). A reply that quotes our identifier but carries an ICMP type
/// other than echo-reply, time-exceeded or destination-unreachable is a
/// decode failure, as is anything too short to parse.
pub fn parse_reply(
    packet_data: &[u8],
    identifier: u16,
) -> Result<Option<DecodedReply>, TransportError> {
    let outer = Ipv4Packet::new(packet_data)
        .ok_or_else(|| TransportError::Decode("truncated IPv4 header".to_string()))?;
    let outer_header_len = usize::from(outer.get_header_length()) * 4;
    if outer_header_len < IPV4_HEADER_MIN_LEN_BYTES || packet_data.len() < outer_header_len {
        return Err(TransportError::Decode(format!(
            "bad IPv4 header length {outer_header_len}"
        )));
    }
    let icmp_data = &packet_data[outer_header_len..];
    let icmp_packet = IcmpPacket::new(icmp_data)
        .ok_or_else(|| TransportError::Decode("truncated ICMP header".to_string()))?;
    let icmp_type = icmp_packet.get_icmp_type();

    match icmp_type {
        IcmpTypes::EchoReply => {
            let echo_reply = EchoReplyPacket::new(icmp_data)
                .ok_or_else(|| TransportError::Decode("truncated echo reply".to_string()))?;
            if echo_reply.get_identifier() != identifier {
                return Ok(None);
            }
            Ok(Some(DecodedReply {
                kind: ReplyKind::EchoReply,
                sequence: echo_reply.get_sequence_number(),
            }))
        }
        IcmpTypes::TimeExceeded | IcmpTypes::DestinationUnreachable => {
            let Some((quoted_id, sequence)) = quoted_echo(icmp_data)? else {
                return Ok(None);
            };
            if quoted_id != identifier {
                return Ok(None);
            }
            let kind = if icmp_type == IcmpTypes::TimeExceeded {
                ReplyKind::TimeExceeded
            } else {
                ReplyKind::DestinationUnreachable(icmp_packet.get_icmp_code().0)
            };
            Ok(Some(DecodedReply { kind, sequence }))
        }
        IcmpTypes::EchoRequest => Ok(None),
        other => {
            // Only complain about messages that are actually about our probes
            match quoted_echo(icmp_data) {
                Ok(Some((quoted_id, _))) if quoted_id == identifier => Err(
                    TransportError::Decode(format!("unexpected ICMP type {}", other.0)),
                ),
                _ => Ok(None),
            }
        }
    }
}

/// Extract (identifier, sequence) of the echo request quoted in an ICMP error
fn quoted_echo(icmp_data: &[u8]) -> Result<Option<(u16, u16)>, TransportError> {
    if icmp_data.len() < ICMP_HEADER_LEN_BYTES + IPV4_HEADER_MIN_LEN_BYTES {
        return Err(TransportError::Decode(
            "ICMP error too short to quote a datagram".to_string(),
        ));
    }
    let original_datagram = &icmp_data[ICMP_HEADER_LEN_BYTES..];
    let inner = Ipv4Packet::new(original_datagram)
        .ok_or_else(|| TransportError::Decode("truncated quoted IPv4 header".to_string()))?;
    let inner_header_len = usize::from(inner.get_header_length()) * 4;
    if inner_header_len < IPV4_HEADER_MIN_LEN_BYTES
        || original_datagram.len() < inner_header_len + ICMP_HEADER_LEN_BYTES
    {
        return Err(TransportError::Decode(
            "quoted datagram too short".to_string(),
        ));
    }

    let original_icmp = &original_datagram[inner_header_len..];
    if original_icmp[0] != IcmpTypes::EchoRequest.0 {
        return Ok(None);
    }
    let original_id = u16::from_be_bytes([original_icmp[4], original_icmp[5]]);
    let original_seq = u16::from_be_bytes([original_icmp[6], original_icmp[7]]);
    Ok(Some((original_id, original_seq)))
}

/// Raw ICMP socket for IPv4
///
/// The identifier is random per transport so that several transports in
/// one process (one per monitoring session) never claim each other's replies.
pub struct RawIcmpV4Transport {
    socket: Arc<Socket>,
    identifier: u16,
}

impl RawIcmpV4Transport {
    /// Open a raw ICMPv4 socket
    ///
    /// Fails with [`TransportError::PermissionDenied`] when the process lacks
    /// Administrator (Windows) or root/CAP_NET_RAW (Unix) rights.
    pub fn open() -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(TransportError::from_io)?;
        Ok(Self::from_socket(socket))
    }

    /// Wrap an already opened raw ICMPv4 socket
    pub fn from_socket(socket: Socket) -> Self {
        Self {
            socket: Arc::new(socket),
            identifier: rand::random::<u16>(),
        }
    }

    /// ICMP identifier stamped on every request from this transport
    pub fn identifier(&self) -> u16 {
        self.identifier
    }
}

/// Send one request and block until its reply, a decode failure or the deadline
fn exchange(
    socket: &Socket,
    identifier: u16,
    target: Ipv4Addr,
    ttl: u8,
    sequence: u16,
    deadline: Instant,
) -> Result<ProbeReply, TransportError> {
    socket
        .set_ttl_v4(u32::from(ttl))
        .map_err(TransportError::from_io)?;

    let request = build_echo_request(identifier, sequence)?;
    let target_addr = SocketAddr::V4(SocketAddrV4::new(target, 0));

    let sent_at = Instant::now();
    socket
        .send_to(&request, &target_addr.into())
        .map_err(TransportError::from_io)?;

    let mut recv_buf = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout);
        }
        // A zero read timeout would block forever on some platforms
        socket
            .set_read_timeout(Some(remaining.max(Duration::from_millis(1))))
            .map_err(TransportError::from_io)?;

        match socket.recv_from(&mut recv_buf) {
            Ok((size, socket_addr)) => {
                let recv_time = Instant::now();
                let Some(from_addr) = socket_addr.as_socket_ipv4() else {
                    continue;
                };

                let initialized_part: &[MaybeUninit<u8>] = &recv_buf[..size];
                // SAFETY: recv_from initialized the first `size` bytes
                let packet_data: &[u8] =
                    unsafe { &*(initialized_part as *const [MaybeUninit<u8>] as *const [u8]) };

                match parse_reply(packet_data, identifier)? {
                    Some(decoded) if decoded.sequence == sequence => {
                        return Ok(ProbeReply {
                            responder: *from_addr.ip(),
                            rtt: recv_time.duration_since(sent_at),
                            kind: decoded.kind,
                        });
                    }
                    Some(decoded) => {
                        trace!(
                            sequence = decoded.sequence,
                            expected = sequence,
                            "Discarding late reply"
                        );
                    }
                    None => {}
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => return Err(TransportError::from_io(e)),
        }
    }
}

#[async_trait]
impl IcmpTransport for RawIcmpV4Transport {
    async fn send(
        &mut self,
        target: Ipv4Addr,
        ttl: u8,
        sequence: u16,
        deadline: tokio::time::Instant,
    ) -> Result<ProbeReply, TransportError> {
        let socket = Arc::clone(&self.socket);
        let identifier = self.identifier;
        let deadline = deadline.into_std();

        tokio::task::spawn_blocking(move || {
            exchange(&socket, identifier, target, ttl, sequence, deadline)
        })
        .await
        .map_err(|e| TransportError::Socket(std::io::Error::other(e.to_string())))?
    }
}
