//! Association module
//!
//! This module contains the implementations for establishing
//! associations between two DICOM nodes
//! via the upper layer protocol, and transferring data over them.

pub mod client;
pub mod pdata;
pub mod server;

pub use client::{ClientAssociation, ClientAssociationOptions};
pub use server::{
    AcceptAny, AcceptCalledAeTitle, AccessControl, ServerAssociation, ServerAssociationOptions,
};

use crate::pdu::{
    AbortRQServiceProviderReason, AbortRQSource, AssociationRJ, Pdu, MAXIMUM_PDU_SIZE,
    PDU_HEADER_SIZE,
};
use byteordered::byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BytesMut};
use snafu::{Backtrace, ResultExt, Snafu};
use std::borrow::Cow;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum Error {
    /// missing at least one abstract syntax to negotiate
    MissingAbstractSyntax { backtrace: Backtrace },

    /// could not connect to the peer node
    Connect {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// could not set the socket read timeout
    SetReadTimeout {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// could not set the socket write timeout
    SetWriteTimeout {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// failed to encode an outgoing PDU
    SendPdu {
        #[snafu(backtrace)]
        source: crate::pdu::writer::Error,
    },

    /// failed to send PDU bytes over the wire
    WireSend {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// failed to receive a PDU from the wire
    WireReceive {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// failed to decode an incoming PDU
    ReceivePdu {
        #[snafu(backtrace)]
        source: crate::pdu::reader::Error,
    },

    /// the connection was closed by the peer
    ConnectionClosed { backtrace: Backtrace },

    /// the association timed out waiting for the peer (ARTIM expiry)
    ArtimTimeout { backtrace: Backtrace },

    /// the association request was rejected
    #[snafu(display("association rejected: {:?}", association_rj.source))]
    Rejected {
        association_rj: AssociationRJ,
        backtrace: Backtrace,
    },

    /// the association was aborted
    Aborted { backtrace: Backtrace },

    #[snafu(display("protocol version mismatch: expected {}, got {}", expected, got))]
    ProtocolVersionMismatch {
        expected: u16,
        got: u16,
        backtrace: Backtrace,
    },

    /// no presentation contexts were accepted
    NoAcceptedPresentationContexts { backtrace: Backtrace },

    #[snafu(display("unexpected PDU {}", pdu.short_description()))]
    UnexpectedPdu { pdu: Box<Pdu>, backtrace: Backtrace },

    #[snafu(display("unknown PDU {}", pdu.short_description()))]
    UnknownPdu { pdu: Box<Pdu>, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Timeouts applied to the underlying TCP socket.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// the timeout for socket reads on an established association
    pub read_timeout: Option<Duration>,
    /// the timeout for socket writes
    pub write_timeout: Option<Duration>,
    /// the timeout for establishing the TCP connection
    pub connection_timeout: Option<Duration>,
}

/// Remove trailing spaces and null characters from a UID.
pub(crate) fn trim_uid(uid: Cow<'_, str>) -> Cow<'_, str> {
    if uid.ends_with(|c: char| c.is_whitespace() || c == '\0') {
        Cow::Owned(
            uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
                .to_string(),
        )
    } else {
        uid
    }
}

/// Read a full PDU out of a buffered wire connection.
///
/// Bytes are accumulated in `buffer` across calls, so that a PDU
/// arriving in multiple TCP segments (or several PDUs in one segment)
/// are framed correctly.
pub(crate) fn read_pdu_from_wire<R>(
    reader: &mut R,
    buffer: &mut BytesMut,
    max_pdu_length: u32,
    strict: bool,
) -> Result<Pdu>
where
    R: Read,
{
    loop {
        if buffer.len() >= PDU_HEADER_SIZE as usize {
            let pdu_length = BigEndian::read_u32(&buffer[2..6]);
            // tolerate an oversized declaration up to the hard limit;
            // the PDU reader applies the final length policy
            let total = PDU_HEADER_SIZE as usize + pdu_length.min(MAXIMUM_PDU_SIZE) as usize;
            if buffer.len() >= total {
                let chunk = buffer.split_to(total);
                let mut cursor = chunk.reader();
                return crate::pdu::reader::read_pdu(&mut cursor, max_pdu_length, strict)
                    .context(ReceivePduSnafu);
            }
        }

        let mut staging = [0u8; 8192];
        let n = read_mapping_timeout(reader, &mut staging)?;
        if n == 0 {
            return ConnectionClosedSnafu.fail();
        }
        buffer.extend_from_slice(&staging[..n]);
    }
}

/// Read from the wire, turning a socket timeout into an ARTIM expiry.
fn read_mapping_timeout<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    match reader.read(buf) {
        Ok(n) => Ok(n),
        Err(e)
            if e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::TimedOut =>
        {
            ArtimTimeoutSnafu.fail()
        }
        Err(e) => Err(e).context(WireReceiveSnafu),
    }
}

/// Encode and send a PDU over the given stream,
/// reusing the given write buffer.
pub(crate) fn send_pdu_to_wire<W>(
    socket: &mut W,
    write_buffer: &mut Vec<u8>,
    pdu: &Pdu,
) -> Result<()>
where
    W: Write,
{
    write_buffer.clear();
    crate::pdu::writer::write_pdu(write_buffer, pdu).context(SendPduSnafu)?;
    socket.write_all(write_buffer).context(WireSendSnafu)
}

/// Send an A-ABORT over the given stream and shut the connection down,
/// disregarding any errors on the way out.
pub(crate) fn abort_and_shutdown(socket: &mut TcpStream, source: AbortRQSource) {
    let mut buffer = Vec::with_capacity(16);
    let _ = send_pdu_to_wire(socket, &mut buffer, &Pdu::AbortRQ { source });
    let _ = socket.shutdown(std::net::Shutdown::Both);
}

/// The A-ABORT source used when this node gives up on a peer.
pub(crate) fn provider_abort(reason: AbortRQServiceProviderReason) -> AbortRQSource {
    AbortRQSource::ServiceProvider(reason)
}
