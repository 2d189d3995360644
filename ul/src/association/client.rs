//! Association requester module
//!
//! The module provides an abstraction for a DICOM association
//! in which this application entity requests an association with
//! another node. See [`ClientAssociationOptions`]
//! for details and examples on how to create an association.
use std::{
    borrow::Cow,
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use crate::association::{
    abort_and_shutdown, provider_abort, read_pdu_from_wire, send_pdu_to_wire, trim_uid,
    AbortedSnafu, ConnectSnafu, Error, MissingAbstractSyntaxSnafu,
    NoAcceptedPresentationContextsSnafu, ProtocolVersionMismatchSnafu, RejectedSnafu, Result,
    SocketOptions, UnexpectedPduSnafu, UnknownPduSnafu,
};
use crate::pdu::{
    AbortRQServiceProviderReason, AbortRQSource, AssociationAC, AssociationRQ, PDataValueType,
    Pdu, PresentationContextNegotiated, PresentationContextProposed,
    PresentationContextResultReason, UserVariableItem, DEFAULT_MAX_PDU, MAXIMUM_PDU_SIZE,
    PDU_HEADER_SIZE,
};
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use bytes::BytesMut;
use snafu::{ensure, ResultExt};

use super::pdata::PDataWriter;

/// The default ARTIM timer expiry.
pub(crate) const DEFAULT_ARTIM_TIMEOUT: Duration = Duration::from_secs(30);

/// A DICOM association builder for a client node.
/// The final outcome is a [`ClientAssociation`].
///
/// This is the standard way of requesting and establishing
/// an association with another DICOM node,
/// that one usually taking the role of a service class provider (SCP).
///
/// # Example
///
/// ```no_run
/// # use dcm_ul::association::client::ClientAssociationOptions;
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let association = ClientAssociationOptions::new()
///    .with_abstract_syntax("1.2.840.10008.1.1")
///    .with_transfer_syntax("1.2.840.10008.1.2.1")
///    .establish("129.168.0.5:104")?;
/// # Ok(())
/// # }
/// ```
///
/// The SCU will admit by default the transfer syntaxes
/// _Implicit VR Little Endian_
/// and _Explicit VR Little Endian_.
/// Other transfer syntaxes can be requested in the association
/// via the method [`with_transfer_syntax`][1].
///
/// [1]: ClientAssociationOptions::with_transfer_syntax
#[derive(Debug, Clone)]
pub struct ClientAssociationOptions {
    /// the calling AE title
    calling_ae_title: Cow<'static, str>,
    /// the called AE title
    called_ae_title: Cow<'static, str>,
    /// the requested application context name
    application_context_name: Cow<'static, str>,
    /// the list of requested abstract syntaxes
    abstract_syntax_uids: Vec<Cow<'static, str>>,
    /// the list of requested transfer syntaxes
    transfer_syntax_uids: Vec<Cow<'static, str>>,
    /// the expected protocol version
    protocol_version: u16,
    /// the maximum PDU length that this node accepts
    max_pdu_length: u32,
    /// whether to receive PDUs in strict mode
    strict: bool,
    /// options for the underlying TCP socket
    socket_options: SocketOptions,
    /// the ARTIM timer expiry, applied while releasing
    artim_timeout: Duration,
}

impl Default for ClientAssociationOptions {
    fn default() -> Self {
        ClientAssociationOptions {
            calling_ae_title: "THIS-SCU".into(),
            called_ae_title: "ANY-SCP".into(),
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            abstract_syntax_uids: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            protocol_version: 1,
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: true,
            socket_options: SocketOptions::default(),
            artim_timeout: DEFAULT_ARTIM_TIMEOUT,
        }
    }
}

impl ClientAssociationOptions {
    /// Create a new set of options for establishing an association.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the calling application entity title for the association,
    /// which refers to this DICOM node.
    ///
    /// The default is `THIS-SCU`.
    pub fn calling_ae_title<T>(mut self, calling_ae_title: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.calling_ae_title = calling_ae_title.into();
        self
    }

    /// Define the called application entity title for the association,
    /// which refers to the target DICOM node.
    ///
    /// The default is `ANY-SCP`.
    pub fn called_ae_title<T>(mut self, called_ae_title: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.called_ae_title = called_ae_title.into();
        self
    }

    /// Include this abstract syntax
    /// in the list of proposed presentation contexts.
    pub fn with_abstract_syntax<T>(mut self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.abstract_syntax_uids
            .push(trim_uid(abstract_syntax_uid.into()));
        self
    }

    /// Include this transfer syntax in each proposed presentation
    /// context.
    pub fn with_transfer_syntax<T>(mut self, transfer_syntax_uid: T) -> Self
    where
        T: Into<Cow<'static, str>>,
    {
        self.transfer_syntax_uids
            .push(trim_uid(transfer_syntax_uid.into()));
        self
    }

    /// Override the maximum PDU length that this node accepts.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Override strict mode:
    /// whether receiving PDUs must not
    /// surpass the negotiated maximum PDU length.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the read timeout for the underlying TCP socket.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout for the underlying TCP socket.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.write_timeout = Some(timeout);
        self
    }

    /// Set the timeout for establishing the TCP connection.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.connection_timeout = Some(timeout);
        self
    }

    /// Override the ARTIM timer expiry,
    /// applied while waiting for a release response.
    pub fn artim_timeout(mut self, timeout: Duration) -> Self {
        self.artim_timeout = timeout;
        self
    }

    /// Initiate the TCP connection and negotiate the association.
    pub fn establish<A: ToSocketAddrs>(self, address: A) -> Result<ClientAssociation> {
        let ClientAssociationOptions {
            calling_ae_title,
            called_ae_title,
            application_context_name,
            abstract_syntax_uids,
            mut transfer_syntax_uids,
            protocol_version,
            max_pdu_length,
            strict,
            socket_options,
            artim_timeout,
        } = self;

        // fail if no abstract syntaxes were provided: they represent
        // intent, should not be omitted by the user
        ensure!(!abstract_syntax_uids.is_empty(), MissingAbstractSyntaxSnafu);

        // provide default transfer syntaxes
        if transfer_syntax_uids.is_empty() {
            // Explicit VR Little Endian
            transfer_syntax_uids.push("1.2.840.10008.1.2.1".into());
            // Implicit VR Little Endian
            transfer_syntax_uids.push("1.2.840.10008.1.2".into());
        }

        let presentation_contexts: Vec<_> = abstract_syntax_uids
            .iter()
            .enumerate()
            .map(|(i, abstract_syntax)| PresentationContextProposed {
                // identifiers must be odd integers
                id: (i as u8) * 2 + 1,
                abstract_syntax: abstract_syntax.to_string(),
                transfer_syntaxes: transfer_syntax_uids
                    .iter()
                    .map(|uid| uid.to_string())
                    .collect(),
            })
            .collect();

        let msg = Pdu::AssociationRQ(AssociationRQ {
            protocol_version,
            calling_ae_title: calling_ae_title.to_string(),
            called_ae_title: called_ae_title.to_string(),
            application_context_name: application_context_name.to_string(),
            presentation_contexts: presentation_contexts.clone(),
            user_variables: vec![
                UserVariableItem::MaxLength(max_pdu_length),
                UserVariableItem::ImplementationClassUID(IMPLEMENTATION_CLASS_UID.to_string()),
                UserVariableItem::ImplementationVersionName(
                    IMPLEMENTATION_VERSION_NAME.to_string(),
                ),
            ],
        });

        let mut socket = connect(address, &socket_options)?;
        socket
            .set_read_timeout(socket_options.read_timeout)
            .context(super::SetReadTimeoutSnafu)?;
        socket
            .set_write_timeout(socket_options.write_timeout)
            .context(super::SetWriteTimeoutSnafu)?;

        let mut write_buffer: Vec<u8> = Vec::with_capacity(max_pdu_length as usize);
        send_pdu_to_wire(&mut socket, &mut write_buffer, &msg)?;

        let mut read_buffer =
            BytesMut::with_capacity((max_pdu_length + PDU_HEADER_SIZE) as usize);
        let msg = read_pdu_from_wire(&mut socket, &mut read_buffer, max_pdu_length, strict)?;

        match msg {
            Pdu::AssociationAC(AssociationAC {
                protocol_version: protocol_version_scp,
                presentation_contexts: presentation_contexts_scp,
                user_variables,
                ..
            }) => {
                if protocol_version != protocol_version_scp {
                    abort_and_shutdown(
                        &mut socket,
                        provider_abort(AbortRQServiceProviderReason::UnexpectedPduParameter),
                    );
                    return ProtocolVersionMismatchSnafu {
                        expected: protocol_version,
                        got: protocol_version_scp,
                    }
                    .fail();
                }

                let accepted: Vec<PresentationContextNegotiated> = presentation_contexts_scp
                    .iter()
                    .filter(|result| result.reason == PresentationContextResultReason::Acceptance)
                    .filter_map(|result| {
                        presentation_contexts
                            .iter()
                            .find(|proposed| proposed.id == result.id)
                            .map(|proposed| PresentationContextNegotiated {
                                id: result.id,
                                reason: result.reason,
                                transfer_syntax: result.transfer_syntax.clone(),
                                abstract_syntax: proposed.abstract_syntax.clone(),
                            })
                    })
                    .collect();

                if accepted.is_empty() {
                    abort_and_shutdown(&mut socket, AbortRQSource::ServiceUser);
                    return NoAcceptedPresentationContextsSnafu.fail();
                }

                // the effective limit for outgoing data PDUs is the
                // smallest of what the peer asked for and what this
                // node is configured with
                let peer_max_pdu_length = user_variables
                    .iter()
                    .find_map(|item| match item {
                        UserVariableItem::MaxLength(len) => Some(*len),
                        _ => None,
                    })
                    .unwrap_or(DEFAULT_MAX_PDU);
                let peer_max_pdu_length = if peer_max_pdu_length == 0 {
                    MAXIMUM_PDU_SIZE
                } else {
                    peer_max_pdu_length
                };

                Ok(ClientAssociation {
                    presentation_contexts: accepted,
                    peer_max_pdu_length,
                    max_pdu_length,
                    strict,
                    socket,
                    read_buffer,
                    write_buffer,
                    message_id: 1,
                    artim_timeout,
                    closed: false,
                })
            }
            Pdu::AssociationRJ(association_rj) => {
                // Requesting -> Closed, without further PDUs
                let _ = socket.shutdown(std::net::Shutdown::Both);
                RejectedSnafu { association_rj }.fail()
            }
            Pdu::AbortRQ { .. } => {
                let _ = socket.shutdown(std::net::Shutdown::Both);
                AbortedSnafu.fail()
            }
            pdu @ Pdu::Unknown { .. } => {
                abort_and_shutdown(
                    &mut socket,
                    provider_abort(AbortRQServiceProviderReason::UnrecognizedPdu),
                );
                UnknownPduSnafu { pdu: Box::new(pdu) }.fail()
            }
            pdu => {
                abort_and_shutdown(
                    &mut socket,
                    provider_abort(AbortRQServiceProviderReason::UnexpectedPdu),
                );
                UnexpectedPduSnafu { pdu: Box::new(pdu) }.fail()
            }
        }
    }
}

fn connect<A: ToSocketAddrs>(address: A, options: &SocketOptions) -> Result<TcpStream> {
    match options.connection_timeout {
        Some(timeout) => {
            let mut last_error = std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "could not resolve any address",
            );
            for addr in address.to_socket_addrs().context(ConnectSnafu)? {
                match TcpStream::connect_timeout(&addr, timeout) {
                    Ok(socket) => return Ok(socket),
                    Err(e) => last_error = e,
                }
            }
            Err(last_error).context(ConnectSnafu)
        }
        None => TcpStream::connect(address).context(ConnectSnafu),
    }
}

/// A DICOM upper level association from the perspective
/// of a requesting application entity.
///
/// The most common operations of an established association are
/// [`send`](Self::send) and [`receive`](Self::receive).
/// Sending large P-Data fragments may be easier through the P-Data
/// sender abstraction (see [`send_pdata`](Self::send_pdata)).
///
/// When the value falls out of scope,
/// the program will attempt to gracefully release the association.
#[derive(Debug)]
pub struct ClientAssociation {
    /// The accorded presentation contexts
    presentation_contexts: Vec<PresentationContextNegotiated>,
    /// The maximum PDU length that the remote application entity accepts
    peer_max_pdu_length: u32,
    /// The maximum PDU length that this application entity accepts
    max_pdu_length: u32,
    /// whether to receive PDUs in strict mode
    strict: bool,
    /// The TCP stream to the other DICOM node
    socket: TcpStream,
    /// Read buffer from the socket
    read_buffer: BytesMut,
    /// Reusable buffer for sending PDUs on the wire
    write_buffer: Vec<u8>,
    /// The message ID to assign to the next DIMSE message
    message_id: u16,
    /// The ARTIM timer expiry, applied while releasing
    artim_timeout: Duration,
    /// Whether the association has already been closed
    closed: bool,
}

impl ClientAssociation {
    /// Obtain a view of the accepted presentation contexts.
    pub fn presentation_contexts(&self) -> &[PresentationContextNegotiated] {
        &self.presentation_contexts
    }

    /// Retrieve the maximum PDU length admitted by the peer node.
    pub fn peer_max_pdu_length(&self) -> u32 {
        self.peer_max_pdu_length
    }

    /// Issue the next message identifier for this association.
    /// Identifiers are monotonically increasing,
    /// wrapping back to 1 after 0xFFFF.
    pub fn next_message_id(&mut self) -> u16 {
        let id = self.message_id;
        self.message_id = match self.message_id {
            0xFFFF => 1,
            id => id + 1,
        };
        id
    }

    /// Send a PDU message to the other intervenient.
    pub fn send(&mut self, msg: &Pdu) -> Result<()> {
        send_pdu_to_wire(&mut self.socket, &mut self.write_buffer, msg)
    }

    /// Read a PDU message from the other intervenient.
    pub fn receive(&mut self) -> Result<Pdu> {
        read_pdu_from_wire(
            &mut self.socket,
            &mut self.read_buffer,
            self.max_pdu_length,
            self.strict,
        )
    }

    /// Obtain a writer which fragments an outgoing DIMSE message
    /// stream into presentation data values of the negotiated
    /// maximum size.
    pub fn send_pdata(
        &mut self,
        presentation_context_id: u8,
        value_type: PDataValueType,
    ) -> PDataWriter<&mut TcpStream> {
        PDataWriter::new(
            &mut self.socket,
            presentation_context_id,
            value_type,
            self.peer_max_pdu_length.min(MAXIMUM_PDU_SIZE),
        )
    }

    /// Gracefully release the association.
    ///
    /// No new DIMSE messages may be issued after this call.
    /// The ARTIM timer applies while waiting for the release response;
    /// on expiry, the association is aborted.
    pub fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.send(&Pdu::ReleaseRQ)?;
        self.socket
            .set_read_timeout(Some(self.artim_timeout))
            .context(super::SetReadTimeoutSnafu)?;

        let out = loop {
            match self.receive() {
                Ok(Pdu::ReleaseRP) => break Ok(()),
                Ok(Pdu::AbortRQ { .. }) => break AbortedSnafu.fail(),
                Ok(pdu) => {
                    // data arriving during release is discarded
                    tracing::debug!("discarding {} during release", pdu.short_description());
                }
                Err(Error::ArtimTimeout { .. }) => {
                    abort_and_shutdown(
                        &mut self.socket,
                        provider_abort(AbortRQServiceProviderReason::ReasonNotSpecified),
                    );
                    self.closed = true;
                    return super::ArtimTimeoutSnafu.fail();
                }
                Err(e) => break Err(e),
            }
        };

        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.closed = true;
        out
    }

    /// Abort the association immediately:
    /// an A-ABORT is sent and the transport is closed,
    /// without waiting for any further PDU.
    pub fn abort(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let out = self.send(&Pdu::AbortRQ {
            source: AbortRQSource::ServiceUser,
        });
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.closed = true;
        out
    }
}

impl Drop for ClientAssociation {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.release();
        }
    }
}
