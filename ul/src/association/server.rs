//! Association acceptor module
//!
//! The module provides an abstraction for a DICOM association
//! in which this application entity listens to incoming association
//! requests. See [`ServerAssociationOptions`]
//! for details and examples on how to create an association.
use bytes::BytesMut;
use std::borrow::Cow;
use std::net::TcpStream;
use std::time::Duration;

use crate::association::client::DEFAULT_ARTIM_TIMEOUT;
use crate::association::{
    abort_and_shutdown, provider_abort, read_pdu_from_wire, send_pdu_to_wire, trim_uid,
    AbortedSnafu, Error, MissingAbstractSyntaxSnafu, RejectedSnafu, Result, SocketOptions,
    UnexpectedPduSnafu, UnknownPduSnafu,
};
use crate::pdu::{
    AbortRQServiceProviderReason, AssociationAC, AssociationRJ, AssociationRJResult,
    AssociationRJServiceUserReason, AssociationRJSource, AssociationRQ, PDataValueType, Pdu,
    PresentationContextNegotiated, PresentationContextResult, PresentationContextResultReason,
    UserVariableItem, DEFAULT_MAX_PDU, MAXIMUM_PDU_SIZE, PDU_HEADER_SIZE,
};
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use dcm_encoding::transfer_syntax::TransferSyntaxRegistry;
use snafu::ensure;

use super::pdata::PDataWriter;

/// Common interface for application entity access control policies.
///
/// Existing implementations include [`AcceptAny`] and
/// [`AcceptCalledAeTitle`], but users are free to implement their own.
pub trait AccessControl {
    /// Obtain the decision of whether to accept an incoming association
    /// request based on the recorded application entity titles.
    ///
    /// Returns `Ok(())` if the requesting node should be given
    /// clearance. Otherwise, a concrete association rejection
    /// service-user reason is given.
    fn check_access(
        &self,
        this_ae_title: &str,
        calling_ae_title: &str,
        called_ae_title: &str,
    ) -> std::result::Result<(), AssociationRJServiceUserReason>;
}

/// An access control rule that accepts any incoming association request.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct AcceptAny;

impl AccessControl for AcceptAny {
    fn check_access(
        &self,
        _this_ae_title: &str,
        _calling_ae_title: &str,
        _called_ae_title: &str,
    ) -> std::result::Result<(), AssociationRJServiceUserReason> {
        Ok(())
    }
}

/// An access control rule that accepts association requests
/// when the called AE title matches the node's own AE title.
#[derive(Debug, Default, Copy, Clone, Eq, Hash, PartialEq)]
pub struct AcceptCalledAeTitle;

impl AccessControl for AcceptCalledAeTitle {
    fn check_access(
        &self,
        this_ae_title: &str,
        _calling_ae_title: &str,
        called_ae_title: &str,
    ) -> std::result::Result<(), AssociationRJServiceUserReason> {
        if this_ae_title == called_ae_title {
            Ok(())
        } else {
            Err(AssociationRJServiceUserReason::CalledAETitleNotRecognized)
        }
    }
}

/// The negotiated parameters of an accepted association,
/// produced while processing an association request.
#[derive(Debug)]
struct NegotiatedOptions {
    peer_max_pdu_length: u32,
    peer_ae_title: String,
    presentation_contexts: Vec<PresentationContextNegotiated>,
}

/// A DICOM association builder for an acceptor DICOM node,
/// often taking the role of a service class provider (SCP).
///
/// This is the standard way of negotiating and establishing
/// an association with a requesting node.
/// The outcome is a [`ServerAssociation`].
/// Unlike the [`ClientAssociationOptions`],
/// a value of this type can be reused for multiple connections.
///
/// [`ClientAssociationOptions`]: crate::association::ClientAssociationOptions
///
/// Access control logic is available,
/// enabling application entities to decide on
/// whether to accept or reject the association request
/// based on the _called_ and _calling_ AE titles.
///
/// - By default, the application will accept requests from anyone
///   ([`AcceptAny`])
/// - To only accept requests with a matching _called_ AE title,
///   add a call to [`accept_called_ae_title`][1]
///   ([`AcceptCalledAeTitle`]).
/// - Any other policy can be implemented through the
///   [`AccessControl`] trait.
///
/// [1]: Self::accept_called_ae_title
///
/// # Example
///
/// ```no_run
/// # use std::net::TcpListener;
/// # use dcm_ul::association::server::ServerAssociationOptions;
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// # let tcp_listener: TcpListener = unimplemented!();
/// let scp_options = ServerAssociationOptions::new()
///    .with_abstract_syntax("1.2.840.10008.1.1")
///    .with_transfer_syntax("1.2.840.10008.1.2.1");
///
/// let (stream, _address) = tcp_listener.accept()?;
/// scp_options.establish(stream)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServerAssociationOptions<'a, A> {
    /// the application entity access control policy
    ae_access_control: A,
    /// the AE title of this DICOM node
    ae_title: Cow<'a, str>,
    /// the expected application context name
    application_context_name: Cow<'a, str>,
    /// the list of supported abstract syntaxes
    abstract_syntax_uids: Vec<Cow<'a, str>>,
    /// the list of supported transfer syntaxes
    transfer_syntax_uids: Vec<Cow<'a, str>>,
    /// the expected protocol version
    protocol_version: u16,
    /// the maximum PDU length that this node accepts
    max_pdu_length: u32,
    /// whether to receive PDUs in strict mode
    strict: bool,
    /// whether to accept unknown abstract syntaxes
    promiscuous: bool,
    /// options for the underlying TCP socket
    socket_options: SocketOptions,
    /// the ARTIM timer expiry, applied while waiting
    /// for the association request and while releasing
    artim_timeout: Duration,
}

impl Default for ServerAssociationOptions<'_, AcceptAny> {
    fn default() -> Self {
        ServerAssociationOptions {
            ae_access_control: AcceptAny,
            ae_title: "THIS-SCP".into(),
            application_context_name: "1.2.840.10008.3.1.1.1".into(),
            abstract_syntax_uids: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            protocol_version: 1,
            max_pdu_length: DEFAULT_MAX_PDU,
            strict: true,
            promiscuous: false,
            socket_options: SocketOptions::default(),
            artim_timeout: DEFAULT_ARTIM_TIMEOUT,
        }
    }
}

impl ServerAssociationOptions<'_, AcceptAny> {
    /// Create a new set of options for establishing an association.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<'a, A> ServerAssociationOptions<'a, A>
where
    A: AccessControl,
{
    /// Change the access control policy to accept any association
    /// regardless of the specified AE titles.
    ///
    /// This is the default behavior when the options are first created.
    pub fn accept_any(self) -> ServerAssociationOptions<'a, AcceptAny> {
        self.ae_access_control(AcceptAny)
    }

    /// Change the access control policy to accept an association
    /// if the called AE title matches this node's AE title.
    pub fn accept_called_ae_title(self) -> ServerAssociationOptions<'a, AcceptCalledAeTitle> {
        self.ae_access_control(AcceptCalledAeTitle)
    }

    /// Change the access control policy.
    pub fn ae_access_control<P>(self, access_control: P) -> ServerAssociationOptions<'a, P>
    where
        P: AccessControl,
    {
        let ServerAssociationOptions {
            ae_title,
            application_context_name,
            abstract_syntax_uids,
            transfer_syntax_uids,
            protocol_version,
            max_pdu_length,
            strict,
            promiscuous,
            socket_options,
            artim_timeout,
            ae_access_control: _,
        } = self;

        ServerAssociationOptions {
            ae_access_control: access_control,
            ae_title,
            application_context_name,
            abstract_syntax_uids,
            transfer_syntax_uids,
            protocol_version,
            max_pdu_length,
            strict,
            promiscuous,
            socket_options,
            artim_timeout,
        }
    }

    /// Define the application entity title referring to this DICOM node.
    ///
    /// The default is `THIS-SCP`.
    pub fn ae_title<T>(mut self, ae_title: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.ae_title = ae_title.into();
        self
    }

    /// Include this abstract syntax
    /// in the list of accepted presentation contexts.
    pub fn with_abstract_syntax<T>(mut self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.abstract_syntax_uids
            .push(trim_uid(abstract_syntax_uid.into()));
        self
    }

    /// Include this transfer syntax
    /// in the set admitted for each presentation context.
    pub fn with_transfer_syntax<T>(mut self, transfer_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
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

    /// Override promiscuous mode:
    /// whether to accept unknown abstract syntaxes.
    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    /// Set the read timeout for the underlying TCP socket
    /// on an established association.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout for the underlying TCP socket.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.socket_options.write_timeout = Some(timeout);
        self
    }

    /// Override the ARTIM timer expiry, applied while waiting
    /// for the association request after the TCP connection
    /// and while releasing.
    pub fn artim_timeout(mut self, timeout: Duration) -> Self {
        self.artim_timeout = timeout;
        self
    }

    /// Process an association request PDU.
    ///
    /// In the success case, returns the PDU to write back to the
    /// requestor and the negotiated association parameters.
    /// In the error case, returns the rejection or abort PDU
    /// to write back, and the error to surface.
    #[allow(clippy::result_large_err)]
    fn process_a_association_rq(
        &self,
        msg: Pdu,
    ) -> std::result::Result<(Pdu, NegotiatedOptions), (Pdu, Error)> {
        match msg {
            Pdu::AssociationRQ(AssociationRQ {
                protocol_version,
                calling_ae_title,
                called_ae_title,
                application_context_name,
                presentation_contexts,
                user_variables,
            }) => {
                if protocol_version != self.protocol_version {
                    let association_rj = AssociationRJ {
                        result: AssociationRJResult::Permanent,
                        source: AssociationRJSource::ServiceProviderAsce(
                            crate::pdu::AssociationRJServiceProviderAsceReason::ProtocolVersionNotSupported,
                        ),
                    };
                    let pdu = Pdu::AssociationRJ(association_rj.clone());
                    return Err((pdu, RejectedSnafu { association_rj }.build()));
                }

                if application_context_name != self.application_context_name {
                    let association_rj = AssociationRJ {
                        result: AssociationRJResult::Permanent,
                        source: AssociationRJSource::ServiceUser(
                            AssociationRJServiceUserReason::ApplicationContextNameNotSupported,
                        ),
                    };
                    let pdu = Pdu::AssociationRJ(association_rj.clone());
                    return Err((pdu, RejectedSnafu { association_rj }.build()));
                }

                if let Err(reason) = self.ae_access_control.check_access(
                    &self.ae_title,
                    &calling_ae_title,
                    &called_ae_title,
                ) {
                    let association_rj = AssociationRJ {
                        result: AssociationRJResult::Permanent,
                        source: AssociationRJSource::ServiceUser(reason),
                    };
                    let pdu = Pdu::AssociationRJ(association_rj.clone());
                    return Err((pdu, RejectedSnafu { association_rj }.build()));
                }

                // fetch the maximum PDU length the requestor accepts;
                // zero means practically unlimited
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

                let presentation_contexts_negotiated: Vec<_> = presentation_contexts
                    .into_iter()
                    .map(|pc| {
                        let abstract_syntax = trim_uid(Cow::from(pc.abstract_syntax));
                        if !self.abstract_syntax_uids.contains(&abstract_syntax)
                            && !self.promiscuous
                        {
                            return PresentationContextNegotiated {
                                id: pc.id,
                                reason:
                                    PresentationContextResultReason::AbstractSyntaxNotSupported,
                                transfer_syntax: "1.2.840.10008.1.2".to_string(),
                                abstract_syntax: abstract_syntax.to_string(),
                            };
                        }

                        let (transfer_syntax, reason) = self
                            .choose_ts(pc.transfer_syntaxes)
                            .map(|ts| (ts, PresentationContextResultReason::Acceptance))
                            .unwrap_or_else(|| {
                                (
                                    "1.2.840.10008.1.2".to_string(),
                                    PresentationContextResultReason::TransferSyntaxesNotSupported,
                                )
                            });

                        PresentationContextNegotiated {
                            id: pc.id,
                            reason,
                            transfer_syntax,
                            abstract_syntax: abstract_syntax.to_string(),
                        }
                    })
                    .collect();

                let pdu = Pdu::AssociationAC(AssociationAC {
                    protocol_version: self.protocol_version,
                    application_context_name,
                    presentation_contexts: presentation_contexts_negotiated
                        .iter()
                        .map(|pc| PresentationContextResult {
                            id: pc.id,
                            reason: pc.reason,
                            transfer_syntax: pc.transfer_syntax.clone(),
                        })
                        .collect(),
                    calling_ae_title: calling_ae_title.clone(),
                    called_ae_title,
                    user_variables: vec![
                        UserVariableItem::MaxLength(self.max_pdu_length),
                        UserVariableItem::ImplementationClassUID(
                            IMPLEMENTATION_CLASS_UID.to_string(),
                        ),
                        UserVariableItem::ImplementationVersionName(
                            IMPLEMENTATION_VERSION_NAME.to_string(),
                        ),
                    ],
                });
                Ok((
                    pdu,
                    NegotiatedOptions {
                        peer_max_pdu_length,
                        peer_ae_title: calling_ae_title,
                        presentation_contexts: presentation_contexts_negotiated,
                    },
                ))
            }
            Pdu::ReleaseRQ => Err((Pdu::ReleaseRP, AbortedSnafu.build())),
            pdu @ Pdu::AssociationAC { .. }
            | pdu @ Pdu::AssociationRJ { .. }
            | pdu @ Pdu::PData { .. }
            | pdu @ Pdu::ReleaseRP
            | pdu @ Pdu::AbortRQ { .. } => Err((
                Pdu::AbortRQ {
                    source: provider_abort(AbortRQServiceProviderReason::UnexpectedPdu),
                },
                UnexpectedPduSnafu { pdu: Box::new(pdu) }.build(),
            )),
            pdu @ Pdu::Unknown { .. } => Err((
                Pdu::AbortRQ {
                    source: provider_abort(AbortRQServiceProviderReason::UnrecognizedPdu),
                },
                UnknownPduSnafu { pdu: Box::new(pdu) }.build(),
            )),
        }
    }

    /// Negotiate an association with the given TCP stream.
    ///
    /// The ARTIM timer applies while waiting for the association
    /// request; on expiry, an A-ABORT is sent and the association
    /// is dropped.
    pub fn establish(&self, mut socket: TcpStream) -> Result<ServerAssociation> {
        ensure!(
            !self.abstract_syntax_uids.is_empty() || self.promiscuous,
            MissingAbstractSyntaxSnafu
        );

        socket
            .set_read_timeout(Some(self.artim_timeout))
            .context_read_timeout()?;
        socket
            .set_write_timeout(self.socket_options.write_timeout)
            .context_write_timeout()?;

        let mut read_buffer =
            BytesMut::with_capacity((self.max_pdu_length + PDU_HEADER_SIZE) as usize);
        let msg = match read_pdu_from_wire(
            &mut socket,
            &mut read_buffer,
            self.max_pdu_length,
            self.strict,
        ) {
            Ok(msg) => msg,
            Err(e @ Error::ArtimTimeout { .. }) => {
                abort_and_shutdown(
                    &mut socket,
                    provider_abort(AbortRQServiceProviderReason::ReasonNotSpecified),
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let mut write_buffer: Vec<u8> = Vec::with_capacity(self.max_pdu_length as usize);
        match self.process_a_association_rq(msg) {
            Ok((
                pdu,
                NegotiatedOptions {
                    peer_max_pdu_length,
                    peer_ae_title,
                    presentation_contexts,
                },
            )) => {
                send_pdu_to_wire(&mut socket, &mut write_buffer, &pdu)?;
                // the association is established:
                // the ARTIM timer no longer applies
                socket
                    .set_read_timeout(self.socket_options.read_timeout)
                    .context_read_timeout()?;
                Ok(ServerAssociation {
                    presentation_contexts,
                    peer_max_pdu_length,
                    max_pdu_length: self.max_pdu_length,
                    socket,
                    peer_ae_title,
                    write_buffer,
                    strict: self.strict,
                    read_buffer,
                    artim_timeout: self.artim_timeout,
                    closed: false,
                })
            }
            Err((pdu, err)) => {
                // send the rejection/abort PDU
                send_pdu_to_wire(&mut socket, &mut write_buffer, &pdu)?;
                let _ = socket.shutdown(std::net::Shutdown::Both);
                Err(err)
            }
        }
    }

    /// From a sequence of transfer syntaxes,
    /// choose the first transfer syntax to
    /// - be on the options' list of transfer syntaxes, and
    /// - be supported by the transfer syntax registry.
    ///
    /// If the options' list is empty,
    /// accept the first supported transfer syntax.
    fn choose_ts<I, T>(&self, it: I) -> Option<T>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        if self.transfer_syntax_uids.is_empty() {
            return choose_supported(it);
        }

        it.into_iter().find(|ts| {
            self.transfer_syntax_uids
                .contains(&trim_uid(Cow::from(ts.as_ref())))
                && is_supported(ts.as_ref())
        })
    }
}

/// Check that the transfer syntax registry supports the given
/// transfer syntax, meaning that data sets in it can be decoded.
pub fn is_supported(ts_uid: &str) -> bool {
    TransferSyntaxRegistry.get(ts_uid).is_some()
}

/// From a sequence of transfer syntaxes, choose the first to be
/// supported by the transfer syntax registry.
pub fn choose_supported<I, T>(it: I) -> Option<T>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    it.into_iter().find(|ts| is_supported(ts.as_ref()))
}

// small socket timeout adapters, to keep `establish` readable
trait TimeoutContext<T> {
    fn context_read_timeout(self) -> Result<T>;
    fn context_write_timeout(self) -> Result<T>;
}

impl<T> TimeoutContext<T> for std::io::Result<T> {
    fn context_read_timeout(self) -> Result<T> {
        use snafu::ResultExt;
        self.context(crate::association::SetReadTimeoutSnafu)
    }

    fn context_write_timeout(self) -> Result<T> {
        use snafu::ResultExt;
        self.context(crate::association::SetWriteTimeoutSnafu)
    }
}

/// A DICOM upper level association from the perspective
/// of an accepting application entity.
///
/// The most common operations of an established association are
/// [`send`](Self::send) and [`receive`](Self::receive).
/// Sending large P-Data fragments may be easier through the P-Data
/// sender abstraction (see [`send_pdata`](Self::send_pdata)).
///
/// When the value falls out of scope,
/// the program will shut down the underlying TCP connection.
#[derive(Debug)]
pub struct ServerAssociation {
    /// The negotiated presentation contexts
    presentation_contexts: Vec<PresentationContextNegotiated>,
    /// The maximum PDU length that the remote application entity accepts
    peer_max_pdu_length: u32,
    /// The maximum PDU length that this application entity accepts
    max_pdu_length: u32,
    /// The TCP stream to the other DICOM node
    socket: TcpStream,
    /// The application entity title of the other DICOM node
    peer_ae_title: String,
    /// Reusable buffer for sending PDUs on the wire
    write_buffer: Vec<u8>,
    /// whether to receive PDUs in strict mode
    strict: bool,
    /// Read buffer from the socket
    read_buffer: BytesMut,
    /// The ARTIM timer expiry, applied while releasing
    artim_timeout: Duration,
    /// Whether the association has already been closed
    closed: bool,
}

impl ServerAssociation {
    /// Obtain a view of the negotiated presentation contexts.
    pub fn presentation_contexts(&self) -> &[PresentationContextNegotiated] {
        &self.presentation_contexts
    }

    /// Obtain the remote DICOM node's application entity title.
    pub fn peer_ae_title(&self) -> &str {
        &self.peer_ae_title
    }

    /// Retrieve the maximum PDU length admitted by the peer node.
    pub fn peer_max_pdu_length(&self) -> u32 {
        self.peer_max_pdu_length
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
    /// stream into presentation data values, each not exceeding
    /// the negotiated maximum PDU size.
    pub fn send_pdata(
        &mut self,
        presentation_context_id: u8,
        value_type: PDataValueType,
    ) -> PDataWriter<&mut TcpStream> {
        PDataWriter::new(
            &mut self.socket,
            presentation_context_id,
            value_type,
            self.peer_max_pdu_length.min(self.max_pdu_length),
        )
    }

    /// Gracefully release the association from this side.
    ///
    /// The ARTIM timer applies while waiting for the release response;
    /// on expiry, the association is aborted.
    pub fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.send(&Pdu::ReleaseRQ)?;
        self.socket
            .set_read_timeout(Some(self.artim_timeout))
            .context_read_timeout()?;

        let out = loop {
            match self.receive() {
                Ok(Pdu::ReleaseRP) => break Ok(()),
                Ok(Pdu::AbortRQ { .. }) => break AbortedSnafu.fail(),
                Ok(pdu) => {
                    tracing::debug!("discarding {} during release", pdu.short_description());
                }
                Err(e @ Error::ArtimTimeout { .. }) => {
                    abort_and_shutdown(
                        &mut self.socket,
                        provider_abort(AbortRQServiceProviderReason::ReasonNotSpecified),
                    );
                    self.closed = true;
                    return Err(e);
                }
                Err(e) => break Err(e),
            }
        };

        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.closed = true;
        out
    }

    /// Reply to a received release request and close the association.
    pub fn confirm_release(&mut self) -> Result<()> {
        let out = self.send(&Pdu::ReleaseRP);
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.closed = true;
        out
    }

    /// Abort the association immediately:
    /// an A-ABORT is sent and the transport is closed.
    pub fn abort(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let out = self.send(&Pdu::AbortRQ {
            source: provider_abort(AbortRQServiceProviderReason::ReasonNotSpecified),
        });
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.closed = true;
        out
    }

    /// Mark the association as closed without sending further PDUs,
    /// shutting the transport down.
    pub fn close(&mut self) {
        let _ = self.socket.shutdown(std::net::Shutdown::Both);
        self.closed = true;
    }
}

impl Drop for ServerAssociation {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.socket.shutdown(std::net::Shutdown::Both);
        }
    }
}
