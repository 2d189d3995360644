//! The verification service (C-ECHO), on both sides of the association.
//!
//! [`echo`] performs a verification request over an established
//! client association. [`EchoServer`] runs a service class provider
//! which dispatches incoming C-ECHO requests to an [`EchoHandler`],
//! accepting up to a configured number of concurrent associations.

use crate::association::server::AccessControl;
use crate::association::{
    pdata::PDataReassembler, ClientAssociation, Error as AssociationError,
    ServerAssociationOptions,
};
use crate::commands::{self, CommandField};
use crate::pdu::{PDataValueType, Pdu};
use dcm_dictionary::{tags, uids};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// the association did not accept a verification context
    NoVerificationContext { backtrace: Backtrace },

    /// an association-level failure
    #[snafu(display("association error"))]
    Association {
        #[snafu(backtrace)]
        source: AssociationError,
    },

    /// could not encode the outgoing command set
    EncodeCommand {
        #[snafu(backtrace)]
        source: dcm_object::WriteError,
    },

    /// could not decode the incoming command set
    DecodeCommand {
        #[snafu(backtrace)]
        source: dcm_object::ReadError,
    },

    /// could not send the command set over the association
    SendCommand {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("unexpected command field {:?}", field))]
    UnexpectedCommand {
        field: Option<CommandField>,
        backtrace: Backtrace,
    },

    #[snafu(display("response to message {} arrived for message {}", expected, got))]
    MismatchedResponse {
        expected: u16,
        got: u16,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Perform a C-ECHO request over an established association
/// and wait for its response.
///
/// Returns the status code of the response
/// (`0x0000` for success).
pub fn echo(association: &mut ClientAssociation) -> Result<u16> {
    let context = association
        .presentation_contexts()
        .iter()
        .find(|pc| pc.abstract_syntax == uids::VERIFICATION)
        .context(NoVerificationContextSnafu)?;
    let context_id = context.id;

    let message_id = association.next_message_id();
    let command = commands::echo_rq(message_id);
    let bytes = commands::write_command_set(&command).context(EncodeCommandSnafu)?;

    let mut writer = association.send_pdata(context_id, PDataValueType::Command);
    writer.write_all(&bytes).context(SendCommandSnafu)?;
    writer.finish().context(SendCommandSnafu)?;

    let mut reassembler = PDataReassembler::new();
    loop {
        match association.receive().context(AssociationSnafu)? {
            Pdu::PData { data } => {
                for pdv in data {
                    reassembler.push(pdv);
                }
                if reassembler.command_complete() {
                    let response = commands::read_command_set(&reassembler.take_command())
                        .context(DecodeCommandSnafu)?;
                    let field = commands::command_field(&response);
                    if field != Some(CommandField::C_ECHO_RSP) {
                        return UnexpectedCommandSnafu { field }.fail();
                    }
                    let responded_to = response
                        .uint16(tags::MESSAGE_ID_BEING_RESPONDED_TO)
                        .unwrap_or(0);
                    if responded_to != message_id {
                        return MismatchedResponseSnafu {
                            expected: message_id,
                            got: responded_to,
                        }
                        .fail();
                    }
                    let status = response.uint16(tags::STATUS).unwrap_or(0xC000);
                    return Ok(status);
                }
            }
            Pdu::AbortRQ { .. } => {
                return crate::association::AbortedSnafu
                    .fail()
                    .context(AssociationSnafu)
            }
            pdu => {
                return crate::association::UnexpectedPduSnafu { pdu: Box::new(pdu) }
                    .fail()
                    .context(AssociationSnafu)
            }
        }
    }
}

/// The parameters of an incoming verification request.
#[derive(Debug, Clone)]
pub struct EchoRequest {
    /// the request's message identifier
    pub message_id: u16,
    /// the affected SOP class UID carried in the request
    pub affected_sop_class_uid: String,
    /// the requesting node's application entity title
    pub calling_ae_title: String,
}

/// A user-provided handler for incoming verification requests.
pub trait EchoHandler: Send + Sync {
    /// Handle a verification request,
    /// producing the status code of the response.
    /// The default implementation reports success.
    fn on_c_echo(&self, _request: &EchoRequest) -> u16 {
        commands::STATUS_SUCCESS
    }
}

/// The default verification handler: always succeeds.
#[derive(Debug, Default, Copy, Clone)]
pub struct AlwaysSuccess;

impl EchoHandler for AlwaysSuccess {}

/// A verification service class provider over a TCP listener.
///
/// One OS thread serves each association;
/// accepts are capped by `max_associations` and the number
/// of associations currently served is observable through
/// [`active_associations`](Self::active_associations).
pub struct EchoServer<A, H> {
    options: ServerAssociationOptions<'static, A>,
    handler: Arc<H>,
    active: Arc<AtomicUsize>,
    max_associations: usize,
}

impl<A: Clone, H> Clone for EchoServer<A, H> {
    fn clone(&self) -> Self {
        EchoServer {
            options: self.options.clone(),
            handler: Arc::clone(&self.handler),
            active: Arc::clone(&self.active),
            max_associations: self.max_associations,
        }
    }
}

impl<A: std::fmt::Debug, H> std::fmt::Debug for EchoServer<A, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoServer")
            .field("options", &self.options)
            .field("active", &self.active)
            .field("max_associations", &self.max_associations)
            .finish()
    }
}

impl<A> EchoServer<A, AlwaysSuccess>
where
    A: AccessControl,
{
    /// Create a verification provider over the given association
    /// options, with the default (always succeeding) handler.
    ///
    /// The verification abstract syntax is added to the options
    /// if not present.
    pub fn new(options: ServerAssociationOptions<'static, A>) -> Self {
        Self::with_handler(options, AlwaysSuccess)
    }
}

impl<A, H> EchoServer<A, H>
where
    A: AccessControl,
    H: EchoHandler,
{
    /// Create a verification provider with a custom handler.
    pub fn with_handler(options: ServerAssociationOptions<'static, A>, handler: H) -> Self {
        EchoServer {
            options: options.with_abstract_syntax(uids::VERIFICATION),
            handler: Arc::new(handler),
            active: Arc::new(AtomicUsize::new(0)),
            max_associations: 16,
        }
    }

    /// Set the maximum number of concurrent associations.
    pub fn max_associations(mut self, max: usize) -> Self {
        self.max_associations = max;
        self
    }

    /// The number of associations currently being served.
    pub fn active_associations(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl<A, H> EchoServer<A, H>
where
    A: AccessControl + Clone + Send + Sync + 'static,
    H: EchoHandler + 'static,
{
    /// Serve incoming connections on the given listener, forever.
    ///
    /// Connections beyond the association cap are dropped without
    /// negotiation. Failures of a single association are logged
    /// and do not take the server down.
    pub fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        for stream in listener.incoming() {
            let stream = stream?;
            if self.active.load(Ordering::SeqCst) >= self.max_associations {
                tracing::warn!("association cap reached, dropping incoming connection");
                drop(stream);
                continue;
            }

            let options = self.options.clone();
            let handler = Arc::clone(&self.handler);
            let active = Arc::clone(&self.active);
            active.fetch_add(1, Ordering::SeqCst);
            std::thread::spawn(move || {
                if let Err(e) = serve_association(&options, handler.as_ref(), stream) {
                    tracing::warn!("association ended with failure: {}", e);
                }
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }
        Ok(())
    }
}

/// Negotiate and serve a single association until release or abort.
fn serve_association<A, H>(
    options: &ServerAssociationOptions<'_, A>,
    handler: &H,
    stream: TcpStream,
) -> Result<()>
where
    A: AccessControl,
    H: EchoHandler + ?Sized,
{
    let mut association = options.establish(stream).context(AssociationSnafu)?;
    let peer_ae_title = association.peer_ae_title().to_string();
    let mut reassembler = PDataReassembler::new();

    loop {
        match association.receive() {
            Ok(Pdu::PData { data }) => {
                let mut context_id = None;
                for pdv in data {
                    context_id = Some(pdv.presentation_context_id);
                    reassembler.push(pdv);
                }
                if !reassembler.command_complete() {
                    continue;
                }
                let context_id = context_id.unwrap_or(1);
                let command = commands::read_command_set(&reassembler.take_command())
                    .context(DecodeCommandSnafu)?;

                match commands::command_field(&command) {
                    Some(CommandField::C_ECHO_RQ) => {
                        let request = EchoRequest {
                            message_id: command.uint16(tags::MESSAGE_ID).unwrap_or(0),
                            affected_sop_class_uid: command
                                .string(tags::AFFECTED_SOP_CLASS_UID)
                                .unwrap_or_default(),
                            calling_ae_title: peer_ae_title.clone(),
                        };
                        let status = handler.on_c_echo(&request);
                        let response = commands::echo_rsp(request.message_id, status);
                        let bytes = commands::write_command_set(&response)
                            .context(EncodeCommandSnafu)?;
                        let mut writer =
                            association.send_pdata(context_id, PDataValueType::Command);
                        writer.write_all(&bytes).context(SendCommandSnafu)?;
                        writer.finish().context(SendCommandSnafu)?;
                    }
                    field => {
                        // services beyond verification are not provided
                        let _ = association.abort();
                        return UnexpectedCommandSnafu { field }.fail();
                    }
                }
            }
            Ok(Pdu::ReleaseRQ) => {
                association.confirm_release().context(AssociationSnafu)?;
                return Ok(());
            }
            Ok(Pdu::AbortRQ { .. }) => {
                association.close();
                return Ok(());
            }
            Ok(pdu) => {
                let _ = association.abort();
                return crate::association::UnexpectedPduSnafu { pdu: Box::new(pdu) }
                    .fail()
                    .context(AssociationSnafu);
            }
            Err(AssociationError::ConnectionClosed { .. }) => {
                association.close();
                return Ok(());
            }
            Err(e) => {
                let _ = association.abort();
                return Err(e).context(AssociationSnafu);
            }
        }
    }
}
