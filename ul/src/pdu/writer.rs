//! PDU writer module
//!
//! Encoding mirrors the reader's two stages: every PDU is framed as a
//! type byte, a reserved byte and a length-prefixed body, with the
//! body built through small helpers. A-ASSOCIATE-RQ and -AC share
//! their fixed head and item framing, differing only in which
//! presentation context items they carry.

use crate::pdu::*;
use byteordered::byteorder::{BigEndian, WriteBytesExt};
use dcm_encoding::text::{DefaultCharacterSetCodec, TextCodec};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::Write;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not write chunk of PDU `{}`", name))]
    WriteChunk {
        name: &'static str,
        #[snafu(backtrace)]
        source: WriteChunkError,
    },

    #[snafu(display("could not write PDU field `{}`", field))]
    WriteField {
        field: &'static str,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("could not encode text field `{}`", field))]
    EncodeField {
        field: &'static str,
        #[snafu(backtrace)]
        source: dcm_encoding::text::EncodeTextError,
    },
}

#[derive(Debug, Snafu)]
pub enum WriteChunkError {
    #[snafu(display("failed to build chunk"))]
    BuildChunk {
        #[snafu(backtrace)]
        source: Box<Error>,
    },
    #[snafu(display("failed to write chunk length"))]
    WriteLength {
        backtrace: Backtrace,
        source: std::io::Error,
    },
    #[snafu(display("failed to write chunk data"))]
    WriteData {
        backtrace: Backtrace,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

fn write_chunk_u32<F>(writer: &mut dyn Write, func: F) -> std::result::Result<(), WriteChunkError>
where
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut data = vec![];
    func(&mut data).map_err(Box::from).context(BuildChunkSnafu)?;

    let length = data.len() as u32;
    writer
        .write_u32::<BigEndian>(length)
        .context(WriteLengthSnafu)?;

    writer.write_all(&data).context(WriteDataSnafu)?;

    Ok(())
}

fn write_chunk_u16<F>(writer: &mut dyn Write, func: F) -> std::result::Result<(), WriteChunkError>
where
    F: FnOnce(&mut Vec<u8>) -> Result<()>,
{
    let mut data = vec![];
    func(&mut data).map_err(Box::from).context(BuildChunkSnafu)?;

    let length = data.len() as u16;
    writer
        .write_u16::<BigEndian>(length)
        .context(WriteLengthSnafu)?;

    writer.write_all(&data).context(WriteDataSnafu)?;

    Ok(())
}

/// Write a full PDU to the given destination.
pub fn write_pdu<W>(writer: &mut W, pdu: &Pdu) -> Result<()>
where
    W: Write,
{
    match pdu {
        Pdu::AssociationRQ(rq) => write_association_pdu(
            writer,
            0x01,
            "A-ASSOCIATE-RQ",
            rq.protocol_version,
            &rq.called_ae_title,
            &rq.calling_ae_title,
            |out| {
                write_text_item(out, 0x10, &rq.application_context_name, "Application-context-name")?;
                for context in &rq.presentation_contexts {
                    write_proposed_context(out, context)?;
                }
                write_user_information(out, &rq.user_variables)
            },
        ),
        Pdu::AssociationAC(ac) => write_association_pdu(
            writer,
            0x02,
            "A-ASSOCIATE-AC",
            ac.protocol_version,
            &ac.called_ae_title,
            &ac.calling_ae_title,
            |out| {
                write_text_item(out, 0x10, &ac.application_context_name, "Application-context-name")?;
                for context in &ac.presentation_contexts {
                    write_context_result(out, context)?;
                }
                write_user_information(out, &ac.user_variables)
            },
        ),
        Pdu::AssociationRJ(AssociationRJ { result, source }) => {
            write_framed(writer, 0x03, "A-ASSOCIATE-RJ", |out| {
                let result = match result {
                    AssociationRJResult::Permanent => 0x01,
                    AssociationRJResult::Transient => 0x02,
                };
                let (source, reason) = reject_codes(source);
                // one reserved byte, then the three codes
                out.write_all(&[0x00, result, source, reason])
                    .context(WriteFieldSnafu {
                        field: "Result/Source/Reason",
                    })
            })
        }
        Pdu::PData { data } => write_framed(writer, 0x04, "P-DATA-TF", |out| {
            for value in data {
                // the PDV length covers the context ID and control header
                out.write_u32::<BigEndian>(value.data.len() as u32 + 2)
                    .context(WriteFieldSnafu { field: "PDV-length" })?;
                out.write_u8(value.presentation_context_id)
                    .context(WriteFieldSnafu {
                        field: "Presentation-context-ID",
                    })?;
                let mut control = 0x00;
                if value.value_type == PDataValueType::Command {
                    control |= 0x01;
                }
                if value.is_last {
                    control |= 0x02;
                }
                out.write_u8(control).context(WriteFieldSnafu {
                    field: "Message-control-header",
                })?;
                out.write_all(&value.data).context(WriteFieldSnafu {
                    field: "Presentation-data-value",
                })?;
            }
            Ok(())
        }),
        Pdu::ReleaseRQ => write_framed(writer, 0x05, "A-RELEASE-RQ", write_reserved_body),
        Pdu::ReleaseRP => write_framed(writer, 0x06, "A-RELEASE-RP", write_reserved_body),
        Pdu::AbortRQ { source } => write_framed(writer, 0x07, "A-ABORT", |out| {
            let (source, reason) = abort_codes(source);
            // two reserved bytes, then the two codes
            out.write_all(&[0x00, 0x00, source, reason])
                .context(WriteFieldSnafu {
                    field: "Source/Reason",
                })
        }),
        Pdu::Unknown { pdu_type, data } => write_framed(writer, *pdu_type, "Unknown", |out| {
            out.write_all(data).context(WriteFieldSnafu {
                field: "Unknown-data",
            })
        }),
    }
}

/// Write the framing shared by every PDU:
/// the type byte, a reserved byte, and the length-prefixed body.
fn write_framed(
    writer: &mut dyn Write,
    pdu_type: u8,
    name: &'static str,
    body: impl FnOnce(&mut Vec<u8>) -> Result<()>,
) -> Result<()> {
    writer
        .write_u8(pdu_type)
        .context(WriteFieldSnafu { field: "PDU-type" })?;
    writer
        .write_u8(0x00)
        .context(WriteFieldSnafu { field: "reserved" })?;
    write_chunk_u32(writer, body).context(WriteChunkSnafu { name })
}

/// The body of A-RELEASE-RQ and -RP: four reserved bytes.
fn write_reserved_body(out: &mut Vec<u8>) -> Result<()> {
    out.write_all(&[0x00; 4])
        .context(WriteFieldSnafu { field: "reserved" })
}

/// Write the framing shared by A-ASSOCIATE-RQ and -AC:
/// protocol version and both application entity title slots,
/// interleaved with reserved regions, followed by the variable items.
fn write_association_pdu(
    writer: &mut dyn Write,
    pdu_type: u8,
    name: &'static str,
    protocol_version: u16,
    called_ae_title: &str,
    calling_ae_title: &str,
    items: impl FnOnce(&mut Vec<u8>) -> Result<()>,
) -> Result<()> {
    write_framed(writer, pdu_type, name, |out| {
        out.write_u16::<BigEndian>(protocol_version)
            .context(WriteFieldSnafu {
                field: "Protocol-version",
            })?;
        out.write_u16::<BigEndian>(0x00)
            .context(WriteFieldSnafu { field: "reserved" })?;
        write_ae_title(out, called_ae_title, "Called-AE-title")?;
        write_ae_title(out, calling_ae_title, "Calling-AE-title")?;
        out.write_all(&[0x00; 32])
            .context(WriteFieldSnafu { field: "reserved" })?;
        items(out)
    })
}

/// AE titles travel as exactly 16 characters of the basic G0 set,
/// padded with trailing spaces.
fn write_ae_title(out: &mut Vec<u8>, title: &str, field: &'static str) -> Result<()> {
    let mut raw = DefaultCharacterSetCodec
        .encode(title)
        .context(EncodeFieldSnafu { field })?;
    raw.resize(16, b' ');
    out.write_all(&raw).context(WriteFieldSnafu { field })
}

/// Write one variable item or sub-item: type byte, reserved byte,
/// and the 16-bit length-prefixed payload.
fn write_item(
    out: &mut dyn Write,
    item_type: u8,
    name: &'static str,
    payload: impl FnOnce(&mut Vec<u8>) -> Result<()>,
) -> Result<()> {
    out.write_u8(item_type)
        .context(WriteFieldSnafu { field: "Item-type" })?;
    out.write_u8(0x00)
        .context(WriteFieldSnafu { field: "reserved" })?;
    write_chunk_u16(out, payload).context(WriteChunkSnafu { name })
}

/// Write an item whose payload is a single text value,
/// such as UID-valued items and sub-items.
fn write_text_item(
    out: &mut dyn Write,
    item_type: u8,
    value: &str,
    field: &'static str,
) -> Result<()> {
    write_item(out, item_type, field, |out| {
        let raw = DefaultCharacterSetCodec
            .encode(value)
            .context(EncodeFieldSnafu { field })?;
        out.write_all(&raw).context(WriteFieldSnafu { field })
    })
}

/// A proposed presentation context (item type 20H): the context
/// identifier, one abstract syntax sub-item and one transfer syntax
/// sub-item per admitted syntax.
fn write_proposed_context(
    out: &mut Vec<u8>,
    context: &PresentationContextProposed,
) -> Result<()> {
    write_item(out, 0x20, "Presentation Context Item", |out| {
        out.write_u8(context.id).context(WriteFieldSnafu {
            field: "Presentation-context-ID",
        })?;
        out.write_all(&[0x00; 3])
            .context(WriteFieldSnafu { field: "reserved" })?;
        write_text_item(out, 0x30, &context.abstract_syntax, "Abstract-syntax-name")?;
        for transfer_syntax in &context.transfer_syntaxes {
            write_text_item(out, 0x40, transfer_syntax, "Transfer-syntax-name")?;
        }
        Ok(())
    })
}

/// A negotiated presentation context (item type 21H): the context
/// identifier, the result code, and exactly one transfer syntax
/// sub-item.
fn write_context_result(out: &mut Vec<u8>, context: &PresentationContextResult) -> Result<()> {
    write_item(out, 0x21, "Presentation Context Item", |out| {
        out.write_u8(context.id).context(WriteFieldSnafu {
            field: "Presentation-context-ID",
        })?;
        out.write_u8(0x00)
            .context(WriteFieldSnafu { field: "reserved" })?;
        out.write_u8(context.reason as u8)
            .context(WriteFieldSnafu {
                field: "Result/Reason",
            })?;
        out.write_u8(0x00)
            .context(WriteFieldSnafu { field: "reserved" })?;
        write_text_item(out, 0x40, &context.transfer_syntax, "Transfer-syntax-name")
    })
}

/// The user information item (type 50H), wrapping one sub-item
/// per user variable. Absent when there are no variables to carry.
fn write_user_information(out: &mut Vec<u8>, variables: &[UserVariableItem]) -> Result<()> {
    if variables.is_empty() {
        return Ok(());
    }
    write_item(out, 0x50, "User Information Item", |out| {
        for variable in variables {
            match variable {
                UserVariableItem::MaxLength(max_length) => {
                    write_item(out, 0x51, "Maximum Length Sub-Item", |out| {
                        out.write_u32::<BigEndian>(*max_length)
                            .context(WriteFieldSnafu {
                                field: "Maximum-length-received",
                            })
                    })?;
                }
                UserVariableItem::ImplementationClassUID(uid) => {
                    write_text_item(out, 0x52, uid, "Implementation-class-uid")?;
                }
                UserVariableItem::ImplementationVersionName(name) => {
                    write_text_item(out, 0x55, name, "Implementation-version-name")?;
                }
                UserVariableItem::Unknown(item_type, data) => {
                    write_item(out, *item_type, "Unknown Sub-Item", |out| {
                        out.write_all(data).context(WriteFieldSnafu {
                            field: "Unknown-data",
                        })
                    })?;
                }
            }
        }
        Ok(())
    })
}

/// The source and reason code pair of an association rejection.
fn reject_codes(source: &AssociationRJSource) -> (u8, u8) {
    match source {
        AssociationRJSource::ServiceUser(reason) => (
            0x01,
            match reason {
                AssociationRJServiceUserReason::NoReasonGiven => 0x01,
                AssociationRJServiceUserReason::ApplicationContextNameNotSupported => 0x02,
                AssociationRJServiceUserReason::CallingAETitleNotRecognized => 0x03,
                AssociationRJServiceUserReason::CalledAETitleNotRecognized => 0x07,
                AssociationRJServiceUserReason::Reserved(code) => *code,
            },
        ),
        AssociationRJSource::ServiceProviderAsce(reason) => (
            0x02,
            match reason {
                AssociationRJServiceProviderAsceReason::NoReasonGiven => 0x01,
                AssociationRJServiceProviderAsceReason::ProtocolVersionNotSupported => 0x02,
            },
        ),
        AssociationRJSource::ServiceProviderPresentation(reason) => (
            0x03,
            match reason {
                AssociationRJServiceProviderPresentationReason::TemporaryCongestion => 0x01,
                AssociationRJServiceProviderPresentationReason::LocalLimitExceeded => 0x02,
                AssociationRJServiceProviderPresentationReason::Reserved(code) => *code,
            },
        ),
    }
}

/// The source and reason code pair of an association abort.
fn abort_codes(source: &AbortRQSource) -> (u8, u8) {
    match source {
        AbortRQSource::ServiceUser => (0x00, 0x00),
        AbortRQSource::Reserved => (0x01, 0x00),
        AbortRQSource::ServiceProvider(reason) => (
            0x02,
            match reason {
                AbortRQServiceProviderReason::ReasonNotSpecified => 0x00,
                AbortRQServiceProviderReason::UnrecognizedPdu => 0x01,
                AbortRQServiceProviderReason::UnexpectedPdu => 0x02,
                AbortRQServiceProviderReason::UnrecognizedPduParameter => 0x04,
                AbortRQServiceProviderReason::UnexpectedPduParameter => 0x05,
                AbortRQServiceProviderReason::InvalidPduParameter => 0x06,
            },
        ),
    }
}
