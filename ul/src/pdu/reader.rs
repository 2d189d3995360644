//! PDU reader module
//!
//! Decoding is split in two stages: [`read_pdu`] frames a whole PDU
//! out of the stream (type, length policy, body bytes), and a parse
//! routine per PDU kind interprets the body. A-ASSOCIATE-RQ and -AC
//! share their fixed head and their variable item syntax, so those
//! are factored out and the two parse routines only differ in which
//! presentation context items they admit.

use crate::pdu::*;
use byteordered::byteorder::{BigEndian, ReadBytesExt};
use dcm_encoding::text::{DefaultCharacterSetCodec, TextCodec};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::io::{Cursor, ErrorKind, Read};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("invalid maximum PDU length {}", max_pdu_length))]
    InvalidMaxPdu {
        max_pdu_length: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("no PDU available"))]
    NoPduAvailable { backtrace: Backtrace },

    #[snafu(display("could not read PDU body"))]
    ReadBody {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("could not read PDU field `{}`", field))]
    ReadField {
        field: &'static str,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "incoming PDU of {} bytes exceeds the limit of {}",
        pdu_length,
        max_pdu_length
    ))]
    PduTooLarge {
        pdu_length: u32,
        max_pdu_length: u32,
        backtrace: Backtrace,
    },

    #[snafu(display("could not decode text field `{}`", field))]
    DecodeText {
        field: &'static str,
        #[snafu(backtrace)]
        source: dcm_encoding::text::DecodeTextError,
    },

    #[snafu(display("presentation data value of invalid length {}", length))]
    InvalidPDataLength { length: u32, backtrace: Backtrace },

    #[snafu(display("item of type {:#04X} does not hold its declared length", item_type))]
    TruncatedItem { item_type: u8, backtrace: Backtrace },

    #[snafu(display("unexpected item of type {:#04X} in {}", item_type, location))]
    UnexpectedItem {
        item_type: u8,
        location: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("missing mandatory {} item", item))]
    MissingItem {
        item: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("a presentation context carried more than one accepted transfer syntax"))]
    MultipleTransferSyntaxesAccepted { backtrace: Backtrace },

    #[snafu(display("unrecognized code {:#06X} in PDU field `{}`", code, field))]
    UnrecognizedCode {
        field: &'static str,
        code: u16,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A framed PDU body under interpretation.
type Body = Cursor<Vec<u8>>;

/// Read a full PDU from the given source.
///
/// In `strict` mode, an incoming PDU longer than `max_pdu_length`
/// is refused; otherwise such PDUs are admitted up to the absolute
/// protocol maximum, with a warning.
pub fn read_pdu<R>(reader: &mut R, max_pdu_length: u32, strict: bool) -> Result<Pdu>
where
    R: Read,
{
    ensure!(
        (MINIMUM_PDU_SIZE..=MAXIMUM_PDU_SIZE).contains(&max_pdu_length),
        InvalidMaxPduSnafu { max_pdu_length }
    );

    // Distinguish an idle stream from a truncated PDU: a stream which
    // closes right at a PDU boundary reports that no PDU is available,
    // while running dry anywhere past that point is an error.
    let mut head = [0u8; 2];
    if let Err(e) = reader.read_exact(&mut head) {
        ensure!(e.kind() != ErrorKind::UnexpectedEof, NoPduAvailableSnafu);
        return Err(e).context(ReadFieldSnafu { field: "PDU-type" });
    }
    let pdu_type = head[0];
    let pdu_length = reader
        .read_u32::<BigEndian>()
        .context(ReadFieldSnafu { field: "PDU-length" })?;

    if pdu_length > max_pdu_length {
        ensure!(
            !strict,
            PduTooLargeSnafu {
                pdu_length,
                max_pdu_length
            }
        );
        ensure!(
            pdu_length <= MAXIMUM_PDU_SIZE,
            PduTooLargeSnafu {
                pdu_length,
                max_pdu_length: MAXIMUM_PDU_SIZE
            }
        );
        tracing::warn!(
            "accepting oversized PDU of {} bytes (the limit is {})",
            pdu_length,
            max_pdu_length
        );
    }

    let mut body = Cursor::new(read_n(reader, pdu_length as usize).context(ReadBodySnafu)?);
    match pdu_type {
        0x01 => read_association_rq(&mut body),
        0x02 => read_association_ac(&mut body),
        0x03 => read_association_rj(&mut body),
        0x04 => read_pdata_tf(&mut body),
        0x05 => {
            skip_reserved(&mut body, 4)?;
            Ok(Pdu::ReleaseRQ)
        }
        0x06 => {
            skip_reserved(&mut body, 4)?;
            Ok(Pdu::ReleaseRP)
        }
        0x07 => read_abort(&mut body),
        _ => Ok(Pdu::Unknown {
            pdu_type,
            data: body.into_inner(),
        }),
    }
}

fn read_n<R>(reader: &mut R, bytes_to_read: usize) -> std::io::Result<Vec<u8>>
where
    R: Read,
{
    let mut buf = Vec::new();
    reader.take(bytes_to_read as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

fn bytes_left(body: &Body) -> u64 {
    body.get_ref().len() as u64 - body.position()
}

/// Consume `n` reserved bytes. Their values are not tested.
fn skip_reserved(body: &mut Body, n: usize) -> Result<()> {
    let mut sink = [0u8; 32];
    body.read_exact(&mut sink[..n])
        .context(ReadFieldSnafu { field: "reserved" })
}

fn decode_text(raw: &[u8], field: &'static str) -> Result<String> {
    Ok(DefaultCharacterSetCodec
        .decode(raw)
        .context(DecodeTextSnafu { field })?
        .trim()
        .to_string())
}

/// The fixed head shared by A-ASSOCIATE-RQ and A-ASSOCIATE-AC:
/// protocol version and the two application entity title slots,
/// interleaved with reserved regions. In the AC, the title slots are
/// reserved fields which echo the request.
struct AssociationHead {
    protocol_version: u16,
    called_ae_title: String,
    calling_ae_title: String,
}

fn read_association_head(body: &mut Body) -> Result<AssociationHead> {
    let protocol_version = body.read_u16::<BigEndian>().context(ReadFieldSnafu {
        field: "Protocol-version",
    })?;
    skip_reserved(body, 2)?;
    let called_ae_title = read_ae_title(body, "Called-AE-title")?;
    let calling_ae_title = read_ae_title(body, "Calling-AE-title")?;
    skip_reserved(body, 32)?;
    Ok(AssociationHead {
        protocol_version,
        called_ae_title,
        calling_ae_title,
    })
}

/// AE titles travel as exactly 16 characters of the basic G0 set;
/// leading and trailing spaces are not significant.
fn read_ae_title(body: &mut Body, field: &'static str) -> Result<String> {
    let mut raw = [0u8; 16];
    body.read_exact(&mut raw).context(ReadFieldSnafu { field })?;
    decode_text(&raw, field)
}

/// Read one variable item: type byte, reserved byte, 16-bit length,
/// and the declared number of payload bytes. The same framing applies
/// to sub-items.
fn read_item(body: &mut Body) -> Result<(u8, Vec<u8>)> {
    let item_type = body
        .read_u8()
        .context(ReadFieldSnafu { field: "Item-type" })?;
    skip_reserved(body, 1)?;
    let length = body.read_u16::<BigEndian>().context(ReadFieldSnafu {
        field: "Item-length",
    })?;
    let data = read_n(body, length as usize).context(ReadBodySnafu)?;
    ensure!(data.len() == length as usize, TruncatedItemSnafu { item_type });
    Ok((item_type, data))
}

/// The variable items admitted after an association head.
/// Which presentation context flavor is legal depends on the PDU kind,
/// so both are collected and the caller decides.
#[derive(Default)]
struct VariableItems {
    application_context_name: Option<String>,
    proposed_contexts: Vec<PresentationContextProposed>,
    context_results: Vec<PresentationContextResult>,
    user_variables: Vec<UserVariableItem>,
}

fn read_variable_items(body: &mut Body, location: &'static str) -> Result<VariableItems> {
    let mut items = VariableItems::default();
    while bytes_left(body) > 0 {
        let (item_type, data) = read_item(body)?;
        match item_type {
            0x10 => {
                items.application_context_name =
                    Some(decode_text(&data, "Application-context-name")?);
            }
            0x20 => items
                .proposed_contexts
                .push(read_proposed_context(Cursor::new(data))?),
            0x21 => items
                .context_results
                .push(read_context_result(Cursor::new(data))?),
            0x50 => items.user_variables = read_user_information(Cursor::new(data))?,
            item_type => {
                return UnexpectedItemSnafu {
                    item_type,
                    location,
                }
                .fail();
            }
        }
    }
    Ok(items)
}

/// A proposed presentation context (item type 20H): the context
/// identifier, one abstract syntax sub-item and one or more transfer
/// syntax sub-items.
fn read_proposed_context(mut item: Body) -> Result<PresentationContextProposed> {
    let id = item.read_u8().context(ReadFieldSnafu {
        field: "Presentation-context-ID",
    })?;
    skip_reserved(&mut item, 3)?;

    let mut abstract_syntax = None;
    let mut transfer_syntaxes = Vec::new();
    while bytes_left(&item) > 0 {
        let (sub_type, data) = read_item(&mut item)?;
        match sub_type {
            0x30 => abstract_syntax = Some(decode_text(&data, "Abstract-syntax-name")?),
            0x40 => transfer_syntaxes.push(decode_text(&data, "Transfer-syntax-name")?),
            item_type => {
                return UnexpectedItemSnafu {
                    item_type,
                    location: "proposed presentation context",
                }
                .fail();
            }
        }
    }

    Ok(PresentationContextProposed {
        id,
        abstract_syntax: abstract_syntax.context(MissingItemSnafu {
            item: "abstract syntax",
        })?,
        transfer_syntaxes,
    })
}

/// A negotiated presentation context (item type 21H): the context
/// identifier, the result code, and exactly one transfer syntax
/// sub-item (only significant on acceptance).
fn read_context_result(mut item: Body) -> Result<PresentationContextResult> {
    let id = item.read_u8().context(ReadFieldSnafu {
        field: "Presentation-context-ID",
    })?;
    skip_reserved(&mut item, 1)?;
    let code = item.read_u8().context(ReadFieldSnafu {
        field: "Result/Reason",
    })?;
    let reason = PresentationContextResultReason::from(code).context(UnrecognizedCodeSnafu {
        field: "Result/Reason",
        code,
    })?;
    skip_reserved(&mut item, 1)?;

    let mut transfer_syntax = None;
    while bytes_left(&item) > 0 {
        match read_item(&mut item)? {
            (0x40, data) => {
                ensure!(
                    transfer_syntax.is_none(),
                    MultipleTransferSyntaxesAcceptedSnafu
                );
                transfer_syntax = Some(decode_text(&data, "Transfer-syntax-name")?);
            }
            (item_type, _) => {
                return UnexpectedItemSnafu {
                    item_type,
                    location: "negotiated presentation context",
                }
                .fail();
            }
        }
    }

    Ok(PresentationContextResult {
        id,
        reason,
        transfer_syntax: transfer_syntax.context(MissingItemSnafu {
            item: "transfer syntax",
        })?,
    })
}

/// The user information item (type 50H): a list of sub-items,
/// of which this implementation interprets the maximum length,
/// implementation class UID and implementation version name.
/// Other sub-items are retained opaquely.
fn read_user_information(mut item: Body) -> Result<Vec<UserVariableItem>> {
    let mut variables = Vec::new();
    while bytes_left(&item) > 0 {
        let (sub_type, data) = read_item(&mut item)?;
        variables.push(match sub_type {
            0x51 => {
                ensure!(data.len() == 4, TruncatedItemSnafu { item_type: 0x51u8 });
                UserVariableItem::MaxLength(u32::from_be_bytes([
                    data[0], data[1], data[2], data[3],
                ]))
            }
            0x52 => UserVariableItem::ImplementationClassUID(decode_text(
                &data,
                "Implementation-class-uid",
            )?),
            0x55 => UserVariableItem::ImplementationVersionName(decode_text(
                &data,
                "Implementation-version-name",
            )?),
            other => UserVariableItem::Unknown(other, data),
        });
    }
    Ok(variables)
}

fn read_association_rq(body: &mut Body) -> Result<Pdu> {
    let head = read_association_head(body)?;
    let items = read_variable_items(body, "A-ASSOCIATE-RQ")?;
    ensure!(
        items.context_results.is_empty(),
        UnexpectedItemSnafu {
            item_type: 0x21u8,
            location: "A-ASSOCIATE-RQ",
        }
    );
    Ok(Pdu::AssociationRQ(AssociationRQ {
        protocol_version: head.protocol_version,
        called_ae_title: head.called_ae_title,
        calling_ae_title: head.calling_ae_title,
        application_context_name: items.application_context_name.context(MissingItemSnafu {
            item: "application context",
        })?,
        presentation_contexts: items.proposed_contexts,
        user_variables: items.user_variables,
    }))
}

fn read_association_ac(body: &mut Body) -> Result<Pdu> {
    let head = read_association_head(body)?;
    let items = read_variable_items(body, "A-ASSOCIATE-AC")?;
    ensure!(
        items.proposed_contexts.is_empty(),
        UnexpectedItemSnafu {
            item_type: 0x20u8,
            location: "A-ASSOCIATE-AC",
        }
    );
    Ok(Pdu::AssociationAC(AssociationAC {
        protocol_version: head.protocol_version,
        called_ae_title: head.called_ae_title,
        calling_ae_title: head.calling_ae_title,
        application_context_name: items.application_context_name.context(MissingItemSnafu {
            item: "application context",
        })?,
        presentation_contexts: items.context_results,
        user_variables: items.user_variables,
    }))
}

fn read_association_rj(body: &mut Body) -> Result<Pdu> {
    // one reserved byte, then the result, source and reason codes
    let mut codes = [0u8; 4];
    body.read_exact(&mut codes).context(ReadFieldSnafu {
        field: "Result/Source/Reason",
    })?;
    let result = AssociationRJResult::from(codes[1]).context(UnrecognizedCodeSnafu {
        field: "Result",
        code: codes[1],
    })?;
    let source = AssociationRJSource::from(codes[2], codes[3]).context(UnrecognizedCodeSnafu {
        field: "Source/Reason",
        code: (u16::from(codes[2]) << 8) | u16::from(codes[3]),
    })?;
    Ok(Pdu::AssociationRJ(AssociationRJ { result, source }))
}

fn read_pdata_tf(body: &mut Body) -> Result<Pdu> {
    let mut data = Vec::new();
    while bytes_left(body) > 0 {
        let length = body.read_u32::<BigEndian>().context(ReadFieldSnafu {
            field: "PDV-length",
        })?;
        // the length covers the context ID and control header
        ensure!(length >= 2, InvalidPDataLengthSnafu { length });
        let presentation_context_id = body.read_u8().context(ReadFieldSnafu {
            field: "Presentation-context-ID",
        })?;
        // message control header: bit 0 selects command or data set
        // content, bit 1 marks the last fragment of its kind
        let control = body.read_u8().context(ReadFieldSnafu {
            field: "Message-control-header",
        })?;
        let payload = read_n(body, length as usize - 2).context(ReadBodySnafu)?;

        data.push(PDataValue {
            presentation_context_id,
            value_type: if control & 0x01 != 0 {
                PDataValueType::Command
            } else {
                PDataValueType::Data
            },
            is_last: control & 0x02 != 0,
            data: payload,
        });
    }
    Ok(Pdu::PData { data })
}

fn read_abort(body: &mut Body) -> Result<Pdu> {
    // two reserved bytes, then the source and reason codes
    let mut codes = [0u8; 4];
    body.read_exact(&mut codes).context(ReadFieldSnafu {
        field: "Source/Reason",
    })?;
    let source = AbortRQSource::from(codes[2], codes[3]).context(UnrecognizedCodeSnafu {
        field: "Source/Reason",
        code: (u16::from(codes[2]) << 8) | u16::from(codes[3]),
    })?;
    Ok(Pdu::AbortRQ { source })
}
