//! DIMSE command set construction and interpretation.
//!
//! Command sets are small data sets in group 0000,
//! always encoded in Implicit VR Little Endian regardless of
//! the presentation context's negotiated transfer syntax.

use dcm_core::value::PrimitiveValue;
use dcm_core::VR;
use dcm_dictionary::{tags, uids};
use dcm_encoding::transfer_syntax::entries;
use dcm_object::{InMemDicomObject, ReadError, WriteError};

/// The value of Command Data Set Type (0000,0800) stating
/// that no data set is present in the message.
pub const NO_DATA_SET: u16 = 0x0101;

/// The status code of a successful operation.
pub const STATUS_SUCCESS: u16 = 0x0000;

/// DIMSE command field codes.
#[repr(u16)]
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CommandField {
    C_STORE_RQ = 0x0001,
    C_STORE_RSP = 0x8001,
    C_GET_RQ = 0x0010,
    C_GET_RSP = 0x8010,
    C_FIND_RQ = 0x0020,
    C_FIND_RSP = 0x8020,
    C_MOVE_RQ = 0x0021,
    C_MOVE_RSP = 0x8021,
    C_ECHO_RQ = 0x0030,
    C_ECHO_RSP = 0x8030,
    N_EVENT_REPORT_RQ = 0x0100,
    N_EVENT_REPORT_RSP = 0x8100,
    N_GET_RQ = 0x0110,
    N_GET_RSP = 0x8110,
    N_SET_RQ = 0x0120,
    N_SET_RSP = 0x8120,
    N_ACTION_RQ = 0x0130,
    N_ACTION_RSP = 0x8130,
    N_CREATE_RQ = 0x0140,
    N_CREATE_RSP = 0x8140,
    N_DELETE_RQ = 0x0150,
    N_DELETE_RSP = 0x8150,
    C_CANCEL_RQ = 0x0FFF,
}

impl CommandField {
    /// Resolve a command field code.
    pub fn from_code(code: u16) -> Option<Self> {
        use CommandField::*;
        match code {
            0x0001 => Some(C_STORE_RQ),
            0x8001 => Some(C_STORE_RSP),
            0x0010 => Some(C_GET_RQ),
            0x8010 => Some(C_GET_RSP),
            0x0020 => Some(C_FIND_RQ),
            0x8020 => Some(C_FIND_RSP),
            0x0021 => Some(C_MOVE_RQ),
            0x8021 => Some(C_MOVE_RSP),
            0x0030 => Some(C_ECHO_RQ),
            0x8030 => Some(C_ECHO_RSP),
            0x0100 => Some(N_EVENT_REPORT_RQ),
            0x8100 => Some(N_EVENT_REPORT_RSP),
            0x0110 => Some(N_GET_RQ),
            0x8110 => Some(N_GET_RSP),
            0x0120 => Some(N_SET_RQ),
            0x8120 => Some(N_SET_RSP),
            0x0130 => Some(N_ACTION_RQ),
            0x8130 => Some(N_ACTION_RSP),
            0x0140 => Some(N_CREATE_RQ),
            0x8140 => Some(N_CREATE_RSP),
            0x0150 => Some(N_DELETE_RQ),
            0x8150 => Some(N_DELETE_RSP),
            0x0FFF => Some(C_CANCEL_RQ),
            _ => None,
        }
    }
}

/// Build a C-ECHO-RQ command set with the given message identifier.
pub fn echo_rq(message_id: u16) -> InMemDicomObject {
    let mut cmd = InMemDicomObject::new_empty();
    cmd.put_str(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uids::VERIFICATION);
    cmd.put_value(
        tags::COMMAND_FIELD,
        VR::US,
        PrimitiveValue::from(CommandField::C_ECHO_RQ as u16),
    );
    cmd.put_value(tags::MESSAGE_ID, VR::US, PrimitiveValue::from(message_id));
    cmd.put_value(
        tags::COMMAND_DATA_SET_TYPE,
        VR::US,
        PrimitiveValue::from(NO_DATA_SET),
    );
    finalize(cmd)
}

/// Build a C-ECHO-RSP command set responding to
/// the given message identifier.
pub fn echo_rsp(message_id_being_responded_to: u16, status: u16) -> InMemDicomObject {
    let mut cmd = InMemDicomObject::new_empty();
    cmd.put_str(tags::AFFECTED_SOP_CLASS_UID, VR::UI, uids::VERIFICATION);
    cmd.put_value(
        tags::COMMAND_FIELD,
        VR::US,
        PrimitiveValue::from(CommandField::C_ECHO_RSP as u16),
    );
    cmd.put_value(
        tags::MESSAGE_ID_BEING_RESPONDED_TO,
        VR::US,
        PrimitiveValue::from(message_id_being_responded_to),
    );
    cmd.put_value(
        tags::COMMAND_DATA_SET_TYPE,
        VR::US,
        PrimitiveValue::from(NO_DATA_SET),
    );
    cmd.put_value(tags::STATUS, VR::US, PrimitiveValue::from(status));
    finalize(cmd)
}

/// Compute and insert the Command Group Length (0000,0000) element,
/// valuing the Implicit VR Little Endian byte size of every other
/// group 0000 element in the command set.
fn finalize(mut cmd: InMemDicomObject) -> InMemDicomObject {
    let group_length: u32 = cmd
        .iter()
        .filter(|elt| {
            use dcm_core::header::Header;
            elt.tag() != tags::COMMAND_GROUP_LENGTH
        })
        .map(|elt| {
            use dcm_core::header::HasLength;
            let len = elt.length().0;
            8 + len + (len & 1)
        })
        .sum();
    cmd.put_value(
        tags::COMMAND_GROUP_LENGTH,
        VR::UL,
        PrimitiveValue::from(group_length),
    );
    cmd
}

/// Encode a command set in Implicit VR Little Endian.
pub fn write_command_set(cmd: &InMemDicomObject) -> Result<Vec<u8>, WriteError> {
    let mut out = Vec::new();
    cmd.write_dataset_with_ts(&mut out, &entries::IMPLICIT_VR_LITTLE_ENDIAN)?;
    Ok(out)
}

/// Decode a command set from Implicit VR Little Endian bytes.
pub fn read_command_set(data: &[u8]) -> Result<InMemDicomObject, ReadError> {
    InMemDicomObject::read_dataset_with_ts(data, &entries::IMPLICIT_VR_LITTLE_ENDIAN)
}

/// Fetch the command field of the given command set, if present.
pub fn command_field(cmd: &InMemDicomObject) -> Option<CommandField> {
    cmd.uint16(tags::COMMAND_FIELD)
        .ok()
        .and_then(CommandField::from_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_rq_round_trip() {
        let cmd = echo_rq(5);
        let bytes = write_command_set(&cmd).unwrap();
        let decoded = read_command_set(&bytes).unwrap();
        assert_eq!(command_field(&decoded), Some(CommandField::C_ECHO_RQ));
        assert_eq!(decoded.uint16(tags::MESSAGE_ID).unwrap(), 5);
        assert_eq!(
            decoded.uint16(tags::COMMAND_DATA_SET_TYPE).unwrap(),
            NO_DATA_SET
        );
        assert_eq!(
            decoded.string(tags::AFFECTED_SOP_CLASS_UID).unwrap(),
            uids::VERIFICATION
        );
    }

    #[test]
    fn group_length_matches_encoded_size() {
        let cmd = echo_rq(1);
        let bytes = write_command_set(&cmd).unwrap();
        // the group length value equals the number of bytes
        // after the group length element
        let declared = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        assert_eq!(declared as usize, bytes.len() - 12);
    }

    #[test]
    fn echo_rsp_carries_status_and_request_id() {
        let cmd = echo_rsp(9, STATUS_SUCCESS);
        let bytes = write_command_set(&cmd).unwrap();
        let decoded = read_command_set(&bytes).unwrap();
        assert_eq!(command_field(&decoded), Some(CommandField::C_ECHO_RSP));
        assert_eq!(
            decoded
                .uint16(tags::MESSAGE_ID_BEING_RESPONDED_TO)
                .unwrap(),
            9
        );
        assert_eq!(decoded.uint16(tags::STATUS).unwrap(), STATUS_SUCCESS);
    }
}
