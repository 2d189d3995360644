//! P-Data fragmentation and reassembly.

use crate::pdu::{PDataValue, PDataValueType};
use std::io::Write;

/// A P-Data value writer.
///
/// This exposes an API to iteratively construct and send DIMSE message
/// streams to another node. Using this as a
/// [standard writer](std::io::Write) will automatically split
/// the incoming bytes into separate PDUs if they do not fit in a
/// single one. All presentation data values produced share the same
/// presentation context ID and kind (command or data); the last
/// fragment is marked when the writer is finished.
///
/// Use an association's `send_pdata` method
/// to create a new P-Data value writer.
#[must_use]
pub struct PDataWriter<W: Write> {
    buffer: Vec<u8>,
    stream: W,
    presentation_context_id: u8,
    value_type: PDataValueType,
    max_data_length: u32,
}

impl<W> PDataWriter<W>
where
    W: Write,
{
    /// Construct a new P-Data value writer.
    pub(crate) fn new(
        stream: W,
        presentation_context_id: u8,
        value_type: PDataValueType,
        max_pdu_length: u32,
    ) -> Self {
        let max_data_length = calculate_max_data_len_single(max_pdu_length);
        PDataWriter {
            stream,
            presentation_context_id,
            value_type,
            max_data_length,
            buffer: Vec::with_capacity(max_data_length as usize),
        }
    }

    /// Send the header of a single P-Data PDU,
    /// containing a single data fragment.
    fn send_pdata_header(&mut self, data_len: u32, is_last: bool) -> std::io::Result<()> {
        let mut message_header = 0x00;
        if self.value_type == PDataValueType::Command {
            message_header |= 0x01;
        }
        if is_last {
            message_header |= 0x02;
        }

        let pdu_len_bytes = (data_len + 2 + 4).to_be_bytes();
        let data_len_bytes = (data_len + 2).to_be_bytes();
        let header = [
            // PDU-type + reserved byte
            0x04,
            0x00,
            // full PDU length
            pdu_len_bytes[0],
            pdu_len_bytes[1],
            pdu_len_bytes[2],
            pdu_len_bytes[3],
            // presentation data length (data + 2 fields below)
            data_len_bytes[0],
            data_len_bytes[1],
            data_len_bytes[2],
            data_len_bytes[3],
            // presentation context id
            self.presentation_context_id,
            // message control header
            message_header,
        ];

        self.stream.write_all(&header)
    }

    /// Mark the end of the message stream and send any pending bytes
    /// as the last fragment.
    pub fn finish(mut self) -> std::io::Result<()> {
        self.finish_impl()
    }

    fn finish_impl(&mut self) -> std::io::Result<()> {
        self.dispatch_excess_data()?;
        // send the last PDU, even if empty,
        // so that the last fragment is always marked
        self.send_pdata_header(self.buffer.len() as u32, true)?;
        self.stream.write_all(&self.buffer[..])?;
        self.buffer.clear();
        self.stream.flush()
    }

    fn dispatch_excess_data(&mut self) -> std::io::Result<()> {
        while self.buffer.len() > self.max_data_length as usize {
            // send PDU now
            self.send_pdata_header(self.max_data_length, false)?;
            let data = &self.buffer[0..self.max_data_length as usize];
            self.stream.write_all(data)?;
            let _ = self.buffer.drain(0..self.max_data_length as usize);
        }
        Ok(())
    }
}

impl<W> Write for PDataWriter<W>
where
    W: Write,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend(buf);
        self.dispatch_excess_data()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // do nothing
        Ok(())
    }
}

/// Determine the maximum length of actual PDV data
/// when encapsulated in a PDU with the given length property.
/// Does not account for the first 2 bytes (type + reserved).
#[inline]
fn calculate_max_data_len_single(pdu_len: u32) -> u32 {
    // data length (4 bytes) and control header (2 bytes)
    pdu_len - 4 - 2
}

/// Receive-side reassembly of one logical DIMSE message:
/// the command set fragments and the data set fragments are
/// concatenated separately, each complete at its last fragment.
#[derive(Debug, Default)]
pub struct PDataReassembler {
    command: Vec<u8>,
    data: Vec<u8>,
    command_complete: bool,
    data_complete: bool,
}

impl PDataReassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        PDataReassembler::default()
    }

    /// Absorb one presentation data value.
    pub fn push(&mut self, pdv: PDataValue) {
        match pdv.value_type {
            PDataValueType::Command => {
                self.command.extend(pdv.data);
                if pdv.is_last {
                    self.command_complete = true;
                }
            }
            PDataValueType::Data => {
                self.data.extend(pdv.data);
                if pdv.is_last {
                    self.data_complete = true;
                }
            }
        }
    }

    /// Whether the command set stream is complete.
    pub fn command_complete(&self) -> bool {
        self.command_complete
    }

    /// Whether the data set stream is complete.
    pub fn data_complete(&self) -> bool {
        self.data_complete
    }

    /// Take the reassembled command set bytes, resetting that stream.
    pub fn take_command(&mut self) -> Vec<u8> {
        self.command_complete = false;
        std::mem::take(&mut self.command)
    }

    /// Take the reassembled data set bytes, resetting that stream.
    pub fn take_data(&mut self) -> Vec<u8> {
        self.data_complete = false;
        std::mem::take(&mut self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::PDataWriter;
    use crate::pdu::{read_pdu, PDataValueType, Pdu, MINIMUM_PDU_SIZE};
    use std::io::Write;

    #[test]
    fn write_pdata_and_finish() {
        let presentation_context_id = 12;

        let mut buf = Vec::new();
        {
            let mut writer = PDataWriter::new(
                &mut buf,
                presentation_context_id,
                PDataValueType::Data,
                MINIMUM_PDU_SIZE,
            );
            writer.write_all(&(0..64).collect::<Vec<u8>>()).unwrap();
            writer.finish().unwrap();
        }

        let mut cursor = &buf[..];
        let same_pdu = read_pdu(&mut cursor, MINIMUM_PDU_SIZE, true).unwrap();

        match same_pdu {
            Pdu::PData { data: data_1 } => {
                let data_1 = &data_1[0];

                // check that this PDU is consistent
                assert_eq!(data_1.value_type, PDataValueType::Data);
                assert!(data_1.is_last);
                assert_eq!(data_1.presentation_context_id, presentation_context_id);
                assert_eq!(data_1.data.len(), 64);
                assert_eq!(data_1.data, (0..64).collect::<Vec<u8>>());
            }
            pdu => panic!("expected P-Data, got {:?}", pdu),
        }

        assert_eq!(cursor.len(), 0);
    }

    #[test]
    fn write_large_pdata_and_finish() {
        let presentation_context_id = 32;

        let my_data: Vec<_> = (0..9000).map(|x: u32| x as u8).collect();

        let mut buf = Vec::new();
        {
            let mut writer = PDataWriter::new(
                &mut buf,
                presentation_context_id,
                PDataValueType::Command,
                MINIMUM_PDU_SIZE,
            );
            writer.write_all(&my_data).unwrap();
            writer.finish().unwrap();
        }

        let mut cursor = &buf[..];
        let mut all_data = Vec::new();
        let mut pdu_count = 0;
        let mut last_seen = false;
        while !cursor.is_empty() {
            match read_pdu(&mut cursor, MINIMUM_PDU_SIZE, true).unwrap() {
                Pdu::PData { data } => {
                    for pdv in data {
                        assert_eq!(pdv.value_type, PDataValueType::Command);
                        assert_eq!(pdv.presentation_context_id, presentation_context_id);
                        // the PDV payload never exceeds max PDU - 6
                        assert!(pdv.data.len() as u32 <= MINIMUM_PDU_SIZE - 6);
                        last_seen = pdv.is_last;
                        all_data.extend(pdv.data);
                    }
                }
                pdu => panic!("expected P-Data, got {:?}", pdu),
            }
            pdu_count += 1;
        }

        assert!(pdu_count > 1);
        assert!(last_seen);
        assert_eq!(all_data, my_data);
    }

    #[test]
    fn reassembler_separates_kinds() {
        use super::PDataReassembler;
        use crate::pdu::PDataValue;

        let mut reassembler = PDataReassembler::new();
        reassembler.push(PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Command,
            is_last: false,
            data: vec![1, 2],
        });
        assert!(!reassembler.command_complete());
        reassembler.push(PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Data,
            is_last: true,
            data: vec![9],
        });
        reassembler.push(PDataValue {
            presentation_context_id: 1,
            value_type: PDataValueType::Command,
            is_last: true,
            data: vec![3, 4],
        });
        assert!(reassembler.command_complete());
        assert!(reassembler.data_complete());
        assert_eq!(reassembler.take_command(), vec![1, 2, 3, 4]);
        assert_eq!(reassembler.take_data(), vec![9]);
        assert!(!reassembler.command_complete());
    }
}
