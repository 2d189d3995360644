//! Module containing data structures and readers of DICOM file meta
//! information tables.
//!
//! The file meta group is always encoded in Explicit VR Little Endian,
//! regardless of the transfer syntax of the data set that follows it.

use crate::util::SourceReader;
use dcm_core::header::{DataElementHeader, HasLength, Header, Length, Tag, VR};
use dcm_core::value::PrimitiveValue;
use dcm_encoding::decode::{self, Decode};
use dcm_encoding::text::{DefaultCharacterSetCodec, TextCodec};
use dcm_encoding::transfer_syntax::{entries, TransferSyntax};
use dcm_parser::stateful::encode::StatefulEncoder;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::io::{Read, Write};

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file meta group parser could not read
    /// the magic code `DICM` from its source.
    #[snafu(display("could not start reading DICOM data"))]
    ReadMagicCode {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// Invalid DICOM data, detected by checking the `DICM` code.
    #[snafu(display("invalid DICOM file (magic code check failed)"))]
    NotDicom { backtrace: Backtrace },

    /// An issue occurred while decoding the next data element
    /// in the file meta data set.
    #[snafu(display("could not decode data element"))]
    DecodeElement {
        #[snafu(backtrace)]
        source: decode::Error,
    },

    /// The file meta group parser could not fetch
    /// the value of a data element from its source.
    #[snafu(display("could not read data value"))]
    ReadValueData {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The value length of a data element in the file meta group
    /// was unexpected.
    #[snafu(display("unexpected length {} for data element tagged {}", length, tag))]
    UnexpectedDataValueLength {
        tag: Tag,
        length: Length,
        backtrace: Backtrace,
    },

    /// The value length of a data element is undefined,
    /// but knowing the length is required in its context.
    #[snafu(display("undefined value length for data element tagged {}", tag))]
    UndefinedValueLength { tag: Tag, backtrace: Backtrace },

    /// The file meta group parser could not decode
    /// the text in one of its data elements.
    #[snafu(display("could not decode text in {}", name))]
    DecodeText {
        name: std::borrow::Cow<'static, str>,
        #[snafu(backtrace)]
        source: dcm_encoding::text::DecodeTextError,
    },

    /// A required file meta data element is missing.
    #[snafu(display("missing data element `{}`", alias))]
    MissingElement {
        alias: &'static str,
        backtrace: Backtrace,
    },

    /// The file meta group data set could not be written.
    #[snafu(display("could not write file meta group data set"))]
    WriteSet {
        #[snafu(backtrace)]
        source: dcm_parser::stateful::encode::Error,
    },

    /// The magic code could not be written.
    #[snafu(display("could not write magic code"))]
    WriteMagicCode {
        backtrace: Backtrace,
        source: std::io::Error,
    },
}

type Result<T> = std::result::Result<T, Error>;

/// DICOM File Meta Information Table.
///
/// This data type contains the relevant parts of the file meta
/// information table, as specified in part 6, chapter 7 of the standard.
///
/// Creating a new file meta table from scratch is more easily done
/// using a [`FileMetaTableBuilder`]. When modifying the struct's
/// public fields, it is possible to update the information group length
/// through [`update_information_group_length`][1].
///
/// [1]: FileMetaTable::update_information_group_length
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// File Meta Information Version
    pub information_version: [u8; 2],
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: String,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: String,
    /// Transfer Syntax UID
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: String,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
    /// Source Application Entity Title
    pub source_application_entity_title: Option<String>,
    /// Sending Application Entity Title
    pub sending_application_entity_title: Option<String>,
    /// Receiving Application Entity Title
    pub receiving_application_entity_title: Option<String>,
    /// Private Information Creator UID
    pub private_information_creator_uid: Option<String>,
    /// Private Information
    pub private_information: Option<Vec<u8>>,
}

/// The byte size of a file meta element with the given text value,
/// using the 8-byte header form and even-length padding.
fn dicom_len(value: &str) -> u32 {
    8 + ((value.len() as u32 + 1) & !1)
}

impl FileMetaTable {
    /// Construct a file meta group table by parsing
    /// a DICOM data set from a reader, starting at the `DICM` code.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut source = SourceReader::new(reader);
        let mut buf = [0u8; 4];
        source.read_exact(&mut buf).context(ReadMagicCodeSnafu)?;
        ensure!(buf == DICM_MAGIC_CODE, NotDicomSnafu);
        Self::read_after_magic(&mut source)
    }

    /// Parse the file meta group from a source positioned
    /// right after the `DICM` magic code.
    pub(crate) fn read_after_magic<R: Read>(source: &mut SourceReader<R>) -> Result<Self> {
        let decoder = decode::file_header_decoder();
        let mut builder = FileMetaTableBuilder::new();

        let (first, _) = decoder.decode_header(source).context(DecodeElementSnafu)?;

        let group_length = if first.tag() == Tag(0x0002, 0x0000) {
            if first.length() != Length(4) {
                return UnexpectedDataValueLengthSnafu {
                    tag: first.tag(),
                    length: first.length(),
                }
                .fail();
            }
            let mut buf = [0u8; 4];
            source.read_exact(&mut buf).context(ReadValueDataSnafu)?;
            Some(u32::from_le_bytes(buf))
        } else {
            // no group length: the first element is a regular
            // file meta attribute
            builder = Self::apply_element(builder, &first, source)?;
            None
        };

        match group_length {
            Some(group_length) => {
                // the group length bounds the file meta region
                let mut total_bytes_read = 0u32;
                while total_bytes_read < group_length {
                    let (elem, header_bytes_read) =
                        decoder.decode_header(source).context(DecodeElementSnafu)?;
                    let elem_len = match elem.length().get() {
                        None => {
                            return UndefinedValueLengthSnafu { tag: elem.tag() }.fail();
                        }
                        Some(len) => len,
                    };
                    builder = Self::apply_element(builder, &elem, source)?;
                    total_bytes_read = total_bytes_read
                        .saturating_add(header_bytes_read as u32)
                        .saturating_add(elem_len);
                }
            }
            None => {
                // read elements until a tag outside group 0002 appears
                loop {
                    let mut group_bytes = [0u8; 2];
                    match source.read_exact(&mut group_bytes) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                        Err(e) => return Err(e).context(ReadValueDataSnafu),
                    }
                    let group = u16::from_le_bytes(group_bytes);
                    source.unread(&group_bytes);
                    if group != 0x0002 {
                        break;
                    }
                    let (elem, _) = decoder.decode_header(source).context(DecodeElementSnafu)?;
                    builder = Self::apply_element(builder, &elem, source)?;
                }
            }
        }

        builder.build()
    }

    fn apply_element<R: Read>(
        builder: FileMetaTableBuilder,
        elem: &DataElementHeader,
        source: &mut SourceReader<R>,
    ) -> Result<FileMetaTableBuilder> {
        let text = DefaultCharacterSetCodec;
        let elem_len = match elem.length().get() {
            None => {
                return UndefinedValueLengthSnafu { tag: elem.tag() }.fail();
            }
            Some(len) => len,
        };

        Ok(match elem.tag() {
            Tag(0x0002, 0x0001) => {
                // File Meta Information Version
                if elem.length() != Length(2) {
                    return UnexpectedDataValueLengthSnafu {
                        tag: elem.tag(),
                        length: elem.length(),
                    }
                    .fail();
                }
                let mut hbuf = [0u8; 2];
                source.read_exact(&mut hbuf[..]).context(ReadValueDataSnafu)?;
                builder.information_version(hbuf)
            }
            Tag(0x0002, 0x0002) => {
                builder.media_storage_sop_class_uid(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0003) => {
                builder.media_storage_sop_instance_uid(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0010) => builder.transfer_syntax(read_str_body(source, &text, elem_len)?),
            Tag(0x0002, 0x0012) => {
                builder.implementation_class_uid(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0013) => {
                builder.implementation_version_name(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0016) => {
                builder.source_application_entity_title(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0017) => {
                builder.sending_application_entity_title(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0018) => {
                builder.receiving_application_entity_title(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0100) => {
                builder.private_information_creator_uid(read_str_body(source, &text, elem_len)?)
            }
            Tag(0x0002, 0x0102) => {
                let mut v = vec![0; elem_len as usize];
                source.read_exact(&mut v).context(ReadValueDataSnafu)?;
                builder.private_information(v)
            }
            tag => {
                // unknown or unsupported attribute: consume and move on
                tracing::info!("unknown file meta attribute {}", tag);
                let mut v = vec![0; elem_len as usize];
                source.read_exact(&mut v).context(ReadValueDataSnafu)?;
                builder
            }
        })
    }

    /// Getter for the transfer syntax UID,
    /// with trailing characters already excluded.
    pub fn transfer_syntax(&self) -> &str {
        self.transfer_syntax
            .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
    }

    /// Getter for the media storage SOP instance UID,
    /// with trailing characters already excluded.
    pub fn media_storage_sop_instance_uid(&self) -> &str {
        self.media_storage_sop_instance_uid
            .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
    }

    /// Getter for the media storage SOP class UID,
    /// with trailing characters already excluded.
    pub fn media_storage_sop_class_uid(&self) -> &str {
        self.media_storage_sop_class_uid
            .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
    }

    /// Set the file meta table's transfer syntax
    /// according to the given transfer syntax descriptor.
    /// The information group length field is recalculated.
    pub fn set_transfer_syntax(&mut self, ts: &TransferSyntax) {
        self.transfer_syntax = ts
            .uid()
            .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
            .to_string();
        self.update_information_group_length();
    }

    /// Calculate the expected file meta group length
    /// according to the attributes currently set,
    /// and assign it to the field `information_group_length`.
    pub fn update_information_group_length(&mut self) {
        self.information_group_length = self.calculate_information_group_length();
    }

    /// Calculate the expected file meta group length,
    /// not including the group length element itself.
    fn calculate_information_group_length(&self) -> u32 {
        // information version: 12-byte header + 2-byte value
        14 + dicom_len(&self.media_storage_sop_class_uid)
            + dicom_len(&self.media_storage_sop_instance_uid)
            + dicom_len(&self.transfer_syntax)
            + dicom_len(&self.implementation_class_uid)
            + self
                .implementation_version_name
                .as_deref()
                .map(dicom_len)
                .unwrap_or(0)
            + self
                .source_application_entity_title
                .as_deref()
                .map(dicom_len)
                .unwrap_or(0)
            + self
                .sending_application_entity_title
                .as_deref()
                .map(dicom_len)
                .unwrap_or(0)
            + self
                .receiving_application_entity_title
                .as_deref()
                .map(dicom_len)
                .unwrap_or(0)
            + self
                .private_information_creator_uid
                .as_deref()
                .map(dicom_len)
                .unwrap_or(0)
            + self
                .private_information
                .as_ref()
                .map(|x| 12 + ((x.len() as u32 + 1) & !1))
                .unwrap_or(0)
    }

    /// Write the `DICM` magic code followed by the file meta group
    /// data set, in Explicit VR Little Endian.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer
            .write_all(&DICM_MAGIC_CODE)
            .context(WriteMagicCodeSnafu)?;

        let mut encoder =
            StatefulEncoder::new_with(&mut writer, &entries::EXPLICIT_VR_LITTLE_ENDIAN)
                .context(WriteSetSnafu)?;

        let mut element = |tag, vr, value: PrimitiveValue| {
            let header = DataElementHeader::new(tag, vr, Length(value.len() as u32));
            encoder.encode_element(header, &value).context(WriteSetSnafu)
        };

        element(
            Tag(0x0002, 0x0000),
            VR::UL,
            PrimitiveValue::from_u32_slice(&[self.information_group_length]),
        )?;
        element(
            Tag(0x0002, 0x0001),
            VR::OB,
            PrimitiveValue::from_bytes(self.information_version.to_vec()),
        )?;
        element(
            Tag(0x0002, 0x0002),
            VR::UI,
            PrimitiveValue::from_text(&self.media_storage_sop_class_uid),
        )?;
        element(
            Tag(0x0002, 0x0003),
            VR::UI,
            PrimitiveValue::from_text(&self.media_storage_sop_instance_uid),
        )?;
        element(
            Tag(0x0002, 0x0010),
            VR::UI,
            PrimitiveValue::from_text(&self.transfer_syntax),
        )?;
        element(
            Tag(0x0002, 0x0012),
            VR::UI,
            PrimitiveValue::from_text(&self.implementation_class_uid),
        )?;
        if let Some(v) = &self.implementation_version_name {
            element(Tag(0x0002, 0x0013), VR::SH, PrimitiveValue::from_text(v))?;
        }
        if let Some(v) = &self.source_application_entity_title {
            element(Tag(0x0002, 0x0016), VR::AE, PrimitiveValue::from_text(v))?;
        }
        if let Some(v) = &self.sending_application_entity_title {
            element(Tag(0x0002, 0x0017), VR::AE, PrimitiveValue::from_text(v))?;
        }
        if let Some(v) = &self.receiving_application_entity_title {
            element(Tag(0x0002, 0x0018), VR::AE, PrimitiveValue::from_text(v))?;
        }
        if let Some(v) = &self.private_information_creator_uid {
            element(Tag(0x0002, 0x0100), VR::UI, PrimitiveValue::from_text(v))?;
        }
        if let Some(v) = &self.private_information {
            element(
                Tag(0x0002, 0x0102),
                VR::OB,
                PrimitiveValue::from_bytes(v.clone()),
            )?;
        }

        Ok(())
    }
}

/// A builder for DICOM file meta information tables.
#[derive(Debug, Default, Clone)]
pub struct FileMetaTableBuilder {
    information_version: Option<[u8; 2]>,
    media_storage_sop_class_uid: Option<String>,
    media_storage_sop_instance_uid: Option<String>,
    transfer_syntax: Option<String>,
    implementation_class_uid: Option<String>,
    implementation_version_name: Option<String>,
    source_application_entity_title: Option<String>,
    sending_application_entity_title: Option<String>,
    receiving_application_entity_title: Option<String>,
    private_information_creator_uid: Option<String>,
    private_information: Option<Vec<u8>>,
}

impl FileMetaTableBuilder {
    /// Create a new, empty builder.
    pub fn new() -> Self {
        FileMetaTableBuilder::default()
    }

    /// Define the file meta information version.
    pub fn information_version(mut self, value: [u8; 2]) -> Self {
        self.information_version = Some(value);
        self
    }

    /// Define the media storage SOP class UID.
    pub fn media_storage_sop_class_uid(mut self, value: impl Into<String>) -> Self {
        self.media_storage_sop_class_uid = Some(trimmed(value.into()));
        self
    }

    /// Define the media storage SOP instance UID.
    pub fn media_storage_sop_instance_uid(mut self, value: impl Into<String>) -> Self {
        self.media_storage_sop_instance_uid = Some(trimmed(value.into()));
        self
    }

    /// Define the transfer syntax UID.
    pub fn transfer_syntax(mut self, value: impl Into<String>) -> Self {
        self.transfer_syntax = Some(trimmed(value.into()));
        self
    }

    /// Define the implementation class UID.
    pub fn implementation_class_uid(mut self, value: impl Into<String>) -> Self {
        self.implementation_class_uid = Some(trimmed(value.into()));
        self
    }

    /// Define the implementation version name.
    pub fn implementation_version_name(mut self, value: impl Into<String>) -> Self {
        self.implementation_version_name = Some(trimmed(value.into()));
        self
    }

    /// Define the source application entity title.
    pub fn source_application_entity_title(mut self, value: impl Into<String>) -> Self {
        self.source_application_entity_title = Some(trimmed(value.into()));
        self
    }

    /// Define the sending application entity title.
    pub fn sending_application_entity_title(mut self, value: impl Into<String>) -> Self {
        self.sending_application_entity_title = Some(trimmed(value.into()));
        self
    }

    /// Define the receiving application entity title.
    pub fn receiving_application_entity_title(mut self, value: impl Into<String>) -> Self {
        self.receiving_application_entity_title = Some(trimmed(value.into()));
        self
    }

    /// Define the private information creator UID.
    pub fn private_information_creator_uid(mut self, value: impl Into<String>) -> Self {
        self.private_information_creator_uid = Some(trimmed(value.into()));
        self
    }

    /// Define the private information.
    pub fn private_information(mut self, value: Vec<u8>) -> Self {
        self.private_information = Some(value);
        self
    }

    /// Build the file meta table. The media storage SOP class and
    /// instance UIDs and the transfer syntax are mandatory;
    /// implementation identifiers default to this implementation's.
    pub fn build(self) -> Result<FileMetaTable> {
        let media_storage_sop_class_uid =
            self.media_storage_sop_class_uid.ok_or_else(|| {
                MissingElementSnafu {
                    alias: "MediaStorageSOPClassUID",
                }
                .build()
            })?;
        let media_storage_sop_instance_uid =
            self.media_storage_sop_instance_uid.ok_or_else(|| {
                MissingElementSnafu {
                    alias: "MediaStorageSOPInstanceUID",
                }
                .build()
            })?;
        let transfer_syntax = self.transfer_syntax.ok_or_else(|| {
            MissingElementSnafu {
                alias: "TransferSyntaxUID",
            }
            .build()
        })?;
        let implementation_class_uid = self
            .implementation_class_uid
            .unwrap_or_else(|| crate::IMPLEMENTATION_CLASS_UID.to_string());
        let implementation_version_name = Some(
            self.implementation_version_name
                .unwrap_or_else(|| crate::IMPLEMENTATION_VERSION_NAME.to_string()),
        );

        let mut table = FileMetaTable {
            information_group_length: 0,
            information_version: self.information_version.unwrap_or([0, 1]),
            media_storage_sop_class_uid,
            media_storage_sop_instance_uid,
            transfer_syntax,
            implementation_class_uid,
            implementation_version_name,
            source_application_entity_title: self.source_application_entity_title,
            sending_application_entity_title: self.sending_application_entity_title,
            receiving_application_entity_title: self.receiving_application_entity_title,
            private_information_creator_uid: self.private_information_creator_uid,
            private_information: self.private_information,
        };
        table.update_information_group_length();
        Ok(table)
    }
}

fn trimmed(mut value: String) -> String {
    while value.ends_with('\0') || value.ends_with(' ') {
        value.pop();
    }
    value
}

/// Utility function for reading the body of a DICOM element as text.
fn read_str_body<R, T>(source: &mut SourceReader<R>, text: &T, len: u32) -> Result<String>
where
    R: Read,
    T: TextCodec,
{
    let mut v = vec![0; len as usize];
    source.read_exact(&mut v).context(ReadValueDataSnafu)?;
    text.decode(&v)
        .context(DecodeTextSnafu { name: text.name() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_meta_bytes() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"DICM");
        // (0002,0000) UL 4, group length placeholder patched below
        data.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00]);
        let group_length_at = data.len();
        data.extend_from_slice(&[0, 0, 0, 0]);
        let body_start = data.len();
        // (0002,0001) OB 00 01
        data.extend_from_slice(&[
            0x02, 0x00, 0x01, 0x00, b'O', b'B', 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x01,
        ]);
        // (0002,0002) UI Secondary Capture (26 bytes)
        data.extend_from_slice(&[0x02, 0x00, 0x02, 0x00, b'U', b'I', 0x1A, 0x00]);
        data.extend_from_slice(b"1.2.840.10008.5.1.4.1.1.7\0");
        // (0002,0003) UI instance uid (8 bytes)
        data.extend_from_slice(&[0x02, 0x00, 0x03, 0x00, b'U', b'I', 0x08, 0x00]);
        data.extend_from_slice(b"1.2.3.4\0");
        // (0002,0010) UI explicit LE (20 bytes)
        data.extend_from_slice(&[0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x14, 0x00]);
        data.extend_from_slice(b"1.2.840.10008.1.2.1\0");
        // (0002,0012) UI implementation class (8 bytes)
        data.extend_from_slice(&[0x02, 0x00, 0x12, 0x00, b'U', b'I', 0x08, 0x00]);
        data.extend_from_slice(b"1.9.9.1\0");
        let group_length = (data.len() - body_start) as u32;
        data[group_length_at..group_length_at + 4]
            .copy_from_slice(&group_length.to_le_bytes());
        data
    }

    #[test]
    fn reads_meta_group_with_group_length() {
        let data = sample_meta_bytes();
        let table = FileMetaTable::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(
            table.media_storage_sop_class_uid(),
            "1.2.840.10008.5.1.4.1.1.7"
        );
        assert_eq!(table.media_storage_sop_instance_uid(), "1.2.3.4");
        assert_eq!(table.transfer_syntax(), "1.2.840.10008.1.2.1");
        assert_eq!(table.implementation_class_uid, "1.9.9.1");
    }

    #[test]
    fn reads_meta_group_without_group_length() {
        let mut data = Vec::new();
        data.extend_from_slice(b"DICM");
        // no group length; straight into (0002,0002)
        data.extend_from_slice(&[0x02, 0x00, 0x02, 0x00, b'U', b'I', 0x1A, 0x00]);
        data.extend_from_slice(b"1.2.840.10008.5.1.4.1.1.7\0");
        data.extend_from_slice(&[0x02, 0x00, 0x03, 0x00, b'U', b'I', 0x08, 0x00]);
        data.extend_from_slice(b"1.2.3.4\0");
        data.extend_from_slice(&[0x02, 0x00, 0x10, 0x00, b'U', b'I', 0x14, 0x00]);
        data.extend_from_slice(b"1.2.840.10008.1.2.1\0");
        // a dataset element follows: (0008,0060) CS "CT"
        data.extend_from_slice(&[0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T']);

        let mut source = SourceReader::new(Cursor::new(data));
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic).unwrap();
        let table = FileMetaTable::read_after_magic(&mut source).unwrap();
        assert_eq!(table.transfer_syntax(), "1.2.840.10008.1.2.1");

        // the dataset element is still available
        let mut rest = Vec::new();
        source.read_to_end(&mut rest).unwrap();
        assert_eq!(&rest[..4], &[0x08, 0x00, 0x60, 0x00]);
    }

    #[test]
    fn group_length_calculation_matches_write() {
        let table = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("1.2.3.4")
            .transfer_syntax("1.2.840.10008.1.2.1")
            .implementation_class_uid("1.9.9.1")
            .implementation_version_name("TEST 01")
            .build()
            .unwrap();

        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();

        // group length element value counts all bytes after itself
        let declared = u32::from_le_bytes([out[12], out[13], out[14], out[15]]);
        let written_after = (out.len() - 16) as u32;
        assert_eq!(declared, written_after);

        // and the table round-trips
        let table2 = FileMetaTable::from_reader(Cursor::new(out)).unwrap();
        assert_eq!(table2.transfer_syntax(), table.transfer_syntax());
        assert_eq!(
            table2.information_group_length,
            table.information_group_length
        );
    }

    #[test]
    fn build_requires_transfer_syntax() {
        let result = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("1.2.3.4")
            .build();
        assert!(matches!(result, Err(Error::MissingElement { .. })));
    }
}
