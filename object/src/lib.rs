//! This crate contains a high-level abstraction for reading and
//! manipulating DICOM objects: an in-memory data set implementation,
//! the file meta information table, and the DICOM Part-10 file envelope
//! with configurable preamble and file meta handling, pixel data load
//! modes, and validation plumbing.
//!
//! # Examples
//!
//! Read an object from a file and fetch an attribute:
//!
//! ```no_run
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use dcm_object::open_file;
//! use dcm_dictionary::tags;
//!
//! let obj = open_file("0001.dcm")?;
//! let patient_name = obj.string(tags::PATIENT_NAME)?;
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod mem;
pub mod meta;
pub mod pixeldata;
pub(crate) mod util;

pub use crate::file::{open_file, open_file_with};
pub use crate::mem::{AccessError, InMemDicomObject, InMemElement};
pub use crate::meta::{FileMetaTable, FileMetaTableBuilder};
pub use crate::pixeldata::{
    PixelDataContext, PixelDataError, PixelDataHandling, PixelDataMode, PixelSource,
};

use crate::util::SourceReader;
use dcm_core::header::Tag;
use dcm_core::uid;
use dcm_core::validation::{Issue, RuleBehavior, ValidationProfile};
use dcm_dictionary::tags;
use dcm_encoding::decode::InvalidVrStrategy;
use dcm_encoding::transfer_syntax::{deflate, entries, TransferSyntax, TransferSyntaxRegistry};
use snafu::{Backtrace, ResultExt, Snafu};
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// The UID of this implementation class, as carried in file meta
/// groups and association requests produced by this stack.
pub const IMPLEMENTATION_CLASS_UID: &str = "1.2.826.0.1.3680043.10.917.1";

/// The name of this implementation version
/// (16 characters or fewer).
pub const IMPLEMENTATION_VERSION_NAME: &str = "DCM-RS 0.1";

/// An error which may occur while reading a DICOM object.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("could not open file `{}`", filename))]
    OpenFile {
        filename: String,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("could not read from the source"))]
    ReadSource {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// The stream does not carry a preamble and one is required.
    #[snafu(display("the 128-byte preamble is missing"))]
    PreambleMissing { backtrace: Backtrace },

    /// The content could not be recognized as DICOM data.
    #[snafu(display("unrecognized content (not a DICOM stream)"))]
    UnrecognizedFormat { backtrace: Backtrace },

    /// The file meta group is missing and its presence is required.
    #[snafu(display("the file meta information group is missing"))]
    FmiMissing { backtrace: Backtrace },

    #[snafu(display("could not read the file meta information group"))]
    ReadMeta {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },

    /// The declared transfer syntax is not in the well-known set
    /// and strict validation is active.
    #[snafu(display("unknown transfer syntax `{}`", uid))]
    UnknownTransferSyntax { uid: String, backtrace: Backtrace },

    #[snafu(display("could not create data set decoder"))]
    CreateDecoder {
        #[snafu(backtrace)]
        source: dcm_parser::stateful::decode::Error,
    },

    #[snafu(display("could not read data set content"))]
    ReadToken {
        #[snafu(backtrace)]
        source: dcm_parser::dataset::read::Error,
    },

    /// The token stream ended inside an open sequence or item.
    #[snafu(display("premature end of data set"))]
    PrematureEnd { backtrace: Backtrace },

    /// The data set token stream broke its contract.
    /// This is an internal failure, never caused by the input.
    #[snafu(display("invariant violation: {}", message))]
    InvariantViolation {
        message: &'static str,
        backtrace: Backtrace,
    },

    /// A private element appeared with no preceding private creator.
    #[snafu(display("private element {} has no creator", tag))]
    OrphanPrivateElement { tag: Tag, backtrace: Backtrace },

    /// A private block was reserved by two different creators.
    #[snafu(display("private block of {} reserved more than once", tag))]
    DuplicatePrivateBlock { tag: Tag, backtrace: Backtrace },

    /// A validation rule raised an issue at or above
    /// the active profile's abort threshold.
    #[snafu(display("validation failed: {}", message))]
    ValidationFailed {
        message: String,
        backtrace: Backtrace,
    },
}

/// An error which may occur while writing a DICOM object.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WriteError {
    #[snafu(display("could not create file `{}`", filename))]
    CreateFile {
        filename: String,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("could not write the file preamble"))]
    WritePreamble {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    /// A custom preamble longer than 128 bytes was provided.
    #[snafu(display("custom preamble of {} bytes exceeds 128 bytes", length))]
    PreambleTooLong { length: usize, backtrace: Backtrace },

    #[snafu(display("could not write the file meta group"))]
    WriteMeta {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },

    /// The data set misses an attribute required
    /// for file meta generation.
    #[snafu(display("missing required UID {} for file meta generation", tag))]
    FmiMissingRequiredUid { tag: Tag, backtrace: Backtrace },

    /// A UID destined for the file meta group is malformed.
    #[snafu(display("invalid unique identifier `{}`", value))]
    InvalidUid {
        value: String,
        #[snafu(source(from(uid::InvalidUid, Box::new)))]
        source: Box<uid::InvalidUid>,
        backtrace: Backtrace,
    },

    #[snafu(display("could not write data set content"))]
    WriteDataSet {
        #[snafu(backtrace)]
        source: dcm_parser::dataset::write::Error,
    },

    /// The pixel data of element could not be materialized for writing.
    #[snafu(display("could not write pixel data of {}", tag))]
    WritePixelData {
        tag: Tag,
        #[snafu(backtrace)]
        source: crate::pixeldata::PixelDataError,
    },

    #[snafu(display("could not finish the deflated data set stream"))]
    FinishDeflate {
        backtrace: Backtrace,
        source: std::io::Error,
    },
}

/// How the reader treats the 128-byte preamble.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PreambleHandling {
    /// Fail unless a preamble followed by `DICM` is present.
    Require,
    /// Accept streams with or without a preamble; apply a heuristic
    /// to recognize bare data sets.
    #[default]
    Optional,
    /// Do not look for a preamble:
    /// treat the content as a bare data set.
    Ignore,
}

/// How the reader treats the file meta information group.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FmiHandling {
    /// Fail unless a file meta group is present.
    Require,
    /// Use the file meta group when present.
    #[default]
    Optional,
    /// Advance past any file meta group, but disregard its declared
    /// transfer syntax, guessing from the data set content instead.
    Ignore,
}

/// How sequence and item lengths are encoded on write.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SequenceLengthMode {
    /// Undefined lengths with explicit delimitation items.
    #[default]
    Undefined,
    /// Precomputed lengths, falling back to undefined encoding
    /// when a length would overflow its 32-bit field.
    Defined,
}

/// A destination for validation issues found while reading.
pub type IssueSink = Arc<dyn Fn(&Issue) + Send + Sync>;

/// The full set of options accepted by the reading routines.
/// Every option has exactly one documented effect.
#[derive(Clone)]
pub struct ReadOptions {
    /// How to treat the 128-byte preamble.
    pub preamble: PreambleHandling,
    /// How to treat the file meta group.
    pub fmi: FmiHandling,
    /// What to do upon a non-standard value representation code.
    pub invalid_vr: InvalidVrStrategy,
    /// The maximum admitted length of a single element value.
    pub max_element_length: u32,
    /// The maximum admitted sequence nesting depth.
    pub max_sequence_depth: u32,
    /// The maximum admitted number of items in the whole data set.
    pub max_total_items: u32,
    /// How to load the Pixel Data element value.
    pub pixel_data: PixelDataHandling,
    /// Whether to keep private elements with no known creator.
    pub retain_unknown_private_tags: bool,
    /// Whether a private element without a preceding creator
    /// fails the read.
    pub fail_on_orphan_private_elements: bool,
    /// Whether a doubly-reserved private block fails the read.
    pub fail_on_duplicate_private_slots: bool,
    /// The active validation profile.
    pub validation: ValidationProfile,
    /// Where to stream validation issues.
    pub issue_sink: Option<IssueSink>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            preamble: PreambleHandling::default(),
            fmi: FmiHandling::default(),
            invalid_vr: InvalidVrStrategy::default(),
            max_element_length: dcm_parser::stateful::decode::DEFAULT_MAX_ELEMENT_LENGTH,
            max_sequence_depth: dcm_parser::dataset::read::DEFAULT_MAX_SEQUENCE_DEPTH,
            max_total_items: dcm_parser::dataset::read::DEFAULT_MAX_TOTAL_ITEMS,
            pixel_data: PixelDataHandling::default(),
            retain_unknown_private_tags: true,
            fail_on_orphan_private_elements: false,
            fail_on_duplicate_private_slots: false,
            validation: ValidationProfile::default(),
            issue_sink: None,
        }
    }
}

impl std::fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOptions")
            .field("preamble", &self.preamble)
            .field("fmi", &self.fmi)
            .field("invalid_vr", &self.invalid_vr)
            .field("max_element_length", &self.max_element_length)
            .field("max_sequence_depth", &self.max_sequence_depth)
            .field("max_total_items", &self.max_total_items)
            .field("pixel_data", &self.pixel_data)
            .field(
                "retain_unknown_private_tags",
                &self.retain_unknown_private_tags,
            )
            .field(
                "fail_on_orphan_private_elements",
                &self.fail_on_orphan_private_elements,
            )
            .field(
                "fail_on_duplicate_private_slots",
                &self.fail_on_duplicate_private_slots,
            )
            .field("validation", &self.validation.name())
            .field("issue_sink", &self.issue_sink.is_some())
            .finish()
    }
}

/// The full set of options accepted by the writing routines.
/// Every option has exactly one documented effect.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// The transfer syntax for newly assembled files.
    pub transfer_syntax: TransferSyntax,
    /// How sequence and item lengths are encoded.
    pub sequence_length: SequenceLengthMode,
    /// Whether to generate the file meta group from the data set.
    pub auto_generate_fmi: bool,
    /// A custom preamble of up to 128 bytes, zero-padded on write.
    pub preamble: Option<Vec<u8>>,
    /// Whether the UIDs destined for the file meta group
    /// are checked for presence and format.
    pub validate_fmi_uids: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            transfer_syntax: entries::EXPLICIT_VR_LITTLE_ENDIAN.clone(),
            sequence_length: SequenceLengthMode::default(),
            auto_generate_fmi: true,
            preamble: None,
            validate_fmi_uids: true,
        }
    }
}

/// A DICOM object coupled with its file meta information table.
///
/// Dereferences to the inner object, so that data set access
/// and manipulation work transparently.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDicomObject<O> {
    meta: FileMetaTable,
    obj: O,
}

impl<O> FileDicomObject<O> {
    /// Obtain the file meta information table.
    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    /// The file's transfer syntax descriptor, resolved from the
    /// file meta group.
    pub fn transfer_syntax(&self) -> std::borrow::Cow<'static, TransferSyntax> {
        TransferSyntaxRegistry.get_or_unknown(self.meta.transfer_syntax())
    }

    /// Discard the file envelope, keeping the data set.
    pub fn into_inner(self) -> O {
        self.obj
    }
}

impl<O> Deref for FileDicomObject<O> {
    type Target = O;

    fn deref(&self) -> &Self::Target {
        &self.obj
    }
}

impl<O> DerefMut for FileDicomObject<O> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.obj
    }
}

impl FileDicomObject<InMemDicomObject> {
    /// Read a DICOM object from a reader, with default options.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReadError> {
        Self::from_reader_with(reader, &ReadOptions::default())
    }

    /// Read a DICOM object from a reader.
    ///
    /// Generic readers do not support deferred pixel data loading;
    /// a lazy request falls back to eager reading.
    /// Use [`open_file_with`] for deferred loading.
    pub fn from_reader_with<R: Read>(reader: R, options: &ReadOptions) -> Result<Self, ReadError> {
        let source = SourceReader::new(reader);
        let (object, _) = read_file_body(source, options, false)?;
        Ok(object)
    }

    /// Write the complete DICOM file: preamble, magic code,
    /// file meta group, and data set, with default options.
    pub fn write_to<W: Write>(&self, to: W) -> Result<(), WriteError> {
        self.write_to_with(to, &WriteOptions::default())
    }

    /// Write the complete DICOM file: preamble, magic code,
    /// file meta group, and data set.
    ///
    /// The transfer syntax is the one declared in the file meta group;
    /// the options' `transfer_syntax` field only affects newly
    /// assembled objects.
    pub fn write_to_with<W: Write>(&self, mut to: W, options: &WriteOptions) -> Result<(), WriteError> {
        let mut preamble = [0u8; 128];
        if let Some(custom) = &options.preamble {
            if custom.len() > 128 {
                return PreambleTooLongSnafu {
                    length: custom.len(),
                }
                .fail();
            }
            preamble[..custom.len()].copy_from_slice(custom);
        }
        to.write_all(&preamble).context(WritePreambleSnafu)?;

        self.meta.write_to(&mut to).context(WriteMetaSnafu)?;

        let ts = TransferSyntaxRegistry.get_or_unknown(self.meta.transfer_syntax());
        if ts.is_deflated() {
            let mut deflater = deflate::adapt_writer(to);
            self.obj
                .write_dataset_inner(&mut deflater, ts.as_ref(), options, true)?;
            deflater.finish().context(FinishDeflateSnafu)?;
            Ok(())
        } else {
            self.obj.write_dataset_inner(to, ts.as_ref(), options, true)
        }
    }
}

impl InMemDicomObject {
    /// Assemble a complete file object from this data set,
    /// generating the file meta group, with default options.
    pub fn into_file(self) -> Result<FileDicomObject<InMemDicomObject>, WriteError> {
        self.into_file_with(&WriteOptions::default())
    }

    /// Assemble a complete file object from this data set.
    ///
    /// When `auto_generate_fmi` is set, the media storage attributes
    /// are extracted from SOP Class UID (0008,0016) and
    /// SOP Instance UID (0008,0018), which must be present and valid
    /// under `validate_fmi_uids`.
    pub fn into_file_with(
        self,
        options: &WriteOptions,
    ) -> Result<FileDicomObject<InMemDicomObject>, WriteError> {
        let sop_class = self.string(tags::SOP_CLASS_UID).unwrap_or_default();
        let sop_instance = self.string(tags::SOP_INSTANCE_UID).unwrap_or_default();

        if options.validate_fmi_uids {
            if sop_class.is_empty() {
                return FmiMissingRequiredUidSnafu {
                    tag: tags::SOP_CLASS_UID,
                }
                .fail();
            }
            if sop_instance.is_empty() {
                return FmiMissingRequiredUidSnafu {
                    tag: tags::SOP_INSTANCE_UID,
                }
                .fail();
            }
            uid::validate_uid(&sop_class).context(InvalidUidSnafu {
                value: sop_class.clone(),
            })?;
            uid::validate_uid(&sop_instance).context(InvalidUidSnafu {
                value: sop_instance.clone(),
            })?;
        }

        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(sop_class)
            .media_storage_sop_instance_uid(sop_instance)
            .transfer_syntax(options.transfer_syntax.uid())
            .build()
            .context(WriteMetaSnafu)?;

        Ok(FileDicomObject { meta, obj: self })
    }

    /// Assemble a complete file object with the exact given
    /// file meta table.
    pub fn with_exact_meta(self, meta: FileMetaTable) -> FileDicomObject<InMemDicomObject> {
        FileDicomObject { meta, obj: self }
    }
}

/// Report issues to the configured sink and enforce
/// the profile's abort threshold.
pub(crate) fn dispatch_issues(issues: Vec<Issue>, options: &ReadOptions) -> Result<(), ReadError> {
    for issue in issues {
        let behavior = match issue.tag {
            Some(tag) => options.validation.behavior_for(tag),
            None => options.validation.default_behavior(),
        };
        if behavior == RuleBehavior::Skip {
            continue;
        }
        if let Some(sink) = &options.issue_sink {
            sink(&issue);
        }
        if options.validation.should_abort(behavior, issue.severity) {
            return ValidationFailedSnafu {
                message: issue.to_string(),
            }
            .fail();
        }
    }
    Ok(())
}

/// Whether the buffer plausibly starts with a bare DICOM data set:
/// a first tag in group 0008 or 0002, or an explicit VR signature.
fn looks_like_dataset_start(buf: &[u8]) -> bool {
    if buf.len() < 6 {
        return false;
    }
    let group = u16::from_le_bytes([buf[0], buf[1]]);
    matches!(group, 0x0008 | 0x0002) || looks_like_explicit_vr(buf)
}

/// Whether the buffer carries an explicit VR signature
/// at the position right after a first tag.
fn looks_like_explicit_vr(buf: &[u8]) -> bool {
    buf.len() >= 6 && buf[4].is_ascii_uppercase() && buf[5].is_ascii_uppercase()
}

/// Guess the transfer syntax of a bare data set from its first bytes.
fn guess_transfer_syntax(buf: &[u8]) -> &'static TransferSyntax {
    if looks_like_explicit_vr(buf) {
        &entries::EXPLICIT_VR_LITTLE_ENDIAN
    } else {
        &entries::IMPLICIT_VR_LITTLE_ENDIAN
    }
}

/// Peek at most `n` bytes from the source and return them to it.
fn peek<R: Read>(source: &mut SourceReader<R>, n: usize) -> Result<Vec<u8>, ReadError> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        let read = source
            .read(&mut buf[filled..])
            .context(ReadSourceSnafu)?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    buf.truncate(filled);
    source.unread(&buf);
    Ok(buf)
}

/// The outcome of preamble and magic code detection.
enum Envelope {
    /// Preamble and/or `DICM` found; the source is positioned
    /// right after the magic code.
    Dicom,
    /// Bare data set starting at the current position.
    Bare,
}

fn detect_envelope<R: Read>(
    source: &mut SourceReader<R>,
    options: &ReadOptions,
) -> Result<Envelope, ReadError> {
    if options.preamble == PreambleHandling::Ignore {
        return Ok(Envelope::Bare);
    }

    let head = peek(source, 132)?;
    if head.len() >= 132 && &head[128..132] == b"DICM" {
        // discard the preamble and the magic code
        let mut sink = [0u8; 132];
        source.read_exact(&mut sink).context(ReadSourceSnafu)?;
        return Ok(Envelope::Dicom);
    }
    if head.len() >= 4 && &head[..4] == b"DICM" {
        if options.preamble == PreambleHandling::Require {
            return PreambleMissingSnafu.fail();
        }
        let mut sink = [0u8; 4];
        source.read_exact(&mut sink).context(ReadSourceSnafu)?;
        return Ok(Envelope::Dicom);
    }

    match options.preamble {
        PreambleHandling::Require => PreambleMissingSnafu.fail(),
        PreambleHandling::Optional if looks_like_dataset_start(&head) => Ok(Envelope::Bare),
        PreambleHandling::Optional => UnrecognizedFormatSnafu.fail(),
        PreambleHandling::Ignore => Ok(Envelope::Bare),
    }
}

/// Read the whole file body from a positioned source:
/// envelope detection, file meta group, and data set.
///
/// Returns the built object and the source, so that callers with a
/// seekable stream can hand it over to deferred pixel data.
pub(crate) fn read_file_body<R: Read>(
    mut source: SourceReader<R>,
    options: &ReadOptions,
    lazy_allowed: bool,
) -> Result<(FileDicomObject<InMemDicomObject>, SourceReader<R>), ReadError> {
    let envelope = detect_envelope(&mut source, options)?;

    // after the envelope, a group 0002 element signals
    // the file meta group
    let head = peek(&mut source, 6)?;
    let has_fmi = head.len() >= 2 && u16::from_le_bytes([head[0], head[1]]) == 0x0002;

    let meta = match (has_fmi, options.fmi) {
        (false, FmiHandling::Require) => return FmiMissingSnafu.fail(),
        (true, _) => Some(FileMetaTable::read_after_magic(&mut source).context(ReadMetaSnafu)?),
        (false, _) => None,
    };

    let ts: std::borrow::Cow<TransferSyntax> = match (&meta, options.fmi) {
        (Some(meta), FmiHandling::Require) | (Some(meta), FmiHandling::Optional) => {
            let ts = TransferSyntaxRegistry.get_or_unknown(meta.transfer_syntax());
            if !ts.is_known()
                && options
                    .validation
                    .should_abort(RuleBehavior::Validate, dcm_core::validation::Severity::Error)
            {
                return UnknownTransferSyntaxSnafu { uid: ts.uid() }.fail();
            }
            ts
        }
        _ => {
            // no meta group (or its declaration is disregarded):
            // guess from the first data set bytes
            let head = peek(&mut source, 6)?;
            let guessed = match envelope {
                Envelope::Bare if options.preamble == PreambleHandling::Ignore => {
                    &entries::IMPLICIT_VR_LITTLE_ENDIAN
                }
                _ => guess_transfer_syntax(&head),
            };
            std::borrow::Cow::Borrowed(guessed)
        }
    };

    let base_offset = source.position();
    let decoder_options = dcm_parser::stateful::decode::DecoderOptions {
        invalid_vr: options.invalid_vr,
        max_element_length: options.max_element_length,
    };
    let limits = dcm_parser::dataset::read::ReadLimits {
        max_sequence_depth: options.max_sequence_depth,
        max_total_items: options.max_total_items,
    };

    let mut issues = Vec::new();
    let obj = if ts.is_deflated() {
        // the deflate boundary falls right after the file meta group
        let inflater = deflate::adapt_reader(&mut source);
        let decoder = dcm_parser::stateful::decode::StatefulDecoder::new_with_options(
            inflater,
            ts.as_ref(),
            decoder_options,
        )
        .context(CreateDecoderSnafu)?;
        let mut reader =
            dcm_parser::dataset::read::DataSetReader::new_with_limits(decoder, limits);
        InMemDicomObject::build_object(
            &mut reader,
            options,
            ts.as_ref(),
            base_offset,
            false,
            &mut issues,
        )?
    } else {
        let decoder = dcm_parser::stateful::decode::StatefulDecoder::new_with_options(
            &mut source,
            ts.as_ref(),
            decoder_options,
        )
        .context(CreateDecoderSnafu)?;
        let mut reader =
            dcm_parser::dataset::read::DataSetReader::new_with_limits(decoder, limits);
        InMemDicomObject::build_object(
            &mut reader,
            options,
            ts.as_ref(),
            base_offset,
            lazy_allowed,
            &mut issues,
        )?
    };

    dispatch_issues(issues, options)?;

    let meta = match meta {
        Some(meta) => meta,
        None => synthesize_meta(&obj, ts.as_ref()),
    };

    Ok((FileDicomObject { meta, obj }, source))
}

/// Build a file meta table for a bare data set,
/// from the guessed transfer syntax and whatever identifying
/// attributes the data set carries.
fn synthesize_meta(obj: &InMemDicomObject, ts: &TransferSyntax) -> FileMetaTable {
    let mut meta = FileMetaTable {
        information_group_length: 0,
        information_version: [0, 1],
        media_storage_sop_class_uid: obj.string(tags::SOP_CLASS_UID).unwrap_or_default(),
        media_storage_sop_instance_uid: obj.string(tags::SOP_INSTANCE_UID).unwrap_or_default(),
        transfer_syntax: ts.uid().to_string(),
        implementation_class_uid: IMPLEMENTATION_CLASS_UID.to_string(),
        implementation_version_name: Some(IMPLEMENTATION_VERSION_NAME.to_string()),
        source_application_entity_title: None,
        sending_application_entity_title: None,
        receiving_application_entity_title: None,
        private_information_creator_uid: None,
        private_information: None,
    };
    meta.update_information_group_length();
    meta
}
