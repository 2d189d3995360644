//! This module contains the implementation for an in-memory DICOM object.

use crate::pixeldata::{
    LazyPixelData, PixelDataContext, PixelDataError, PixelDataHandling, PixelDataMode, PixelSource,
    SharedStream,
};
use crate::{ReadError, ReadOptions, SequenceLengthMode, WriteError, WriteOptions};
use dcm_core::header::{DataElement, DataElementHeader, HasLength, Header, Length, Tag, VR};
use std::convert::TryFrom;
use dcm_core::validation::{Issue, Severity};
use dcm_core::value::{DataSetSequence, PrimitiveValue, Value};
use dcm_dictionary::tags;
use dcm_encoding::text::{SpecificCharacterSet, TextCodec};
use dcm_encoding::transfer_syntax::TransferSyntax;
use dcm_parser::dataset::read::{DataSetReader, ReadLimits};
use dcm_parser::dataset::write::DataSetWriter;
use dcm_parser::dataset::DataToken;
use dcm_parser::stateful::decode::{DecoderOptions, StatefulDecode, StatefulDecoder};
use snafu::{Backtrace, IntoError, OptionExt, ResultExt, Snafu};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// The type of a data element of an in-memory DICOM object.
pub type InMemElement = DataElement<InMemDicomObject, PixelSource>;

/// An error which may occur when accessing an element of a data set.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum AccessError {
    /// The data set holds no element with the given tag.
    #[snafu(display("no such data element {}", tag))]
    NoSuchDataElement { tag: Tag, backtrace: Backtrace },

    /// The element exists, but its value does not have the expected shape.
    #[snafu(display("could not interpret the value of element {}", tag))]
    CastValue {
        tag: Tag,
        source: dcm_core::value::CastValueError,
    },

    /// The element's text could not be decoded
    /// through the active character set.
    #[snafu(display("could not decode the text of element {}", tag))]
    DecodeTextValue {
        tag: Tag,
        #[snafu(backtrace)]
        source: dcm_encoding::text::DecodeTextError,
    },

    /// The element does not hold a primitive value.
    #[snafu(display("element {} is not primitive", tag))]
    NotPrimitive { tag: Tag, backtrace: Backtrace },
}

/// An error which may occur when manipulating private blocks.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum PrivateBlockError {
    /// Private attributes require an odd group number.
    #[snafu(display("group {:#06X} is not private", group))]
    NotPrivateGroup { group: u16, backtrace: Backtrace },

    /// All private blocks in the group are reserved.
    #[snafu(display("no free private block in group {:#06X}", group))]
    NoFreeBlock { group: u16, backtrace: Backtrace },
}

/// An in-memory DICOM data set: an ordered collection of data elements,
/// with unique tags and iteration in ascending tag order.
///
/// The object caches the pieces of context which drive decoding
/// behavior elsewhere: the active specific character set, and the
/// bits-allocated / pixel-representation pair needed to resolve
/// context dependent VRs. Sequence items receive a snapshot of the
/// enclosing data set's context at construction, consulted only when
/// the item does not define its own.
#[derive(Debug, Clone)]
pub struct InMemDicomObject {
    entries: BTreeMap<Tag, InMemElement>,
    /// the character set locally declared by (0008,0005)
    charset: Option<SpecificCharacterSet>,
    /// the character set inherited from the enclosing data set
    inherited_charset: Option<SpecificCharacterSet>,
    bits_allocated: Option<u16>,
    pixel_representation: Option<u16>,
    /// reserved private blocks: (group, block) to creator
    private_creators: BTreeMap<(u16, u8), String>,
}

impl PartialEq for InMemDicomObject {
    /// Equality of data sets is defined by their elements alone.
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Default for InMemDicomObject {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl InMemDicomObject {
    /// Create a new empty object.
    pub fn new_empty() -> Self {
        InMemDicomObject {
            entries: BTreeMap::new(),
            charset: None,
            inherited_charset: None,
            bits_allocated: None,
            pixel_representation: None,
            private_creators: BTreeMap::new(),
        }
    }

    /// Create a new empty item for the given enclosing data set,
    /// carrying a snapshot of its decoding context.
    fn new_item_of(parent: &InMemDicomObject) -> Self {
        InMemDicomObject {
            entries: BTreeMap::new(),
            charset: None,
            inherited_charset: parent.charset.or(parent.inherited_charset),
            bits_allocated: parent.bits_allocated,
            pixel_representation: parent.pixel_representation,
            private_creators: BTreeMap::new(),
        }
    }

    /// The number of elements in this data set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the data set holds no elements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the elements in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = &InMemElement> {
        self.entries.values()
    }

    /// Whether the data set holds an element with the given tag.
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    /// Obtain the element with the given tag, if present.
    pub fn get(&self, tag: Tag) -> Option<&InMemElement> {
        self.entries.get(&tag)
    }

    /// Obtain the element with the given tag,
    /// failing if it is not present.
    pub fn element(&self, tag: Tag) -> Result<&InMemElement, AccessError> {
        self.entries
            .get(&tag)
            .context(NoSuchDataElementSnafu { tag })
    }

    /// Insert a data element into the object, replacing (and returning)
    /// any previous element of the same attribute.
    pub fn put(&mut self, elt: InMemElement) -> Option<InMemElement> {
        let tag = elt.tag();
        self.update_context_for(tag, &elt);
        self.entries.insert(tag, elt)
    }

    /// Insert a new element with a textual value.
    pub fn put_str(&mut self, tag: Tag, vr: VR, value: impl Into<String>) -> Option<InMemElement> {
        self.put(DataElement::new(
            tag,
            vr,
            Value::from(PrimitiveValue::from(value.into())),
        ))
    }

    /// Insert a new element with a primitive value.
    pub fn put_value(
        &mut self,
        tag: Tag,
        vr: VR,
        value: PrimitiveValue,
    ) -> Option<InMemElement> {
        self.put(DataElement::new(tag, vr, Value::from(value)))
    }

    /// Remove the element with the given tag,
    /// reporting whether it was present.
    pub fn remove_element(&mut self, tag: Tag) -> bool {
        if self.entries.remove(&tag).is_some() {
            match tag {
                tags::SPECIFIC_CHARACTER_SET => self.charset = None,
                tags::BITS_ALLOCATED => self.bits_allocated = None,
                tags::PIXEL_REPRESENTATION => self.pixel_representation = None,
                t if t.is_private_creator() => {
                    self.private_creators.remove(&(t.group(), t.element() as u8));
                }
                _ => {}
            }
            true
        } else {
            false
        }
    }

    fn update_context_for(&mut self, tag: Tag, elt: &InMemElement) {
        match tag {
            tags::SPECIFIC_CHARACTER_SET => {
                let term = elt
                    .primitive_value()
                    .and_then(|v| v.string().ok())
                    .unwrap_or("");
                match SpecificCharacterSet::from_element_value(term) {
                    Ok(cs) => self.charset = Some(cs),
                    Err(e) => {
                        tracing::warn!("specific character set not supported: {}", e);
                        self.charset = None;
                    }
                }
            }
            tags::BITS_ALLOCATED => {
                self.bits_allocated = elt.primitive_value().and_then(|v| v.uint16().ok());
            }
            tags::PIXEL_REPRESENTATION => {
                self.pixel_representation =
                    elt.primitive_value().and_then(|v| v.uint16().ok());
            }
            t if t.is_private_creator() => {
                if let Some(creator) = elt.primitive_value().and_then(|v| v.string().ok()) {
                    self.private_creators
                        .insert((t.group(), t.element() as u8), creator.trim().to_string());
                }
            }
            _ => {}
        }
    }

    /// The effective character set of this data set:
    /// the one locally declared by Specific Character Set (0008,0005),
    /// the enclosing data set's otherwise, or the default repertoire.
    pub fn encoding(&self) -> SpecificCharacterSet {
        self.charset.or(self.inherited_charset).unwrap_or_default()
    }

    /// The cached Bits Allocated value, when present at this level
    /// or inherited.
    pub fn bits_allocated(&self) -> Option<u16> {
        self.bits_allocated
    }

    /// The cached Pixel Representation value, when present at this
    /// level or inherited.
    pub fn pixel_representation(&self) -> Option<u16> {
        self.pixel_representation
    }

    /// Read the element's text, decoded through the data set's
    /// effective character set.
    ///
    /// Decoding is on demand: a Specific Character Set element inserted
    /// after this element still affects how it reads.
    pub fn string(&self, tag: Tag) -> Result<String, AccessError> {
        let elt = self.element(tag)?;
        let value = match elt.value() {
            Value::Primitive(v) => v,
            _ => return NotPrimitiveSnafu { tag }.fail(),
        };
        match value {
            PrimitiveValue::Empty => Ok(String::new()),
            PrimitiveValue::Str(bytes) => self
                .encoding()
                .decode(bytes)
                .context(DecodeTextValueSnafu { tag })
                .map(|s| s.trim_end().to_string()),
            other => other
                .string()
                .map(|s| s.to_string())
                .context(CastValueSnafu { tag }),
        }
    }

    /// Read the element's text as multiple values,
    /// split by the standard delimiter.
    pub fn strings(&self, tag: Tag) -> Result<Vec<String>, AccessError> {
        Ok(self
            .string(tag)?
            .split('\\')
            .map(|s| s.to_string())
            .collect())
    }

    /// Read the element's first value as a 16-bit unsigned integer.
    pub fn uint16(&self, tag: Tag) -> Result<u16, AccessError> {
        let elt = self.element(tag)?;
        match elt.value() {
            Value::Primitive(v) => v.uint16().context(CastValueSnafu { tag }),
            _ => NotPrimitiveSnafu { tag }.fail(),
        }
    }

    /// Read the element's first value as a 32-bit unsigned integer.
    pub fn uint32(&self, tag: Tag) -> Result<u32, AccessError> {
        let elt = self.element(tag)?;
        match elt.value() {
            Value::Primitive(v) => v.uint32().context(CastValueSnafu { tag }),
            _ => NotPrimitiveSnafu { tag }.fail(),
        }
    }

    /// Read an integer-string element as a signed integer.
    pub fn integer_string(&self, tag: Tag) -> Result<i32, AccessError> {
        let text = self.string(tag)?;
        text.trim()
            .parse()
            .map_err(|_| {
                CastValueSnafu { tag }
                    .into_error(dcm_core::value::primitive::InvalidTextSnafu.build())
            })
    }

    /// Produce a deep copy of this data set, with independently owned
    /// element bytes and no link to any enclosing data set.
    ///
    /// Deferred pixel data is loaded in the process; a skipped pixel
    /// data source makes the operation fail.
    pub fn to_owned(&self) -> Result<Self, PixelDataError> {
        let mut entries = BTreeMap::new();
        for (tag, elt) in &self.entries {
            let value = match elt.value() {
                Value::Primitive(v) => Value::Primitive(v.clone()),
                Value::PixelSequence(ps) => Value::PixelSequence(ps.clone()),
                Value::PixelData(src) => Value::PixelData(src.to_owned()?),
                Value::Sequence(seq) => {
                    let items = seq
                        .items()
                        .iter()
                        .map(|item| item.to_owned())
                        .collect::<Result<Vec<_>, _>>()?;
                    Value::Sequence(DataSetSequence::new_with_length(
                        items,
                        seq.declared_length(),
                    ))
                }
            };
            entries.insert(*tag, DataElement::new(*tag, elt.vr(), value));
        }
        Ok(InMemDicomObject {
            entries,
            charset: self.charset.or(self.inherited_charset),
            inherited_charset: None,
            bits_allocated: self.bits_allocated,
            pixel_representation: self.pixel_representation,
            private_creators: self.private_creators.clone(),
        })
    }

    // --- private block bookkeeping ---

    /// The creator which reserved the given private block,
    /// if any.
    pub fn private_creator(&self, group: u16, block: u8) -> Option<&str> {
        self.private_creators
            .get(&(group, block))
            .map(String::as_str)
    }

    /// The creator of the given private data element tag, if any.
    pub fn private_creator_of(&self, tag: Tag) -> Option<&str> {
        let block = tag.private_slot()?;
        self.private_creator(tag.group(), block)
    }

    /// Find the private block in `group` reserved by `creator`.
    pub fn find_private_block(&self, group: u16, creator: &str) -> Option<u8> {
        self.private_creators
            .iter()
            .find(|((g, _), c)| *g == group && c.as_str() == creator)
            .map(|((_, block), _)| *block)
    }

    /// Reserve a private block in `group` for `creator`:
    /// the block already reserved by this creator when there is one,
    /// or the first unused block otherwise. The corresponding private
    /// creator element is inserted.
    pub fn allocate_private_block(
        &mut self,
        group: u16,
        creator: &str,
    ) -> Result<u8, PrivateBlockError> {
        if group % 2 == 0 {
            return NotPrivateGroupSnafu { group }.fail();
        }
        if let Some(block) = self.find_private_block(group, creator) {
            return Ok(block);
        }
        let block = (0x10..=0xFF)
            .find(|block| !self.private_creators.contains_key(&(group, *block)))
            .context(NoFreeBlockSnafu { group })?;
        self.put_str(Tag(group, u16::from(block)), VR::LO, creator);
        Ok(block)
    }

    /// Compact the private blocks of `group`: creators are reassigned
    /// to consecutive blocks starting at 0x10, in ascending order of
    /// their current block, and the group's private data elements are
    /// renumbered in place.
    ///
    /// Returns the applied block mapping as `(from, to)` pairs.
    pub fn compact_private_group(&mut self, group: u16) -> Vec<(u8, u8)> {
        let creators: Vec<(u8, String)> = self
            .private_creators
            .range((group, 0)..=(group, 0xFF))
            .map(|((_, block), creator)| (*block, creator.clone()))
            .collect();

        let mapping: Vec<(u8, u8)> = creators
            .iter()
            .enumerate()
            .map(|(i, (block, _))| (*block, 0x10 + i as u8))
            .filter(|(from, to)| from != to)
            .collect();

        for &(from, to) in &mapping {
            // move the creator element
            if let Some(elt) = self.entries.remove(&Tag(group, u16::from(from))) {
                let moved = DataElement::new(
                    Tag(group, u16::from(to)),
                    elt.vr(),
                    elt.into_value(),
                );
                self.put(moved);
            }
            self.private_creators.remove(&(group, from));

            // move the block's data elements
            let low = Tag(group, u16::from(from) << 8);
            let high = Tag(group, (u16::from(from) << 8) | 0xFF);
            let tags_to_move: Vec<Tag> = self
                .entries
                .range(low..=high)
                .map(|(tag, _)| *tag)
                .collect();
            for tag in tags_to_move {
                if let Some(elt) = self.entries.remove(&tag) {
                    let new_tag =
                        Tag(group, (u16::from(to) << 8) | (tag.element() & 0x00FF));
                    self.entries
                        .insert(new_tag, DataElement::new(new_tag, elt.vr(), elt.into_value()));
                }
            }
        }
        // re-register creators under their final blocks
        for (i, (_, creator)) in creators.into_iter().enumerate() {
            self.private_creators
                .insert((group, 0x10 + i as u8), creator);
        }
        mapping
    }

    // --- reading ---

    /// Read a data set in the given transfer syntax from a reader,
    /// eagerly and with default limits, until the end of the stream.
    pub fn read_dataset_with_ts<R: Read>(
        from: R,
        ts: &TransferSyntax,
    ) -> Result<Self, ReadError> {
        Self::read_dataset_with_ts_options(from, ts, &ReadOptions::default())
    }

    /// Read a data set in the given transfer syntax from a reader,
    /// with the given options, until the end of the stream.
    pub fn read_dataset_with_ts_options<R: Read>(
        from: R,
        ts: &TransferSyntax,
        options: &ReadOptions,
    ) -> Result<Self, ReadError> {
        let decoder = StatefulDecoder::new_with_options(
            from,
            ts,
            DecoderOptions {
                invalid_vr: options.invalid_vr,
                max_element_length: options.max_element_length,
            },
        )
        .context(crate::CreateDecoderSnafu)?;
        let mut reader = DataSetReader::new_with_limits(
            decoder,
            ReadLimits {
                max_sequence_depth: options.max_sequence_depth,
                max_total_items: options.max_total_items,
            },
        );
        let mut issues = Vec::new();
        let obj = Self::build_object(&mut reader, options, ts, 0, false, &mut issues)?;
        crate::dispatch_issues(issues, options)?;
        Ok(obj)
    }

    /// Build an object from the token stream of a data set reader.
    ///
    /// `base_offset` is the absolute position of the data set's first
    /// byte in the underlying stream, used to report pixel data value
    /// positions; `lazy_allowed` states whether deferred pixel data
    /// loading is possible for this source.
    pub(crate) fn build_object<S: StatefulDecode>(
        reader: &mut DataSetReader<S>,
        options: &ReadOptions,
        ts: &TransferSyntax,
        base_offset: u64,
        lazy_allowed: bool,
        issues: &mut Vec<Issue>,
    ) -> Result<Self, ReadError> {
        // explicit build stacks: one data set per nesting level,
        // one frame per open sequence
        let mut datasets: Vec<InMemDicomObject> = vec![InMemDicomObject::new_empty()];
        let mut seqs: Vec<(Tag, Length, Vec<InMemDicomObject>)> = Vec::new();
        let mut pixel_seq: Option<(Vec<u32>, Vec<Vec<u8>>)> = None;
        let mut pending_header: Option<DataElementHeader> = None;

        while let Some(token) = reader.next() {
            let token = token.context(crate::ReadTokenSnafu)?;
            match token {
                DataToken::ElementHeader(header) => {
                    if seqs.is_empty()
                        && header.tag == tags::PIXEL_DATA
                        && header.len.is_defined()
                    {
                        let root = datasets.first().context(crate::InvariantViolationSnafu {
                            message: "no root data set",
                        })?;
                        let ctx = pixel_data_context(root, ts, header.len);
                        let mode = resolve_pixel_mode(&options.pixel_data, &ctx, lazy_allowed, ts);
                        if mode != PixelDataMode::Eager {
                            let (offset, length) = reader
                                .skip_pending_value()
                                .context(crate::ReadTokenSnafu)?
                                .context(crate::InvariantViolationSnafu {
                                    message: "no pixel data value pending after its header",
                                })?;
                            let source = match mode {
                                PixelDataMode::Lazy => PixelSource::Lazy(
                                    LazyPixelData::detached(base_offset + offset, length),
                                ),
                                _ => PixelSource::Skipped {
                                    offset: base_offset + offset,
                                    length,
                                },
                            };
                            let elt = DataElement::new(
                                header.tag,
                                header.vr,
                                Value::PixelData(source),
                            );
                            let target =
                                datasets.last_mut().context(crate::InvariantViolationSnafu {
                                    message: "no data set under construction",
                                })?;
                            Self::insert_parsed(target, elt, options, issues)?;
                            continue;
                        }
                    }
                    pending_header = Some(header);
                }
                DataToken::PrimitiveValue(value) => {
                    let header =
                        pending_header
                            .take()
                            .context(crate::InvariantViolationSnafu {
                                message: "value token without a preceding element header",
                            })?;
                    let elt = if seqs.is_empty() && header.tag == tags::PIXEL_DATA {
                        DataElement::new(
                            header.tag,
                            header.vr,
                            Value::PixelData(PixelSource::Immediate(value.into_bytes())),
                        )
                    } else {
                        DataElement::new(header.tag, header.vr, Value::Primitive(value))
                    };
                    let target = datasets.last_mut().context(crate::InvariantViolationSnafu {
                        message: "no data set under construction",
                    })?;
                    Self::insert_parsed(target, elt, options, issues)?;
                }
                DataToken::SequenceStart { tag, len } => {
                    seqs.push((tag, len, Vec::new()));
                }
                DataToken::ItemStart { .. } => {
                    let item = {
                        let parent = datasets.last().context(crate::InvariantViolationSnafu {
                            message: "no data set under construction",
                        })?;
                        InMemDicomObject::new_item_of(parent)
                    };
                    datasets.push(item);
                }
                DataToken::ItemEnd => {
                    let item = datasets.pop().filter(|_| datasets.len() >= 1);
                    match (item, seqs.last_mut()) {
                        (Some(item), Some((_, _, items))) => items.push(item),
                        _ => return crate::PrematureEndSnafu.fail(),
                    }
                }
                DataToken::SequenceEnd => {
                    let elt = if let Some((offset_table, fragments)) = pixel_seq.take() {
                        DataElement::new(
                            tags::PIXEL_DATA,
                            VR::OB,
                            Value::PixelSequence(dcm_core::value::PixelFragmentSequence::new(
                                offset_table,
                                fragments,
                            )),
                        )
                    } else {
                        let (tag, declared_len, items) = match seqs.pop() {
                            Some(seq) => seq,
                            None => return crate::PrematureEndSnafu.fail(),
                        };
                        DataElement::new(
                            tag,
                            VR::SQ,
                            Value::Sequence(DataSetSequence::new_with_length(
                                items,
                                declared_len,
                            )),
                        )
                    };
                    let target = datasets.last_mut().context(crate::InvariantViolationSnafu {
                        message: "no data set under construction",
                    })?;
                    Self::insert_parsed(target, elt, options, issues)?;
                }
                DataToken::PixelSequenceStart => {
                    pixel_seq = Some((Vec::new(), Vec::new()));
                }
                DataToken::OffsetTable(offsets) => {
                    if let Some((offset_table, _)) = pixel_seq.as_mut() {
                        *offset_table = offsets;
                    }
                }
                DataToken::ItemValue(data) => {
                    if let Some((_, fragments)) = pixel_seq.as_mut() {
                        fragments.push(data);
                    }
                }
            }
        }

        issues.extend(reader.take_issues());

        if !seqs.is_empty() || datasets.len() != 1 || pending_header.is_some() {
            return crate::PrematureEndSnafu.fail();
        }
        datasets
            .into_iter()
            .next()
            .context(crate::InvariantViolationSnafu {
                message: "no root data set",
            })
    }

    /// Insert an element coming from the parser,
    /// applying the private attribute policies.
    fn insert_parsed(
        obj: &mut InMemDicomObject,
        elt: InMemElement,
        options: &ReadOptions,
        issues: &mut Vec<Issue>,
    ) -> Result<(), ReadError> {
        let tag = elt.tag();

        if let Some(block) = tag.private_slot() {
            if obj.private_creator(tag.group(), block).is_none() {
                issues.push(Issue::new(
                    Severity::Warning,
                    tag,
                    "private element without a preceding private creator",
                ));
                if options.fail_on_orphan_private_elements {
                    return crate::OrphanPrivateElementSnafu { tag }.fail();
                }
                if !options.retain_unknown_private_tags {
                    return Ok(());
                }
            }
        }

        if tag.is_private_creator() {
            let block = tag.element() as u8;
            let new_creator = elt
                .primitive_value()
                .and_then(|v| v.string().ok())
                .unwrap_or("")
                .trim()
                .to_string();
            if let Some(existing) = obj.private_creator(tag.group(), block) {
                if existing != new_creator {
                    issues.push(Issue::new(
                        Severity::Warning,
                        tag,
                        "private block reserved more than once",
                    ));
                    if options.fail_on_duplicate_private_slots {
                        return crate::DuplicatePrivateBlockSnafu { tag }.fail();
                    }
                }
            }
        }

        obj.put(elt);
        Ok(())
    }

    /// Attach the source stream to any deferred pixel data in this
    /// object, enabling it to be loaded later.
    pub(crate) fn attach_pixel_stream(&self, stream: &SharedStream) {
        if let Some(elt) = self.entries.get(&tags::PIXEL_DATA) {
            if let Value::PixelData(PixelSource::Lazy(lazy)) = elt.value() {
                lazy.attach(stream.clone());
            }
        }
    }

    // --- pixel data access ---

    /// Obtain the raw bytes of frame `index` of native pixel data.
    ///
    /// The frame layout is computed from Rows, Columns,
    /// Samples per Pixel and Bits Allocated; Number of Frames
    /// defaults to 1 when absent.
    pub fn pixel_data_frame(&self, index: u32) -> Result<Vec<u8>, PixelDataError> {
        let elt = match self.entries.get(&tags::PIXEL_DATA) {
            Some(elt) => elt,
            None => return crate::pixeldata::IncompleteContextSnafu.fail(),
        };

        let rows = self.uint16(tags::ROWS).ok();
        let columns = self.uint16(tags::COLUMNS).ok();
        let samples = self.uint16(tags::SAMPLES_PER_PIXEL).ok();
        let bits = self.bits_allocated;
        let frames = self
            .integer_string(tags::NUMBER_OF_FRAMES)
            .ok()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1);

        let (rows, columns, bits) = match (rows, columns, bits) {
            (Some(r), Some(c), Some(b)) => (r, c, b),
            _ => return crate::pixeldata::IncompleteContextSnafu.fail(),
        };
        if index >= frames {
            return crate::pixeldata::FrameOutOfRangeSnafu {
                index,
                frames,
            }
            .fail();
        }

        let frame_size = u64::from(rows)
            * u64::from(columns)
            * u64::from(samples.unwrap_or(1))
            * u64::from((bits + 7) / 8);

        let data = match elt.value() {
            Value::PixelData(source) => source.bytes()?,
            Value::Primitive(v) => v.as_bytes(),
            _ => return crate::pixeldata::IncompleteContextSnafu.fail(),
        };

        let start = (u64::from(index) * frame_size) as usize;
        let end = start + frame_size as usize;
        if end > data.len() {
            return crate::pixeldata::FrameOutOfRangeSnafu {
                index,
                frames,
            }
            .fail();
        }
        Ok(data[start..end].to_vec())
    }

    // --- writing ---

    /// Write this data set to a writer in the given transfer syntax,
    /// with default options (undefined sequence lengths).
    pub fn write_dataset_with_ts<W: Write>(
        &self,
        to: W,
        ts: &TransferSyntax,
    ) -> Result<(), WriteError> {
        self.write_dataset_with_ts_options(to, ts, &WriteOptions::default())
    }

    /// Write this data set to a writer in the given transfer syntax.
    pub fn write_dataset_with_ts_options<W: Write>(
        &self,
        to: W,
        ts: &TransferSyntax,
        options: &WriteOptions,
    ) -> Result<(), WriteError> {
        self.write_dataset_inner(to, ts, options, false)
    }

    pub(crate) fn write_dataset_inner<W: Write>(
        &self,
        to: W,
        ts: &TransferSyntax,
        options: &WriteOptions,
        skip_meta: bool,
    ) -> Result<(), WriteError> {
        let mut writer =
            DataSetWriter::new_with(to, ts).context(crate::WriteDataSetSnafu)?;
        let mut tokens = Vec::new();
        self.append_tokens(
            &mut tokens,
            ts.explicit_vr(),
            options.sequence_length,
            skip_meta,
        )?;
        writer
            .write_sequence(tokens)
            .context(crate::WriteDataSetSnafu)
    }

    /// Produce the data set's token stream for serialization.
    /// `skip_meta` leaves out any stray group 0002 elements.
    pub(crate) fn append_tokens(
        &self,
        tokens: &mut Vec<DataToken>,
        explicit_vr: bool,
        mode: SequenceLengthMode,
        skip_meta: bool,
    ) -> Result<(), WriteError> {
        for elt in self.iter() {
            let tag = elt.tag();
            if skip_meta && tag.group() == 0x0002 {
                continue;
            }
            match elt.value() {
                Value::Primitive(v) => {
                    let len = v.len() as u32;
                    tokens.push(DataToken::ElementHeader(DataElementHeader::new(
                        tag,
                        elt.vr(),
                        Length(len + (len & 1)),
                    )));
                    tokens.push(DataToken::PrimitiveValue(v.clone()));
                }
                Value::PixelData(source) => {
                    let data = source
                        .bytes()
                        .context(crate::WritePixelDataSnafu { tag })?;
                    let len = data.len() as u32;
                    tokens.push(DataToken::ElementHeader(DataElementHeader::new(
                        tag,
                        elt.vr(),
                        Length(len + (len & 1)),
                    )));
                    tokens.push(DataToken::PrimitiveValue(PrimitiveValue::from_bytes(
                        data.to_vec(),
                    )));
                }
                Value::PixelSequence(ps) => {
                    tokens.push(DataToken::PixelSequenceStart);
                    tokens.push(DataToken::OffsetTable(ps.offset_table().to_vec()));
                    for fragment in ps.fragments() {
                        tokens.push(DataToken::ItemValue(fragment.clone()));
                    }
                    tokens.push(DataToken::SequenceEnd);
                }
                Value::Sequence(seq) => {
                    let defined = match mode {
                        SequenceLengthMode::Defined => {
                            let body: u64 = seq
                                .items()
                                .iter()
                                .map(|item| 8 + item.encoded_len(explicit_vr, mode))
                                .sum();
                            // fall back to undefined lengths when the
                            // total does not fit a 32-bit length field
                            if body < u64::from(u32::MAX) {
                                Some(body as u32)
                            } else {
                                None
                            }
                        }
                        SequenceLengthMode::Undefined => None,
                    };
                    match defined {
                        Some(seq_len) => {
                            tokens.push(DataToken::SequenceStart {
                                tag,
                                len: Length(seq_len),
                            });
                            for item in seq.items() {
                                let item_len = item.encoded_len(explicit_vr, mode) as u32;
                                tokens.push(DataToken::ItemStart {
                                    len: Length(item_len),
                                });
                                item.append_tokens(tokens, explicit_vr, mode, skip_meta)?;
                                tokens.push(DataToken::ItemEnd);
                            }
                            tokens.push(DataToken::SequenceEnd);
                        }
                        None => {
                            tokens.push(DataToken::SequenceStart {
                                tag,
                                len: Length::UNDEFINED,
                            });
                            for item in seq.items() {
                                tokens.push(DataToken::ItemStart {
                                    len: Length::UNDEFINED,
                                });
                                item.append_tokens(tokens, explicit_vr, mode, skip_meta)?;
                                tokens.push(DataToken::ItemEnd);
                            }
                            tokens.push(DataToken::SequenceEnd);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The encoded byte length of this data set's body
    /// under the given VR mode and sequence length mode.
    fn encoded_len(&self, explicit_vr: bool, mode: SequenceLengthMode) -> u64 {
        self.iter()
            .map(|elt| element_encoded_len(elt, explicit_vr, mode))
            .sum()
    }
}

impl std::iter::FromIterator<InMemElement> for InMemDicomObject {
    fn from_iter<T: IntoIterator<Item = InMemElement>>(iter: T) -> Self {
        let mut obj = InMemDicomObject::new_empty();
        for elt in iter {
            obj.put(elt);
        }
        obj
    }
}

fn header_len(vr: VR, explicit_vr: bool) -> u64 {
    if !explicit_vr {
        8
    } else if vr.has_short_length() {
        8
    } else {
        12
    }
}

fn element_encoded_len(elt: &InMemElement, explicit_vr: bool, mode: SequenceLengthMode) -> u64 {
    match elt.value() {
        Value::Primitive(v) => {
            let len = v.len() as u64;
            header_len(elt.vr(), explicit_vr) + len + (len & 1)
        }
        Value::PixelData(source) => {
            let len = u64::from(source.length().0);
            header_len(elt.vr(), explicit_vr) + len + (len & 1)
        }
        Value::PixelSequence(ps) => {
            let mut total = header_len(VR::OB, explicit_vr);
            total += 8 + ps.offset_table().len() as u64 * 4;
            for fragment in ps.fragments() {
                let len = fragment.len() as u64;
                total += 8 + len + (len & 1);
            }
            total + 8 // sequence delimiter
        }
        Value::Sequence(seq) => {
            let header = header_len(VR::SQ, explicit_vr);
            let body: u64 = seq
                .items()
                .iter()
                .map(|item| 8 + item.encoded_len(explicit_vr, mode))
                .sum();
            match mode {
                SequenceLengthMode::Defined if body < u64::from(u32::MAX) => header + body,
                // undefined lengths add item and sequence delimiters
                _ => {
                    let delimiters = 8 + seq.multiplicity() as u64 * 8;
                    header + body + delimiters
                }
            }
        }
    }
}

fn pixel_data_context(
    obj: &InMemDicomObject,
    ts: &TransferSyntax,
    declared: Length,
) -> PixelDataContext {
    PixelDataContext {
        rows: obj.uint16(tags::ROWS).ok(),
        columns: obj.uint16(tags::COLUMNS).ok(),
        samples_per_pixel: obj.uint16(tags::SAMPLES_PER_PIXEL).ok(),
        bits_allocated: obj.bits_allocated(),
        number_of_frames: obj
            .integer_string(tags::NUMBER_OF_FRAMES)
            .ok()
            .and_then(|n| u32::try_from(n).ok()),
        transfer_syntax_uid: ts.uid().to_string(),
        encapsulated: declared.is_undefined(),
        declared_length: declared,
    }
}

fn resolve_pixel_mode(
    handling: &PixelDataHandling,
    ctx: &PixelDataContext,
    lazy_allowed: bool,
    ts: &TransferSyntax,
) -> PixelDataMode {
    let mode = match handling {
        PixelDataHandling::Eager => PixelDataMode::Eager,
        PixelDataHandling::Lazy => PixelDataMode::Lazy,
        PixelDataHandling::Skip => PixelDataMode::Skip,
        PixelDataHandling::Callback(arbiter) => arbiter(ctx),
    };
    if mode == PixelDataMode::Lazy && (!lazy_allowed || ts.is_deflated()) {
        tracing::warn!(
            "deferred pixel data loading is not possible for this source, reading eagerly"
        );
        PixelDataMode::Eager
    } else {
        mode
    }
}
