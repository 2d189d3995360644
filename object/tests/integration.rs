//! Full-file integration tests: Part-10 round trips across transfer
//! syntaxes, envelope handling, character sets, private attributes,
//! and pixel data load modes.

use dcm_core::value::{DataSetSequence, PixelFragmentSequence, PrimitiveValue, Value};
use dcm_core::{Tag, VR};
use dcm_dictionary::{tags, uids};
use dcm_encoding::transfer_syntax::entries;
use dcm_object::{
    open_file_with, FileDicomObject, InMemDicomObject, PixelDataError, PixelDataHandling,
    PixelSource, PreambleHandling, ReadError, ReadOptions, SequenceLengthMode, WriteOptions,
};

type Element = dcm_object::InMemElement;

fn sample_object() -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    obj.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4.5.6");
    obj.put_str(tags::MODALITY, VR::CS, "OT");
    obj.put_str(tags::PATIENT_NAME, VR::PN, "DOE^JOHN");
    obj.put_str(tags::PATIENT_ID, VR::LO, "P-0001");
    obj.put_str(tags::SERIES_NUMBER, VR::IS, "1");
    obj.put_value(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16u16));

    let mut item = InMemDicomObject::new_empty();
    item.put_str(Tag(0x0008, 0x1150), VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    item.put_str(Tag(0x0008, 0x1155), VR::UI, "1.2.3.4.5.6.7");
    obj.put(Element::new(
        tags::REFERENCED_IMAGE_SEQUENCE,
        VR::SQ,
        Value::Sequence(DataSetSequence::new(vec![item])),
    ));
    obj
}

fn write_to_bytes(obj: InMemDicomObject, options: &WriteOptions) -> Vec<u8> {
    let file = obj.into_file_with(options).unwrap();
    let mut data = Vec::new();
    file.write_to_with(&mut data, options).unwrap();
    data
}

#[test]
fn part10_round_trip_explicit_le() {
    part10_round_trip(&entries::EXPLICIT_VR_LITTLE_ENDIAN);
}

#[test]
fn part10_round_trip_implicit_le() {
    part10_round_trip(&entries::IMPLICIT_VR_LITTLE_ENDIAN);
}

#[test]
fn part10_round_trip_explicit_be() {
    part10_round_trip(&entries::EXPLICIT_VR_BIG_ENDIAN);
}

fn part10_round_trip(ts: &dcm_encoding::TransferSyntax) {
    let original = sample_object();
    let options = WriteOptions {
        transfer_syntax: ts.clone(),
        ..WriteOptions::default()
    };
    let data = write_to_bytes(original.clone(), &options);

    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    assert_eq!(file.meta().transfer_syntax(), ts.uid());
    assert_eq!(&*file, &original);

    // writing the same object twice is byte-identical
    let data2 = write_to_bytes(original, &options);
    assert_eq!(data, data2);
}

#[test]
fn part10_round_trip_deflated() {
    let original = sample_object();
    let options = WriteOptions {
        transfer_syntax: entries::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN.clone(),
        ..WriteOptions::default()
    };
    let data = write_to_bytes(original.clone(), &options);

    // the data set region is not plain DICOM bytes
    assert_eq!(&data[128..132], b"DICM");
    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    assert_eq!(
        file.meta().transfer_syntax(),
        uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN
    );
    assert_eq!(&*file, &original);
}

#[test]
fn defined_sequence_lengths_round_trip() {
    let original = sample_object();
    let options = WriteOptions {
        sequence_length: SequenceLengthMode::Defined,
        ..WriteOptions::default()
    };
    let data = write_to_bytes(original.clone(), &options);
    // no sequence delimitation item in the output
    assert!(!data
        .windows(4)
        .any(|w| w == [0xFE, 0xFF, 0xDD, 0xE0]));

    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    assert_eq!(&*file, &original);
}

#[test]
fn missing_preamble_is_governed_by_the_options() {
    // a bare data set starting at (0008,0005)
    let raw: &[u8] = &[
        0x08, 0x00, 0x05, 0x00, b'C', b'S', 0x0A, 0x00, b'I', b'S', b'O', b'_', b'I', b'R', b' ',
        b'1', b'0', b'0',
    ];

    let file = FileDicomObject::from_reader(&raw[..]).unwrap();
    assert_eq!(file.string(tags::SPECIFIC_CHARACTER_SET).unwrap(), "ISO_IR 100");

    let options = ReadOptions {
        preamble: PreambleHandling::Require,
        ..ReadOptions::default()
    };
    assert!(matches!(
        FileDicomObject::from_reader_with(&raw[..], &options),
        Err(ReadError::PreambleMissing { .. })
    ));
}

#[test]
fn arbitrary_content_is_not_accepted() {
    let raw = b"GIF89a but definitely not a DICOM stream";
    assert!(matches!(
        FileDicomObject::from_reader(&raw[..]),
        Err(ReadError::UnrecognizedFormat { .. })
    ));
}

#[test]
fn character_set_applies_to_previously_inserted_elements() {
    let mut obj = InMemDicomObject::new_empty();
    // raw Latin-1 text inserted before the character set is declared
    obj.put_value(
        tags::PATIENT_NAME,
        VR::PN,
        PrimitiveValue::Str(b"Dupont^Andr\xE9".to_vec()),
    );
    obj.put_str(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 100");
    assert_eq!(obj.string(tags::PATIENT_NAME).unwrap(), "Dupont^André");
}

#[test]
fn sequence_items_inherit_the_character_set() {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(tags::SPECIFIC_CHARACTER_SET, VR::CS, "ISO_IR 192");
    obj.put_str(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    obj.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
    let mut item = InMemDicomObject::new_empty();
    item.put_value(
        Tag(0x0008, 0x103E),
        VR::LO,
        PrimitiveValue::Str("Исследование".as_bytes().to_vec()),
    );
    obj.put(Element::new(
        tags::REFERENCED_IMAGE_SEQUENCE,
        VR::SQ,
        Value::Sequence(DataSetSequence::new(vec![item])),
    ));

    let data = write_to_bytes(obj, &WriteOptions::default());
    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    let seq = file
        .element(tags::REFERENCED_IMAGE_SEQUENCE)
        .unwrap()
        .value()
        .items()
        .unwrap();
    assert_eq!(
        seq[0].string(Tag(0x0008, 0x103E)).unwrap(),
        "Исследование"
    );
}

#[test]
fn private_creators_are_registered_on_read() {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    obj.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
    obj.put_str(Tag(0x0009, 0x0010), VR::LO, "ACME 1.1");
    obj.put_str(Tag(0x0009, 0x1001), VR::LO, "vendor data");

    let data = write_to_bytes(obj, &WriteOptions::default());
    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    assert_eq!(file.private_creator(0x0009, 0x10), Some("ACME 1.1"));
    assert_eq!(
        file.private_creator_of(Tag(0x0009, 0x1001)),
        Some("ACME 1.1")
    );
}

#[test]
fn orphan_private_elements_policy() {
    // private data with no creator
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    obj.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
    obj.put_str(Tag(0x0009, 0x1001), VR::LO, "orphan");
    let data = write_to_bytes(obj, &WriteOptions::default());

    // by default the element is retained
    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    assert!(file.contains(Tag(0x0009, 0x1001)));

    // it can be dropped instead
    let options = ReadOptions {
        retain_unknown_private_tags: false,
        ..ReadOptions::default()
    };
    let file = FileDicomObject::from_reader_with(&data[..], &options).unwrap();
    assert!(!file.contains(Tag(0x0009, 0x1001)));

    // or be made fatal
    let options = ReadOptions {
        fail_on_orphan_private_elements: true,
        ..ReadOptions::default()
    };
    assert!(matches!(
        FileDicomObject::from_reader_with(&data[..], &options),
        Err(ReadError::OrphanPrivateElement { .. })
    ));
}

#[test]
fn private_block_allocation_and_compaction() {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(Tag(0x0009, 0x0011), VR::LO, "VENDOR A");
    obj.put_str(Tag(0x0009, 0x1101), VR::LO, "a-data");

    // allocation picks the first free block
    let block = obj.allocate_private_block(0x0009, "VENDOR B").unwrap();
    assert_eq!(block, 0x10);
    // allocating again for the same creator is idempotent
    assert_eq!(obj.allocate_private_block(0x0009, "VENDOR B").unwrap(), 0x10);

    // compaction moves VENDOR A from block 0x11 to 0x11's successor slot
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(Tag(0x0009, 0x0012), VR::LO, "VENDOR A");
    obj.put_str(Tag(0x0009, 0x1201), VR::LO, "a-data");
    let mapping = obj.compact_private_group(0x0009);
    assert_eq!(mapping, vec![(0x12, 0x10)]);
    assert_eq!(obj.private_creator(0x0009, 0x10), Some("VENDOR A"));
    assert!(obj.contains(Tag(0x0009, 0x1001)));
    assert!(!obj.contains(Tag(0x0009, 0x1201)));
}

fn image_object() -> InMemDicomObject {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    obj.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
    obj.put_value(tags::ROWS, VR::US, PrimitiveValue::from(2u16));
    obj.put_value(tags::COLUMNS, VR::US, PrimitiveValue::from(2u16));
    obj.put_value(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1u16));
    obj.put_value(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16u16));
    obj.put_str(tags::NUMBER_OF_FRAMES, VR::IS, "2");
    // two frames of 2x2 16-bit samples
    let pixels: Vec<u8> = (0u8..16).collect();
    obj.put(Element::new(
        tags::PIXEL_DATA,
        VR::OW,
        Value::PixelData(PixelSource::Immediate(pixels)),
    ));
    obj
}

#[test]
fn native_frame_access() {
    let obj = image_object();
    assert_eq!(obj.pixel_data_frame(0).unwrap(), (0u8..8).collect::<Vec<_>>());
    assert_eq!(obj.pixel_data_frame(1).unwrap(), (8u8..16).collect::<Vec<_>>());
    assert!(matches!(
        obj.pixel_data_frame(2),
        Err(PixelDataError::FrameOutOfRange { .. })
    ));
}

#[test]
fn lazy_pixel_data_defers_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.dcm");
    image_object()
        .into_file()
        .unwrap()
        .to_file(&path)
        .unwrap();

    let options = ReadOptions {
        pixel_data: PixelDataHandling::Lazy,
        ..ReadOptions::default()
    };
    let file = open_file_with(&path, &options).unwrap();
    match file.element(tags::PIXEL_DATA).unwrap().value() {
        Value::PixelData(PixelSource::Lazy(lazy)) => assert!(!lazy.is_loaded()),
        other => panic!("expected lazy pixel data, got {:?}", other),
    }

    // loading happens on demand
    assert_eq!(
        file.pixel_data_frame(1).unwrap(),
        (8u8..16).collect::<Vec<_>>()
    );
    match file.element(tags::PIXEL_DATA).unwrap().value() {
        Value::PixelData(PixelSource::Lazy(lazy)) => assert!(lazy.is_loaded()),
        other => panic!("expected lazy pixel data, got {:?}", other),
    }
}

#[test]
fn skipped_pixel_data_denies_access() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.dcm");
    image_object()
        .into_file()
        .unwrap()
        .to_file(&path)
        .unwrap();

    let options = ReadOptions {
        pixel_data: PixelDataHandling::Skip,
        ..ReadOptions::default()
    };
    let file = open_file_with(&path, &options).unwrap();
    assert!(matches!(
        file.pixel_data_frame(0),
        Err(PixelDataError::PixelDataSkipped { .. })
    ));
    assert!(matches!(
        InMemDicomObject::to_owned(&file),
        Err(PixelDataError::PixelDataSkipped { .. })
    ));
    // all other attributes are available
    assert_eq!(file.uint16(tags::ROWS).unwrap(), 2);
}

#[test]
fn pixel_data_callback_arbitration() {
    use std::sync::Arc;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.dcm");
    image_object()
        .into_file()
        .unwrap()
        .to_file(&path)
        .unwrap();

    let options = ReadOptions {
        pixel_data: PixelDataHandling::Callback(Arc::new(|ctx| {
            assert_eq!(ctx.rows, Some(2));
            assert_eq!(ctx.bits_allocated, Some(16));
            assert!(!ctx.encapsulated);
            dcm_object::PixelDataMode::Skip
        })),
        ..ReadOptions::default()
    };
    let file = open_file_with(&path, &options).unwrap();
    assert!(matches!(
        file.element(tags::PIXEL_DATA).unwrap().value(),
        Value::PixelData(PixelSource::Skipped { .. })
    ));
}

#[test]
fn encapsulated_pixel_data_round_trip() {
    let mut obj = InMemDicomObject::new_empty();
    obj.put_str(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
    obj.put_str(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
    obj.put(Element::new(
        tags::PIXEL_DATA,
        VR::OB,
        Value::PixelSequence(PixelFragmentSequence::new(
            vec![],
            vec![vec![0xAA, 0xBB, 0xCC, 0xDD]],
        )),
    ));

    let options = WriteOptions {
        transfer_syntax: entries::JPEG_BASELINE.clone(),
        ..WriteOptions::default()
    };
    let data = write_to_bytes(obj.clone(), &options);
    let file = FileDicomObject::from_reader(&data[..]).unwrap();
    let value = file.element(tags::PIXEL_DATA).unwrap().value();
    assert_eq!(value.fragments().unwrap(), &[vec![0xAA, 0xBB, 0xCC, 0xDD]]);
    assert_eq!(&*file, &obj);
}

#[test]
fn to_owned_detaches_and_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.dcm");
    image_object()
        .into_file()
        .unwrap()
        .to_file(&path)
        .unwrap();

    let options = ReadOptions {
        pixel_data: PixelDataHandling::Lazy,
        ..ReadOptions::default()
    };
    let file = open_file_with(&path, &options).unwrap();
    let owned = InMemDicomObject::to_owned(&file).unwrap();
    match owned.element(tags::PIXEL_DATA).unwrap().value() {
        Value::PixelData(PixelSource::Immediate(data)) => {
            assert_eq!(data, &(0u8..16).collect::<Vec<_>>())
        }
        other => panic!("expected immediate pixel data, got {:?}", other),
    }
}
