//! The curated attribute table behind the standard dictionary.
//!
//! The table covers the command set, the file meta group, and the
//! standard attributes this stack manipulates or is commonly asked for.
//! It is not the full PS3.6 table; unknown attributes resolve to `UN`
//! under implicit VR, as permitted for a dictionary collaborator.

use dcm_core::dictionary::DictionaryEntry;
use dcm_core::{Tag, VR};

macro_rules! entry {
    ($group:literal, $elem:literal, $keyword:literal, $name:literal, [$($vr:ident),+], $vm:literal) => {
        DictionaryEntry {
            tag: Tag($group, $elem),
            keyword: $keyword,
            name: $name,
            vrs: &[$(VR::$vr),+],
            vm: $vm,
            retired: false,
        }
    };
    ($group:literal, $elem:literal, $keyword:literal, $name:literal, [$($vr:ident),+], $vm:literal, retired) => {
        DictionaryEntry {
            tag: Tag($group, $elem),
            keyword: $keyword,
            name: $name,
            vrs: &[$(VR::$vr),+],
            vm: $vm,
            retired: true,
        }
    };
}

pub const ENTRIES: &[DictionaryEntry] = &[
    // command set (PS3.7)
    entry!(0x0000, 0x0000, "CommandGroupLength", "Command Group Length", [UL], "1"),
    entry!(0x0000, 0x0002, "AffectedSOPClassUID", "Affected SOP Class UID", [UI], "1"),
    entry!(0x0000, 0x0003, "RequestedSOPClassUID", "Requested SOP Class UID", [UI], "1"),
    entry!(0x0000, 0x0100, "CommandField", "Command Field", [US], "1"),
    entry!(0x0000, 0x0110, "MessageID", "Message ID", [US], "1"),
    entry!(0x0000, 0x0120, "MessageIDBeingRespondedTo", "Message ID Being Responded To", [US], "1"),
    entry!(0x0000, 0x0600, "MoveDestination", "Move Destination", [AE], "1"),
    entry!(0x0000, 0x0700, "Priority", "Priority", [US], "1"),
    entry!(0x0000, 0x0800, "CommandDataSetType", "Command Data Set Type", [US], "1"),
    entry!(0x0000, 0x0900, "Status", "Status", [US], "1"),
    entry!(0x0000, 0x0902, "ErrorComment", "Error Comment", [LO], "1"),
    // file meta group (PS3.10)
    entry!(0x0002, 0x0000, "FileMetaInformationGroupLength", "File Meta Information Group Length", [UL], "1"),
    entry!(0x0002, 0x0001, "FileMetaInformationVersion", "File Meta Information Version", [OB], "1"),
    entry!(0x0002, 0x0002, "MediaStorageSOPClassUID", "Media Storage SOP Class UID", [UI], "1"),
    entry!(0x0002, 0x0003, "MediaStorageSOPInstanceUID", "Media Storage SOP Instance UID", [UI], "1"),
    entry!(0x0002, 0x0010, "TransferSyntaxUID", "Transfer Syntax UID", [UI], "1"),
    entry!(0x0002, 0x0012, "ImplementationClassUID", "Implementation Class UID", [UI], "1"),
    entry!(0x0002, 0x0013, "ImplementationVersionName", "Implementation Version Name", [SH], "1"),
    entry!(0x0002, 0x0016, "SourceApplicationEntityTitle", "Source Application Entity Title", [AE], "1"),
    entry!(0x0002, 0x0017, "SendingApplicationEntityTitle", "Sending Application Entity Title", [AE], "1"),
    entry!(0x0002, 0x0018, "ReceivingApplicationEntityTitle", "Receiving Application Entity Title", [AE], "1"),
    entry!(0x0002, 0x0100, "PrivateInformationCreatorUID", "Private Information Creator UID", [UI], "1"),
    entry!(0x0002, 0x0102, "PrivateInformation", "Private Information", [OB], "1"),
    // group 0008
    entry!(0x0008, 0x0005, "SpecificCharacterSet", "Specific Character Set", [CS], "1-n"),
    entry!(0x0008, 0x0008, "ImageType", "Image Type", [CS], "2-n"),
    entry!(0x0008, 0x0016, "SOPClassUID", "SOP Class UID", [UI], "1"),
    entry!(0x0008, 0x0018, "SOPInstanceUID", "SOP Instance UID", [UI], "1"),
    entry!(0x0008, 0x0020, "StudyDate", "Study Date", [DA], "1"),
    entry!(0x0008, 0x0021, "SeriesDate", "Series Date", [DA], "1"),
    entry!(0x0008, 0x0022, "AcquisitionDate", "Acquisition Date", [DA], "1"),
    entry!(0x0008, 0x0023, "ContentDate", "Content Date", [DA], "1"),
    entry!(0x0008, 0x0030, "StudyTime", "Study Time", [TM], "1"),
    entry!(0x0008, 0x0031, "SeriesTime", "Series Time", [TM], "1"),
    entry!(0x0008, 0x0033, "ContentTime", "Content Time", [TM], "1"),
    entry!(0x0008, 0x0050, "AccessionNumber", "Accession Number", [SH], "1"),
    entry!(0x0008, 0x0060, "Modality", "Modality", [CS], "1"),
    entry!(0x0008, 0x0064, "ConversionType", "Conversion Type", [CS], "1"),
    entry!(0x0008, 0x0070, "Manufacturer", "Manufacturer", [LO], "1"),
    entry!(0x0008, 0x0080, "InstitutionName", "Institution Name", [LO], "1"),
    entry!(0x0008, 0x0090, "ReferringPhysicianName", "Referring Physician's Name", [PN], "1"),
    entry!(0x0008, 0x1030, "StudyDescription", "Study Description", [LO], "1"),
    entry!(0x0008, 0x103E, "SeriesDescription", "Series Description", [LO], "1"),
    entry!(0x0008, 0x1090, "ManufacturerModelName", "Manufacturer's Model Name", [LO], "1"),
    entry!(0x0008, 0x1140, "ReferencedImageSequence", "Referenced Image Sequence", [SQ], "1"),
    entry!(0x0008, 0x1150, "ReferencedSOPClassUID", "Referenced SOP Class UID", [UI], "1"),
    entry!(0x0008, 0x1155, "ReferencedSOPInstanceUID", "Referenced SOP Instance UID", [UI], "1"),
    entry!(0x0008, 0x2112, "SourceImageSequence", "Source Image Sequence", [SQ], "1"),
    // group 0010
    entry!(0x0010, 0x0010, "PatientName", "Patient's Name", [PN], "1"),
    entry!(0x0010, 0x0020, "PatientID", "Patient ID", [LO], "1"),
    entry!(0x0010, 0x0030, "PatientBirthDate", "Patient's Birth Date", [DA], "1"),
    entry!(0x0010, 0x0040, "PatientSex", "Patient's Sex", [CS], "1"),
    entry!(0x0010, 0x1010, "PatientAge", "Patient's Age", [AS], "1"),
    entry!(0x0010, 0x1030, "PatientWeight", "Patient's Weight", [DS], "1"),
    entry!(0x0010, 0x4000, "PatientComments", "Patient Comments", [LT], "1"),
    // group 0018
    entry!(0x0018, 0x0015, "BodyPartExamined", "Body Part Examined", [CS], "1"),
    entry!(0x0018, 0x0050, "SliceThickness", "Slice Thickness", [DS], "1"),
    entry!(0x0018, 0x0060, "KVP", "KVP", [DS], "1"),
    entry!(0x0018, 0x1020, "SoftwareVersions", "Software Versions", [LO], "1-n"),
    entry!(0x0018, 0x5100, "PatientPosition", "Patient Position", [CS], "1"),
    // group 0020
    entry!(0x0020, 0x000D, "StudyInstanceUID", "Study Instance UID", [UI], "1"),
    entry!(0x0020, 0x000E, "SeriesInstanceUID", "Series Instance UID", [UI], "1"),
    entry!(0x0020, 0x0010, "StudyID", "Study ID", [SH], "1"),
    entry!(0x0020, 0x0011, "SeriesNumber", "Series Number", [IS], "1"),
    entry!(0x0020, 0x0013, "InstanceNumber", "Instance Number", [IS], "1"),
    entry!(0x0020, 0x0032, "ImagePositionPatient", "Image Position (Patient)", [DS], "3"),
    entry!(0x0020, 0x0037, "ImageOrientationPatient", "Image Orientation (Patient)", [DS], "6"),
    entry!(0x0020, 0x0052, "FrameOfReferenceUID", "Frame of Reference UID", [UI], "1"),
    entry!(0x0020, 0x4000, "ImageComments", "Image Comments", [LT], "1"),
    // group 0028
    entry!(0x0028, 0x0002, "SamplesPerPixel", "Samples per Pixel", [US], "1"),
    entry!(0x0028, 0x0004, "PhotometricInterpretation", "Photometric Interpretation", [CS], "1"),
    entry!(0x0028, 0x0006, "PlanarConfiguration", "Planar Configuration", [US], "1"),
    entry!(0x0028, 0x0008, "NumberOfFrames", "Number of Frames", [IS], "1"),
    entry!(0x0028, 0x0010, "Rows", "Rows", [US], "1"),
    entry!(0x0028, 0x0011, "Columns", "Columns", [US], "1"),
    entry!(0x0028, 0x0030, "PixelSpacing", "Pixel Spacing", [DS], "2"),
    entry!(0x0028, 0x0100, "BitsAllocated", "Bits Allocated", [US], "1"),
    entry!(0x0028, 0x0101, "BitsStored", "Bits Stored", [US], "1"),
    entry!(0x0028, 0x0102, "HighBit", "High Bit", [US], "1"),
    entry!(0x0028, 0x0103, "PixelRepresentation", "Pixel Representation", [US], "1"),
    entry!(0x0028, 0x0106, "SmallestImagePixelValue", "Smallest Image Pixel Value", [US, SS], "1"),
    entry!(0x0028, 0x0107, "LargestImagePixelValue", "Largest Image Pixel Value", [US, SS], "1"),
    entry!(0x0028, 0x1050, "WindowCenter", "Window Center", [DS], "1-n"),
    entry!(0x0028, 0x1051, "WindowWidth", "Window Width", [DS], "1-n"),
    entry!(0x0028, 0x1052, "RescaleIntercept", "Rescale Intercept", [DS], "1"),
    entry!(0x0028, 0x1053, "RescaleSlope", "Rescale Slope", [DS], "1"),
    entry!(0x0028, 0x1101, "RedPaletteColorLookupTableDescriptor", "Red Palette Color Lookup Table Descriptor", [US, SS], "3"),
    entry!(0x0028, 0x1102, "GreenPaletteColorLookupTableDescriptor", "Green Palette Color Lookup Table Descriptor", [US, SS], "3"),
    entry!(0x0028, 0x1103, "BluePaletteColorLookupTableDescriptor", "Blue Palette Color Lookup Table Descriptor", [US, SS], "3"),
    entry!(0x0028, 0x1201, "RedPaletteColorLookupTableData", "Red Palette Color Lookup Table Data", [OW], "1"),
    entry!(0x0028, 0x1202, "GreenPaletteColorLookupTableData", "Green Palette Color Lookup Table Data", [OW], "1"),
    entry!(0x0028, 0x1203, "BluePaletteColorLookupTableData", "Blue Palette Color Lookup Table Data", [OW], "1"),
    entry!(0x0028, 0x3002, "LUTDescriptor", "LUT Descriptor", [US, SS], "3"),
    entry!(0x0028, 0x3003, "LUTExplanation", "LUT Explanation", [LO], "1"),
    entry!(0x0028, 0x3006, "LUTData", "LUT Data", [US, OW], "1-n"),
    entry!(0x0028, 0x3010, "VOILUTSequence", "VOI LUT Sequence", [SQ], "1"),
    // group 0032
    entry!(0x0032, 0x1060, "RequestedProcedureDescription", "Requested Procedure Description", [LO], "1"),
    // group 0040
    entry!(0x0040, 0x0254, "PerformedProcedureStepDescription", "Performed Procedure Step Description", [LO], "1"),
    entry!(0x0040, 0xA730, "ContentSequence", "Content Sequence", [SQ], "1"),
    // group 7FE0
    entry!(0x7FE0, 0x0001, "ExtendedOffsetTable", "Extended Offset Table", [OV], "1"),
    entry!(0x7FE0, 0x0002, "ExtendedOffsetTableLengths", "Extended Offset Table Lengths", [OV], "1"),
    entry!(0x7FE0, 0x0010, "PixelData", "Pixel Data", [OB, OW], "1"),
];

#[cfg(test)]
mod tests {
    use super::ENTRIES;

    #[test]
    fn entries_are_sorted_and_unique() {
        for pair in ENTRIES.windows(2) {
            assert!(
                pair[0].tag < pair[1].tag,
                "{} must precede {}",
                pair[0].tag,
                pair[1].tag
            );
        }
    }
}
