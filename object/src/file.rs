//! Convenience routines for opening and saving DICOM files.

use crate::pixeldata::SharedStream;
use crate::util::SourceReader;
use crate::{
    read_file_body, CreateFileSnafu, FileDicomObject, InMemDicomObject, OpenFileSnafu,
    ReadError, ReadOptions, WriteError, WriteOptions,
};
use snafu::ResultExt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Open a DICOM file from the file system, with default options.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<FileDicomObject<InMemDicomObject>, ReadError> {
    open_file_with(path, &ReadOptions::default())
}

/// Open a DICOM file from the file system.
///
/// This entry point supports deferred pixel data loading:
/// the file handle is retained by the object's pixel data source
/// until it is loaded or the object is dropped.
pub fn open_file_with<P: AsRef<Path>>(
    path: P,
    options: &ReadOptions,
) -> Result<FileDicomObject<InMemDicomObject>, ReadError> {
    let path = path.as_ref();
    let file = File::open(path).context(OpenFileSnafu {
        filename: path.display().to_string(),
    })?;
    let source = SourceReader::new(BufReader::new(file));
    let (object, source) = read_file_body(source, options, true)?;

    // hand the stream over to any deferred pixel data
    let stream: SharedStream = Arc::new(Mutex::new(Box::new(source.into_inner())));
    object.attach_pixel_stream(&stream);

    Ok(object)
}

impl FileDicomObject<InMemDicomObject> {
    /// Write the complete DICOM file to the file system,
    /// with default options.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), WriteError> {
        self.to_file_with(path, &WriteOptions::default())
    }

    /// Write the complete DICOM file to the file system.
    pub fn to_file_with<P: AsRef<Path>>(
        &self,
        path: P,
        options: &WriteOptions,
    ) -> Result<(), WriteError> {
        let path = path.as_ref();
        let file = File::create(path).context(CreateFileSnafu {
            filename: path.display().to_string(),
        })?;
        self.write_to_with(BufWriter::new(file), options)
    }
}
