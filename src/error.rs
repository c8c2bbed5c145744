use std::{io, path::PathBuf};

use arrow::error::ArrowError;
use pod5_format::FormatError;

/// Errors that stop a whole directory walk before any file is decoded.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Requested input path {0} does not exist")]
    InputPathMissing(PathBuf),

    #[error("Requested input path {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("Invalid loader configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("Failed to read directory: {0}")]
    IOError(#[from] io::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Pod5(#[from] Pod5Error),

    #[error(transparent)]
    Fast5(#[from] Fast5Error),
}

/// Errors from decoding a single POD5 file.
#[derive(Debug, thiserror::Error)]
pub enum Pod5Error {
    #[error("POD5 container error: {0}")]
    Format(#[from] FormatError),

    #[error("POD5 IO error: {0}")]
    IOError(#[from] io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Missing column {column} in {table} table")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("Column {column} in {table} table has unexpected type {found}")]
    ColumnType {
        table: &'static str,
        column: &'static str,
        found: String,
    },

    #[error("Null value in column {column} at row {row}")]
    NullValue { column: &'static str, row: usize },

    #[error("Read batch {index} out of range, file has {count} batches")]
    BatchOutOfRange { index: usize, count: usize },

    #[error("Row {row} out of range, batch has {count} rows")]
    RowOutOfRange { row: usize, count: usize },

    #[error("Signal row {0} out of range of the signal table")]
    SignalRowOutOfRange(u64),

    #[error("No run info for acquisition {0}")]
    UnknownRunInfo(String),

    #[error("Signal length mismatch, expected {expected} samples found {found}")]
    SignalLength { expected: usize, found: usize },

    #[error("Failed to decompress signal: {0}")]
    Decompress(#[from] svb16::DecodeError),
}

/// Errors from decoding a single FAST5 file.
#[derive(Debug, thiserror::Error)]
pub enum Fast5Error {
    #[error("FAST5 support not enabled, rebuild with the `hdf5` feature")]
    Unsupported,

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Missing group {0}")]
    MissingGroup(String),

    #[error("Missing attribute {0}")]
    MissingAttribute(String),

    #[error("Attribute {name} has type {found}, expected {expected}")]
    AttributeType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Attribute {name} value {value} does not fit in {expected}")]
    AttributeRange {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("Invalid channel number {0:?}")]
    InvalidChannelNumber(String),

    #[error("Invalid FAST5 Signal data type of {0}")]
    InvalidSignalType(String),

    #[error("Signal length mismatch, dataset declares {expected} samples but {found} were read")]
    SignalLength { expected: usize, found: usize },

    #[error("Invalid sampling rate {0}")]
    InvalidSampleRate(f32),

    #[error("Invalid experiment start time {value:?}: {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error("Start time {0} is out of range")]
    TimestampOutOfRange(String),
}
