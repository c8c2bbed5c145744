//! Loading reads from multi-read FAST5 files.
//!
//! Every top level group of a FAST5 file is one read. Reads are decoded one
//! after another on the calling thread. Unlike POD5 decoding every attribute
//! is required: the first failure ends the file.
use std::fmt;

use crate::{
    error::Fast5Error,
    read::{Read, ReadAttributes},
    sink::ReadSink,
    timestamp::adjust_time,
};

#[cfg(all(test, feature = "hdf5"))]
pub(crate) mod fixture;
#[cfg(feature = "hdf5")]
mod hdf5_file;

#[cfg(feature = "hdf5")]
pub use hdf5_file::{Hdf5File, Hdf5Group};

/// A scalar attribute as stored in the file.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    VarLenString(String),
    /// The raw landing buffer of a fixed-length string attribute.
    FixedString(Vec<u8>),
}

impl AttributeValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::VarLenString(_) => "variable-length string",
            Self::FixedString(_) => "fixed-length string",
        }
    }

    fn type_error(&self, name: &str, expected: &'static str) -> Fast5Error {
        Fast5Error::AttributeType {
            name: name.to_string(),
            expected,
            found: self.type_name(),
        }
    }

    /// Read a string attribute.
    ///
    /// Fixed-length strings are cut at the first null byte, they are not
    /// always padded out to their declared width.
    pub fn to_string_value(&self, name: &str) -> Result<String, Fast5Error> {
        match self {
            Self::VarLenString(s) => Ok(s.clone()),
            Self::FixedString(buf) => {
                let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
            }
            _ => Err(self.type_error(name, "string")),
        }
    }

    pub fn to_f32(&self, name: &str) -> Result<f32, Fast5Error> {
        match *self {
            Self::Int(v) => Ok(v as f32),
            Self::UInt(v) => Ok(v as f32),
            Self::Float(v) => Ok(v as f32),
            _ => Err(self.type_error(name, "float")),
        }
    }

    pub fn to_u32(&self, name: &str) -> Result<u32, Fast5Error> {
        let value = self.to_u64(name)?;
        u32::try_from(value).map_err(|_| Fast5Error::AttributeRange {
            name: name.to_string(),
            expected: "u32",
            value: value.to_string(),
        })
    }

    pub fn to_u64(&self, name: &str) -> Result<u64, Fast5Error> {
        match *self {
            Self::UInt(v) => Ok(v),
            Self::Int(v) => u64::try_from(v).map_err(|_| Fast5Error::AttributeRange {
                name: name.to_string(),
                expected: "u64",
                value: v.to_string(),
            }),
            _ => Err(self.type_error(name, "unsigned integer")),
        }
    }

    /// `channel_number` is written either as an integer or as a decimal
    /// string depending on the writer.
    pub fn to_channel_number(&self, name: &str) -> Result<i32, Fast5Error> {
        let out_of_range = |value: String| Fast5Error::AttributeRange {
            name: name.to_string(),
            expected: "i32",
            value,
        };
        match *self {
            Self::Int(v) => i32::try_from(v).map_err(|_| out_of_range(v.to_string())),
            Self::UInt(v) => i32::try_from(v).map_err(|_| out_of_range(v.to_string())),
            Self::VarLenString(_) | Self::FixedString(_) => {
                let value = self.to_string_value(name)?;
                value
                    .trim()
                    .parse()
                    .map_err(|_| Fast5Error::InvalidChannelNumber(value))
            }
            Self::Float(_) => Err(self.type_error(name, "integer or string")),
        }
    }
}

/// Element type of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Int16,
    Other(String),
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int16 => write!(f, "Integer16"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetInfo {
    pub element_type: ElementType,
    pub len: usize,
}

/// A group in a FAST5 attribute tree.
pub trait Fast5Group: Sized {
    fn group(&self, name: &str) -> Result<Self, Fast5Error>;

    fn attribute(&self, name: &str) -> Result<AttributeValue, Fast5Error>;

    fn dataset_info(&self, name: &str) -> Result<DatasetInfo, Fast5Error>;

    /// Read a whole `i16` dataset into `out`, which is sized from
    /// [`Fast5Group::dataset_info`].
    fn read_i16(&self, name: &str, out: &mut [i16]) -> Result<(), Fast5Error>;
}

/// An opened FAST5 file.
pub trait Fast5Source {
    type Group: Fast5Group;

    /// Names of the top level read groups, in file order.
    fn read_names(&self) -> Result<Vec<String>, Fast5Error>;

    fn read_group(&self, name: &str) -> Result<Self::Group, Fast5Error>;
}

/// Decode up to `max_reads` reads from `source` into `sink`.
pub(crate) fn load_reads<S, K>(
    source: &S,
    filename: &str,
    max_reads: usize,
    sink: &mut K,
) -> Result<usize, Fast5Error>
where
    S: Fast5Source,
    K: ReadSink + ?Sized,
{
    let mut loaded = 0;
    for name in source.read_names()? {
        if loaded >= max_reads {
            break;
        }
        let group = source.read_group(&name)?;
        let read = decode_read(&group, filename)?;
        sink.accept(read);
        loaded += 1;
    }
    Ok(loaded)
}

/// Open `path` and load its reads.
#[cfg(feature = "hdf5")]
pub(crate) fn load_fast5_file<K: ReadSink + ?Sized>(
    path: &std::path::Path,
    filename: &str,
    max_reads: usize,
    sink: &mut K,
) -> Result<usize, Fast5Error> {
    let file = Hdf5File::open(path)?;
    load_reads(&file, filename, max_reads, sink)
}

#[cfg(not(feature = "hdf5"))]
pub(crate) fn load_fast5_file<K: ReadSink + ?Sized>(
    _path: &std::path::Path,
    _filename: &str,
    _max_reads: usize,
    _sink: &mut K,
) -> Result<usize, Fast5Error> {
    Err(Fast5Error::Unsupported)
}

pub(crate) fn decode_read<G: Fast5Group>(read: &G, filename: &str) -> Result<Read, Fast5Error> {
    let channel_id = read.group("channel_id")?;
    let digitisation = channel_id.attribute("digitisation")?.to_f32("digitisation")?;
    let range = channel_id.attribute("range")?.to_f32("range")?;
    let offset = channel_id.attribute("offset")?.to_f32("offset")?;
    let sampling_rate = channel_id
        .attribute("sampling_rate")?
        .to_f32("sampling_rate")?;
    let channel_number = channel_id
        .attribute("channel_number")?
        .to_channel_number("channel_number")?;
    if sampling_rate.is_nan() || sampling_rate <= 0.0 {
        return Err(Fast5Error::InvalidSampleRate(sampling_rate));
    }

    let raw = read.group("Raw")?;
    let signal = raw.dataset_info("Signal")?;
    if signal.element_type != ElementType::Int16 {
        return Err(Fast5Error::InvalidSignalType(signal.element_type.to_string()));
    }
    let mut raw_data = vec![0i16; signal.len];
    raw.read_i16("Signal", &mut raw_data)?;

    let mux = raw.attribute("start_mux")?.to_u32("start_mux")?;
    let read_number = raw.attribute("read_number")?.to_u32("read_number")?;
    let start_time = raw.attribute("start_time")?.to_u64("start_time")?;
    let read_id = raw.attribute("read_id")?.to_string_value("read_id")?;

    let tracking_id = read.group("tracking_id")?;
    let exp_start_time = tracking_id
        .attribute("exp_start_time")?
        .to_string_value("exp_start_time")?;
    let offset_seconds = (start_time as f64 / sampling_rate as f64).floor() as u64;
    let start_time = adjust_time(&exp_start_time, offset_seconds)?;

    Ok(Read {
        raw_data,
        sample_rate: sampling_rate,
        scaling: range / digitisation,
        offset,
        digitisation: Some(digitisation),
        range: Some(range),
        read_id,
        num_trimmed_samples: 0,
        attributes: ReadAttributes {
            read_number,
            channel_number,
            mux,
            start_time,
            filename: filename.to_string(),
        },
    })
}
