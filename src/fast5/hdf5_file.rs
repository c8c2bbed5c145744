//! FAST5 access through the HDF5 library.
use std::path::Path;

use hdf5::{
    types::{FixedAscii, FixedUnicode, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode},
    Attribute, File, Group,
};

use super::{AttributeValue, DatasetInfo, ElementType, Fast5Group, Fast5Source};
use crate::error::Fast5Error;

/// Landing buffer size for fixed-length string attributes.
const FIXED_STRING_CAPACITY: usize = 1024;

pub struct Hdf5File {
    file: File,
}

impl Hdf5File {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Fast5Error> {
        Ok(Self {
            file: File::open(path)?,
        })
    }
}

impl Fast5Source for Hdf5File {
    type Group = Hdf5Group;

    fn read_names(&self) -> Result<Vec<String>, Fast5Error> {
        Ok(self.file.member_names()?)
    }

    fn read_group(&self, name: &str) -> Result<Hdf5Group, Fast5Error> {
        Hdf5Group(self.file.as_group()?).group(name)
    }
}

pub struct Hdf5Group(Group);

impl Fast5Group for Hdf5Group {
    fn group(&self, name: &str) -> Result<Self, Fast5Error> {
        if !self.0.link_exists(name) {
            return Err(Fast5Error::MissingGroup(name.to_string()));
        }
        Ok(Self(self.0.group(name)?))
    }

    fn attribute(&self, name: &str) -> Result<AttributeValue, Fast5Error> {
        if !self.0.attr_names()?.iter().any(|n| n == name) {
            return Err(Fast5Error::MissingAttribute(name.to_string()));
        }
        read_attribute(name, &self.0.attr(name)?)
    }

    fn dataset_info(&self, name: &str) -> Result<DatasetInfo, Fast5Error> {
        if !self.0.link_exists(name) {
            return Err(Fast5Error::MissingGroup(name.to_string()));
        }
        let dataset = self.0.dataset(name)?;
        let element_type = match dataset.dtype()?.to_descriptor()? {
            TypeDescriptor::Integer(IntSize::U2) => ElementType::Int16,
            other => ElementType::Other(other.to_string()),
        };
        Ok(DatasetInfo {
            element_type,
            len: dataset.size(),
        })
    }

    fn read_i16(&self, name: &str, out: &mut [i16]) -> Result<(), Fast5Error> {
        let data = self.0.dataset(name)?.read_raw::<i16>()?;
        if data.len() != out.len() {
            return Err(Fast5Error::SignalLength {
                expected: out.len(),
                found: data.len(),
            });
        }
        out.copy_from_slice(&data);
        Ok(())
    }
}

fn read_attribute(name: &str, attr: &Attribute) -> Result<AttributeValue, Fast5Error> {
    let value = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) => AttributeValue::Int(attr.read_scalar::<i64>()?),
        TypeDescriptor::Unsigned(_) => AttributeValue::UInt(attr.read_scalar::<u64>()?),
        TypeDescriptor::Float(_) => AttributeValue::Float(attr.read_scalar::<f64>()?),
        TypeDescriptor::VarLenAscii => {
            AttributeValue::VarLenString(attr.read_scalar::<VarLenAscii>()?.as_str().to_string())
        }
        TypeDescriptor::VarLenUnicode => AttributeValue::VarLenString(
            attr.read_scalar::<VarLenUnicode>()?.as_str().to_string(),
        ),
        TypeDescriptor::FixedAscii(_) => AttributeValue::FixedString(
            attr.read_scalar::<FixedAscii<FIXED_STRING_CAPACITY>>()?
                .as_bytes()
                .to_vec(),
        ),
        TypeDescriptor::FixedUnicode(_) => AttributeValue::FixedString(
            attr.read_scalar::<FixedUnicode<FIXED_STRING_CAPACITY>>()?
                .as_bytes()
                .to_vec(),
        ),
        _ => {
            return Err(Fast5Error::AttributeType {
                name: name.to_string(),
                expected: "number or string",
                found: "compound",
            })
        }
    };
    Ok(value)
}
