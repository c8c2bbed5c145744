//! POD5 container layer.
//!
//! A POD5 file is a thin container around several Arrow IPC files (the
//! tables). This crate handles everything outside of the tables: the file
//! signature, section markers, and the FlatBuffers footer that records where
//! each table lives. Reading the tables themselves is left to an Arrow
//! implementation.
mod error;
pub mod footer;
mod writer;

use std::io::{Read, Seek, SeekFrom};

pub use error::{FooterError, FormatError};
pub use footer::{footer_generated, FooterBuilder, ParsedFooter, TableInfo, FOOTER_MAGIC};
pub use footer_generated::minknow::reads_format::ContentType;
pub use writer::ContainerWriter;

pub const FILE_SIGNATURE: [u8; 8] = [0x8b, b'P', b'O', b'D', b'\r', b'\n', 0x1a, b'\n'];

/// Section markers are a random UUID repeated between every section of a file.
pub const SECTION_MARKER_LEN: usize = 16;

pub fn valid_signature<R>(mut reader: R) -> Result<bool, std::io::Error>
where
    R: Read,
{
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(buf == FILE_SIGNATURE)
}

/// An opened POD5 container with a parsed footer.
pub struct Container<R> {
    reader: R,
    footer: ParsedFooter,
}

impl<R> Container<R>
where
    R: Read + Seek,
{
    /// Check the signatures at both ends of the file and parse the footer.
    pub fn from_reader(mut reader: R) -> Result<Self, FormatError> {
        reader.rewind()?;
        if !valid_signature(&mut reader)? {
            return Err(FormatError::SignatureFailure("Start"));
        }
        reader.seek(SeekFrom::End(-(FILE_SIGNATURE.len() as i64)))?;
        if !valid_signature(&mut reader)? {
            return Err(FormatError::SignatureFailure("End"));
        }
        let footer = ParsedFooter::read_footer(&mut reader)?;
        Ok(Self { reader, footer })
    }

    pub fn footer(&self) -> &ParsedFooter {
        &self.footer
    }

    /// Raw Arrow IPC bytes of the Reads table.
    pub fn read_table_bytes(&mut self) -> Result<Vec<u8>, FormatError> {
        let table = self.footer.read_table()?;
        Ok(table.read_bytes(&mut self.reader)?)
    }

    /// Raw Arrow IPC bytes of the Signal table.
    pub fn signal_table_bytes(&mut self) -> Result<Vec<u8>, FormatError> {
        let table = self.footer.signal_table()?;
        Ok(table.read_bytes(&mut self.reader)?)
    }

    /// Raw Arrow IPC bytes of the Run Info table.
    pub fn run_info_table_bytes(&mut self) -> Result<Vec<u8>, FormatError> {
        let table = self.footer.run_info_table()?;
        Ok(table.read_bytes(&mut self.reader)?)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
