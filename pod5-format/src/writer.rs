//! Writing POD5 containers
//!
//! Lays already-serialized Arrow IPC tables out between section markers and
//! finishes the file with the footer and trailing signature.
use std::io::{Seek, Write};

use uuid::Uuid;

use crate::{
    footer::{FooterBuilder, TableInfo, FOOTER_MAGIC},
    ContentType, FormatError, FILE_SIGNATURE,
};

const SOFTWARE: &str = "read-loader";
const POD5_VERSION: &str = "0.3.10";

pub struct ContainerWriter<W>
where
    W: Write + Seek,
{
    position: u64,
    writer: W,
    section_marker: Uuid,
    file_identifier: Uuid,
    tables: Vec<TableInfo>,
}

impl<W: Write + Seek> ContainerWriter<W> {
    /// Rewind the writer and write the signature and first section marker.
    pub fn new(mut writer: W) -> Result<Self, FormatError> {
        writer.rewind()?;
        let mut w = Self {
            position: 0,
            writer,
            section_marker: Uuid::new_v4(),
            file_identifier: Uuid::new_v4(),
            tables: Vec::new(),
        };
        w.writer.write_all(&FILE_SIGNATURE)?;
        w.write_section_marker()?;
        w.position = w.writer.stream_position()?;
        Ok(w)
    }

    fn write_section_marker(&mut self) -> Result<(), FormatError> {
        self.writer.write_all(self.section_marker.as_bytes())?;
        Ok(())
    }

    /// Append one table, padded to an 8-byte boundary and closed by a section
    /// marker.
    pub fn write_table(&mut self, table: &[u8], content_type: ContentType) -> Result<(), FormatError> {
        self.writer.write_all(table)?;
        let end = self.writer.stream_position()?;
        let padding = (8 - (end % 8)) % 8;
        self.writer.write_all(&vec![0u8; padding as usize])?;
        self.write_section_marker()?;
        self.tables.push(TableInfo::new(
            self.position as i64,
            table.len() as i64,
            content_type,
        ));
        self.position = self.writer.stream_position()?;
        Ok(())
    }

    /// Write the footer magic, footer, footer length, and trailing signature,
    /// returning the underlying writer.
    pub fn finish(mut self) -> Result<W, FormatError> {
        self.writer.write_all(&FOOTER_MAGIC)?;
        let footer = FooterBuilder::new(
            self.file_identifier.to_string(),
            SOFTWARE.to_string(),
            POD5_VERSION.to_string(),
        )
        .build_footer(&self.tables);
        self.writer.write_all(&footer)?;
        self.writer.write_all(&(footer.len() as i64).to_le_bytes())?;
        self.write_section_marker()?;
        self.writer.write_all(&FILE_SIGNATURE)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}
