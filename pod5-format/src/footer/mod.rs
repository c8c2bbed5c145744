use std::io::{self, Read, Seek, SeekFrom};

use flatbuffers::root;
use footer_generated::minknow::reads_format::{
    ContentType, EmbeddedFile, EmbeddedFileArgs, Footer, FooterArgs,
};

use crate::{error::FooterError, FormatError, FILE_SIGNATURE, SECTION_MARKER_LEN};

#[allow(warnings)] // Ignore warnings from generated file.
pub mod footer_generated;

pub const FOOTER_MAGIC: [u8; 8] = [b'F', b'O', b'O', b'T', b'E', b'R', 0x000, 0x000];

/// Contains information about the location, size, and type of a POD5 Table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    offset: i64,
    length: i64,
    content_type: ContentType,
}

impl TableInfo {
    pub fn new(offset: i64, length: i64, content_type: ContentType) -> Self {
        Self {
            offset,
            length,
            content_type,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Copy the table out of the container.
    pub fn read_bytes<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<u8>, io::Error> {
        let offset = u64::try_from(self.offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative table offset"))?;
        let length = u64::try_from(self.length)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "negative table length"))?;
        let file_size = reader.seek(SeekFrom::End(0))?;
        if offset.checked_add(length).map_or(true, |end| end > file_size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("table at {offset} of length {length} runs past end of file ({file_size})"),
            ));
        }
        let mut buf = vec![0u8; length as usize];
        reader.seek(SeekFrom::Start(offset))?;
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub struct ParsedFooter {
    data: Vec<u8>,
}

impl ParsedFooter {
    /// Parse a POD5 Flatbuffer footer from a reader containg data from a POD5
    /// file.
    ///
    /// The end of a file is laid out as:
    /// ```text
    /// <footer> <footer length: i64 LE> <section marker> <signature>
    /// ```
    pub fn read_footer<R: Read + Seek>(mut reader: R) -> Result<Self, FormatError> {
        let trailer = (FILE_SIGNATURE.len() + SECTION_MARKER_LEN + 8) as i64;
        let file_size = reader
            .seek(SeekFrom::End(0))
            .map_err(FooterError::FooterIOError)?;
        reader
            .seek(SeekFrom::End(-trailer))
            .map_err(FooterError::FooterIOError)?;
        let mut buf = [0; 8];
        reader
            .read_exact(&mut buf)
            .map_err(FooterError::FooterIOError)?;
        let flen = i64::from_le_bytes(buf);
        if flen <= 0 || flen.checked_add(trailer).map_or(true, |end| end as u64 > file_size) {
            return Err(FooterError::InvalidLength(flen).into());
        }
        reader
            .seek(SeekFrom::End(-trailer - flen))
            .map_err(FooterError::FooterIOError)?;
        let mut buf = vec![0u8; flen as usize];
        reader
            .read_exact(&mut buf)
            .map_err(FooterError::FooterIOError)?;
        Ok(Self { data: buf })
    }

    pub fn footer(&self) -> Result<Footer<'_>, FooterError> {
        Ok(root::<Footer>(&self.data)?)
    }

    fn find_table(
        &self,
        content_type: ContentType,
        err: FooterError,
    ) -> Result<TableInfo, FormatError> {
        let footer = self.footer()?;
        let contents = footer.contents().ok_or(FooterError::ContentsMissing)?;
        let efile = contents
            .iter()
            .find(|c| c.content_type() == content_type)
            .ok_or(err)?;

        Ok(TableInfo {
            offset: efile.offset(),
            length: efile.length(),
            content_type,
        })
    }

    pub fn read_table(&self) -> Result<TableInfo, FormatError> {
        self.find_table(ContentType::ReadsTable, FooterError::ReadTableMissing)
    }

    pub fn signal_table(&self) -> Result<TableInfo, FormatError> {
        self.find_table(ContentType::SignalTable, FooterError::SignalTableMissing)
    }

    pub fn run_info_table(&self) -> Result<TableInfo, FormatError> {
        self.find_table(ContentType::RunInfoTable, FooterError::RunInfoTableMissing)
    }
}

/// Build a new POD5 FlatBuffer's footer, useful for writing new POD5 files.
pub struct FooterBuilder {
    file_identifier: String,
    software: String,
    version: String,
}

impl FooterBuilder {
    pub fn new(file_identifier: String, software: String, version: String) -> Self {
        Self {
            file_identifier,
            software,
            version,
        }
    }

    /// Convert the builder and list of tables into the corresponding flatbuffer
    /// footer bytes.
    pub fn build_footer(&self, tables: &[TableInfo]) -> Vec<u8> {
        let mut builder = flatbuffers::FlatBufferBuilder::new();
        let mut etables = Vec::with_capacity(tables.len());
        for table in tables {
            let efile_args = EmbeddedFileArgs {
                offset: table.offset,
                length: table.length,
                content_type: table.content_type,
                ..Default::default()
            };
            let efile = EmbeddedFile::create(&mut builder, &efile_args);
            etables.push(efile);
        }
        let contents = Some(builder.create_vector(&etables));

        let file_identifier = Some(builder.create_string(&self.file_identifier));
        let software = Some(builder.create_string(&self.software));
        let pod5_version = Some(builder.create_string(&self.version));

        let fbtable = Footer::create(
            &mut builder,
            &FooterArgs {
                file_identifier,
                software,
                pod5_version,
                contents,
            },
        );

        builder.finish_minimal(fbtable);
        builder.finished_data().to_vec()
    }
}
