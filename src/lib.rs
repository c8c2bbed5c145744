//! Load raw nanopore reads from a directory of POD5 and FAST5 files.
//!
//! A [`DataLoader`] walks a directory, decodes every `.pod5` and `.fast5` file
//! it finds into [`Read`]s, and hands them to a [`ReadSink`]. POD5 read
//! batches are decoded on a worker pool; FAST5 files are decoded on the
//! calling thread. FAST5 support needs the `hdf5` feature.
pub mod backend;
pub mod config;
pub mod error;
pub mod fast5;
pub mod loader;
pub mod pod5;
pub mod read;
pub mod sink;
mod timestamp;

pub use config::LoaderConfig;
pub use error::{Fast5Error, LoaderError, Pod5Error};
pub use loader::{DataLoader, FileFormat};
pub use read::{Read, ReadAttributes};
pub use sink::{ChannelSink, ReadSink};

#[cfg(doctest)]
doc_comment::doctest!("../README.md", readme);
