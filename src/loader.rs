//! Walking a directory of read files.
use std::{
    ffi::OsStr,
    fs,
    path::Path,
};

use rayon::ThreadPoolBuilder;

use crate::{
    backend, config::LoaderConfig, error::LoaderError, fast5, pod5, read::Read, sink::ReadSink,
};

/// Container formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pod5,
    Fast5,
}

impl FileFormat {
    /// Case-insensitive match on the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(OsStr::to_str)?;
        match extension.to_ascii_lowercase().as_str() {
            "pod5" => Some(Self::Pod5),
            "fast5" => Some(Self::Fast5),
            _ => None,
        }
    }
}

/// Loads every POD5 and FAST5 file in a directory into a [`ReadSink`].
///
/// Files are visited in the order the directory yields them. A file that
/// fails to decode is logged and skipped. The sink is terminated once at the
/// end of [`DataLoader::load_reads`], whether or not anything was loaded.
pub struct DataLoader<S> {
    sink: S,
    config: LoaderConfig,
    loaded_reads: usize,
}

impl<S: ReadSink> DataLoader<S> {
    pub fn new(sink: S, config: LoaderConfig) -> Result<Self, LoaderError> {
        config.validate()?;
        backend::initialize();
        Ok(Self {
            sink,
            config,
            loaded_reads: 0,
        })
    }

    pub fn device(&self) -> &str {
        &self.config.device
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Reads handed to the sink so far.
    pub fn loaded_reads(&self) -> usize {
        self.loaded_reads
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Load reads from every recognised file directly inside `path`, then
    /// terminate the sink. Returns the number of reads loaded by this call.
    pub fn load_reads<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, LoaderError> {
        let path = path.as_ref();
        if !path.exists() {
            log::error!("Requested input path {} does not exist!", path.display());
            self.sink.terminate();
            return Err(LoaderError::InputPathMissing(path.to_path_buf()));
        }
        if !path.is_dir() {
            log::error!("Requested input path {} is not a directory!", path.display());
            self.sink.terminate();
            return Err(LoaderError::NotADirectory(path.to_path_buf()));
        }

        let before = self.loaded_reads;
        let res = self.load_directory(path);
        self.sink.terminate();
        let loaded = self.loaded_reads - before;
        log::info!("Loaded {loaded} reads from {}", path.display());
        res.map(|_| loaded)
    }

    fn load_directory(&mut self, path: &Path) -> Result<(), LoaderError> {
        let max_reads = self.config.read_limit();
        for entry in fs::read_dir(path)? {
            if self.loaded_reads >= max_reads {
                log::debug!("Read limit of {max_reads} reached");
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::error!("Failed to read entry of {}: {e}", path.display());
                    continue;
                }
            };
            let file_path = entry.path();
            let Some(format) = FileFormat::from_path(&file_path) else {
                continue;
            };
            if let Err(e) = self.load_file(&file_path, format, max_reads - self.loaded_reads) {
                log::error!("Failed to load {}: {e}", file_path.display());
            }
        }
        Ok(())
    }

    fn load_file(
        &mut self,
        path: &Path,
        format: FileFormat,
        remaining: usize,
    ) -> Result<(), LoaderError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::debug!("Loading {format:?} file {}", path.display());

        let mut sink = CountingSink {
            inner: &mut self.sink,
            accepted: 0,
        };
        let res = match format {
            FileFormat::Pod5 => ThreadPoolBuilder::new()
                .num_threads(self.config.num_worker_threads)
                .thread_name(|i| format!("pod5-decode-{i}"))
                .build()
                .map_err(LoaderError::from)
                .and_then(|pool| {
                    pod5::load_pod5_file(path, &filename, &pool, remaining, &mut sink)
                        .map_err(LoaderError::from)
                }),
            FileFormat::Fast5 => fast5::load_fast5_file(path, &filename, remaining, &mut sink)
                .map_err(LoaderError::from),
        };
        self.loaded_reads += sink.accepted;
        log::debug!("Loaded {} reads from {filename}", sink.accepted);
        res.map(|_| ())
    }
}

/// Counts reads on their way to the real sink, so reads handed over before a
/// file fails are still counted.
struct CountingSink<'a, S: ?Sized> {
    inner: &'a mut S,
    accepted: usize,
}

impl<S: ReadSink + ?Sized> ReadSink for CountingSink<'_, S> {
    fn accept(&mut self, read: Read) {
        self.accepted += 1;
        self.inner.accept(read);
    }

    fn terminate(&mut self) {
        self.inner.terminate();
    }
}
