use crate::error::LoaderError;

/// Settings a [`DataLoader`](crate::DataLoader) is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Worker threads used to decode rows of a POD5 read batch.
    pub num_worker_threads: usize,
    /// Device the downstream pipeline runs on. Carried, not used for loading.
    pub device: String,
    /// Stop after this many reads, 0 for no limit.
    pub max_reads: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            num_worker_threads: num_cpus::get(),
            device: "cpu".to_string(),
            max_reads: 0,
        }
    }
}

impl LoaderConfig {
    pub fn new(num_worker_threads: usize) -> Self {
        Self {
            num_worker_threads,
            ..Default::default()
        }
    }

    pub fn with_device<S: Into<String>>(mut self, device: S) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_max_reads(mut self, max_reads: usize) -> Self {
        self.max_reads = max_reads;
        self
    }

    pub fn validate(&self) -> Result<(), LoaderError> {
        if self.num_worker_threads == 0 {
            return Err(LoaderError::InvalidConfig(
                "num_worker_threads must be greater than zero",
            ));
        }
        Ok(())
    }

    /// The read budget with 0 mapped to unbounded.
    pub(crate) fn read_limit(&self) -> usize {
        if self.max_reads == 0 {
            usize::MAX
        } else {
            self.max_reads
        }
    }
}
