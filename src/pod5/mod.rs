//! Loading reads from POD5 files.
//!
//! POD5 stores reads in batches. Every row of a batch is decoded on the worker
//! pool, and a batch is fully decoded before its reads are handed on in row
//! order. Only one batch worth of signal is alive at a time.
//!
//! Decoding a row is lenient: if the row metadata, run info or signal can't
//! be fetched the failure is logged and the read is still produced with the
//! affected fields left zeroed.
use std::path::Path;

use rayon::{prelude::*, ThreadPool};
use uuid::Uuid;

use crate::{
    error::Pod5Error,
    read::{Read, ReadAttributes},
    sink::ReadSink,
    timestamp::{format_epoch_ms, start_time_ms},
};

mod extract;
#[cfg(test)]
pub(crate) mod fixture;
mod reader;

pub use reader::{Pod5File, ReadBatch};

/// Metadata for one row of the reads table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadRowInfo {
    /// Read id in its packed 16-byte form.
    pub read_id: [u8; 16],
    pub channel: u16,
    pub well: u8,
    pub read_number: u32,
    /// Sample offset of the read from the start of the acquisition.
    pub start_sample: u64,
    pub calibration_offset: f32,
    pub calibration_scale: f32,
    pub num_samples: u64,
    /// Acquisition id used to find the run info.
    pub run_info: String,
}

/// Per-acquisition metadata from the run info table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub acquisition_id: String,
    pub acquisition_start_time_ms: i64,
    pub sample_rate: u16,
}

/// What the loader needs from an opened POD5 file.
///
/// Row level methods take `&self` and are called concurrently from the
/// worker pool.
pub trait Pod5Source: Sync {
    type Batch: Sync;

    fn batch_count(&self) -> usize;

    fn read_batch(&mut self, index: usize) -> Result<Self::Batch, Pod5Error>;

    fn batch_row_count(&self, batch: &Self::Batch) -> usize;

    fn row_info(&self, batch: &Self::Batch, row: usize) -> Result<ReadRowInfo, Pod5Error>;

    fn run_info(&self, batch: &Self::Batch, acquisition_id: &str) -> Result<RunInfo, Pod5Error>;

    /// Fill `out` with the complete signal of `row`. `out` must be exactly as
    /// long as the read.
    fn read_signal(&self, batch: &Self::Batch, row: usize, out: &mut [i16])
        -> Result<(), Pod5Error>;
}

/// Open `path` and load up to `max_reads` of its reads. The file is closed
/// before returning.
pub(crate) fn load_pod5_file<K: ReadSink + ?Sized>(
    path: &Path,
    filename: &str,
    pool: &ThreadPool,
    max_reads: usize,
    sink: &mut K,
) -> Result<usize, Pod5Error> {
    let mut file = Pod5File::open(path)?;
    Ok(load_reads(&mut file, filename, pool, max_reads, sink))
}

/// Decode up to `max_reads` reads from `source` into `sink`, returning how
/// many were handed over.
pub(crate) fn load_reads<S, K>(
    source: &mut S,
    filename: &str,
    pool: &ThreadPool,
    max_reads: usize,
    sink: &mut K,
) -> usize
where
    S: Pod5Source,
    K: ReadSink + ?Sized,
{
    let mut loaded = 0;
    let batch_count = source.batch_count();
    log::debug!("{filename}: {batch_count} read batches");

    for batch_index in 0..batch_count {
        if loaded >= max_reads {
            break;
        }
        let batch = match source.read_batch(batch_index) {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("Failed to get batch {batch_index} of {filename}: {e}");
                continue;
            }
        };
        let row_count = source.batch_row_count(&batch).min(max_reads - loaded);

        let source = &*source;
        let batch = &batch;
        let reads: Vec<Read> = pool.install(|| {
            (0..row_count)
                .into_par_iter()
                .map(|row| process_read(source, batch, row, filename))
                .collect()
        });

        for read in reads {
            sink.accept(read);
            loaded += 1;
        }
    }
    loaded
}

fn process_read<S: Pod5Source>(source: &S, batch: &S::Batch, row: usize, filename: &str) -> Read {
    let row_info = source.row_info(batch, row).unwrap_or_else(|e| {
        log::error!("Failed to get read {row} of {filename}: {e}");
        ReadRowInfo::default()
    });

    let run_info = source
        .run_info(batch, &row_info.run_info)
        .unwrap_or_else(|e| {
            log::error!("Failed to get run info for read {row} of {filename}: {e}");
            RunInfo::default()
        });

    let read_id = Uuid::from_bytes(row_info.read_id).hyphenated().to_string();

    let raw_data = match signal_buffer(row_info.num_samples) {
        Some(mut raw_data) => {
            if let Err(e) = source.read_signal(batch, row, &mut raw_data) {
                log::error!("Failed to get read {row} signal: {e}");
                raw_data.fill(0);
            }
            raw_data
        }
        None => {
            log::error!(
                "Failed to get read {row} signal: cannot allocate {} samples",
                row_info.num_samples
            );
            Vec::new()
        }
    };

    let start_time = start_time_ms(
        run_info.acquisition_start_time_ms,
        row_info.start_sample,
        run_info.sample_rate,
    )
    .unwrap_or_else(|| {
        log::warn!("Read {read_id} has no usable sample rate, using the acquisition start time");
        run_info.acquisition_start_time_ms
    });
    let start_time = format_epoch_ms(start_time).unwrap_or_else(|| {
        log::warn!("Read {read_id} start time {start_time}ms is out of range");
        String::new()
    });

    Read {
        raw_data,
        sample_rate: run_info.sample_rate as f32,
        scaling: row_info.calibration_scale,
        offset: row_info.calibration_offset,
        digitisation: None,
        range: None,
        read_id,
        num_trimmed_samples: 0,
        attributes: ReadAttributes {
            read_number: row_info.read_number,
            channel_number: row_info.channel as i32,
            mux: row_info.well as u32,
            start_time,
            filename: filename.to_string(),
        },
    }
}

/// A zeroed landing buffer for `num_samples` samples, or `None` if a corrupt
/// sample count asks for more than can be allocated.
fn signal_buffer(num_samples: u64) -> Option<Vec<i16>> {
    let len = usize::try_from(num_samples).ok()?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, 0);
    Some(buf)
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashMap,
        thread,
        time::Duration,
    };

    use pretty_assertions::assert_eq;
    use rayon::ThreadPoolBuilder;

    use super::*;
    use crate::sink::RecordingSink;

    /// Rows are `(row info, signal)`; a `None` row fails its metadata fetch.
    struct MemorySource {
        batches: Vec<Vec<Option<(ReadRowInfo, Vec<i16>)>>>,
        run_infos: HashMap<String, RunInfo>,
        broken_signal: Vec<(usize, usize)>,
    }

    struct MemoryBatch {
        index: usize,
        rows: Vec<Option<(ReadRowInfo, Vec<i16>)>>,
    }

    impl Pod5Source for MemorySource {
        type Batch = MemoryBatch;

        fn batch_count(&self) -> usize {
            self.batches.len()
        }

        fn read_batch(&mut self, index: usize) -> Result<Self::Batch, Pod5Error> {
            Ok(MemoryBatch {
                index,
                rows: self.batches[index].clone(),
            })
        }

        fn batch_row_count(&self, batch: &Self::Batch) -> usize {
            batch.rows.len()
        }

        fn row_info(&self, batch: &Self::Batch, row: usize) -> Result<ReadRowInfo, Pod5Error> {
            // Make later rows finish first.
            thread::sleep(Duration::from_millis(((batch.rows.len() - row) * 2) as u64));
            batch.rows[row]
                .as_ref()
                .map(|(info, _)| info.clone())
                .ok_or(Pod5Error::NullValue {
                    column: "read_id",
                    row,
                })
        }

        fn run_info(&self, _: &Self::Batch, acquisition_id: &str) -> Result<RunInfo, Pod5Error> {
            self.run_infos
                .get(acquisition_id)
                .cloned()
                .ok_or_else(|| Pod5Error::UnknownRunInfo(acquisition_id.to_string()))
        }

        fn read_signal(
            &self,
            batch: &Self::Batch,
            row: usize,
            out: &mut [i16],
        ) -> Result<(), Pod5Error> {
            if self.broken_signal.contains(&(batch.index, row)) {
                out[0] = 99;
                return Err(Pod5Error::SignalRowOutOfRange(row as u64));
            }
            let (_, signal) = batch.rows[row].as_ref().ok_or(Pod5Error::NullValue {
                column: "signal",
                row,
            })?;
            if signal.len() != out.len() {
                return Err(Pod5Error::SignalLength {
                    expected: out.len(),
                    found: signal.len(),
                });
            }
            out.copy_from_slice(signal);
            Ok(())
        }
    }

    fn row(read_number: u32, samples: usize) -> Option<(ReadRowInfo, Vec<i16>)> {
        let mut read_id = [0u8; 16];
        read_id[15] = read_number as u8;
        let info = ReadRowInfo {
            read_id,
            channel: 5,
            well: 2,
            read_number,
            start_sample: 8000,
            calibration_offset: -3.0,
            calibration_scale: 0.25,
            num_samples: samples as u64,
            run_info: "acq".to_string(),
        };
        let signal = (0..samples as i16).collect();
        Some((info, signal))
    }

    fn source(batches: Vec<Vec<Option<(ReadRowInfo, Vec<i16>)>>>) -> MemorySource {
        let run_info = RunInfo {
            acquisition_id: "acq".to_string(),
            acquisition_start_time_ms: 1_000_000,
            sample_rate: 4000,
        };
        MemorySource {
            batches,
            run_infos: HashMap::from([("acq".to_string(), run_info)]),
            broken_signal: Vec::new(),
        }
    }

    fn pool() -> ThreadPool {
        ThreadPoolBuilder::new().num_threads(4).build().unwrap()
    }

    #[test]
    fn test_rows_emitted_in_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut source = source(vec![
            (0..8).map(|i| row(i, 10 + i as usize)).collect(),
            (8..12).map(|i| row(i, 10)).collect(),
        ]);
        let mut sink = RecordingSink::default();
        let loaded = load_reads(&mut source, "a.pod5", &pool(), usize::MAX, &mut sink);

        assert_eq!(loaded, 12);
        let numbers = sink
            .reads
            .iter()
            .map(|r| r.attributes.read_number)
            .collect::<Vec<_>>();
        assert_eq!(numbers, (0..12).collect::<Vec<_>>());
        assert_eq!(sink.terminations, 0);
    }

    #[test]
    fn test_read_fields() {
        let mut source = source(vec![vec![row(1, 6)]]);
        let mut sink = RecordingSink::default();
        load_reads(&mut source, "a.pod5", &pool(), usize::MAX, &mut sink);

        let read = &sink.reads[0];
        assert_eq!(read.read_id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(read.read_id.len(), 36);
        assert_eq!(read.raw_data, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(read.sample_rate, 4000.0);
        assert_eq!(read.scaling, 0.25);
        assert_eq!(read.offset, -3.0);
        assert_eq!(read.digitisation, None);
        assert_eq!(read.num_trimmed_samples, 0);
        assert_eq!(
            read.attributes,
            ReadAttributes {
                read_number: 1,
                channel_number: 5,
                mux: 2,
                start_time: "1970-01-01T00:16:42.000+00:00".to_string(),
                filename: "a.pod5".to_string(),
            }
        );
    }

    #[test]
    fn test_budget_clamps_rows() {
        let mut source = source(vec![
            (0..4).map(|i| row(i, 4)).collect(),
            (4..8).map(|i| row(i, 4)).collect(),
        ]);
        let mut sink = RecordingSink::default();
        let loaded = load_reads(&mut source, "a.pod5", &pool(), 6, &mut sink);
        assert_eq!(loaded, 6);
        assert_eq!(sink.reads.len(), 6);
        assert_eq!(sink.reads[5].attributes.read_number, 5);
    }

    #[test]
    fn test_zero_budget() {
        let mut source = source(vec![(0..4).map(|i| row(i, 4)).collect()]);
        let mut sink = RecordingSink::default();
        assert_eq!(load_reads(&mut source, "a.pod5", &pool(), 0, &mut sink), 0);
        assert!(sink.reads.is_empty());
    }

    #[test]
    fn test_failed_row_still_emitted() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut source = source(vec![vec![row(0, 4), None, row(2, 4)]]);
        let mut sink = RecordingSink::default();
        let loaded = load_reads(&mut source, "a.pod5", &pool(), usize::MAX, &mut sink);

        assert_eq!(loaded, 3);
        let broken = &sink.reads[1];
        assert_eq!(broken.read_id, "00000000-0000-0000-0000-000000000000");
        assert!(broken.raw_data.is_empty());
        assert_eq!(broken.sample_rate, 0.0);
        assert_eq!(broken.attributes.start_time, "1970-01-01T00:00:00.000+00:00");
        assert_eq!(sink.reads[2].attributes.read_number, 2);
    }

    #[test]
    fn test_failed_signal_is_zeroed() {
        let mut source = source(vec![vec![row(0, 4), row(1, 4)]]);
        source.broken_signal.push((0, 1));
        let mut sink = RecordingSink::default();
        load_reads(&mut source, "a.pod5", &pool(), usize::MAX, &mut sink);

        assert_eq!(sink.reads[0].raw_data, vec![0, 1, 2, 3]);
        assert_eq!(sink.reads[1].raw_data, vec![0, 0, 0, 0]);
        assert_eq!(sink.reads[1].raw_data.len(), 4);
    }

    #[test]
    fn test_oversized_sample_count() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rows = vec![row(0, 4), row(1, 4), row(2, 4)];
        if let Some((info, _)) = rows[1].as_mut() {
            info.num_samples = u64::MAX / 2;
        }
        let mut source = source(vec![rows]);
        let mut sink = RecordingSink::default();
        let loaded = load_reads(&mut source, "a.pod5", &pool(), usize::MAX, &mut sink);

        assert_eq!(loaded, 3);
        let corrupt = &sink.reads[1];
        assert!(corrupt.raw_data.is_empty());
        assert_eq!(corrupt.attributes.read_number, 1);
        assert_eq!(corrupt.read_id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(sink.reads[2].raw_data, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_signal_buffer() {
        assert_eq!(signal_buffer(3), Some(vec![0, 0, 0]));
        assert_eq!(signal_buffer(0), Some(Vec::new()));
        assert_eq!(signal_buffer(u64::MAX), None);
    }

    #[test]
    fn test_unknown_run_info() {
        let mut source = source(vec![vec![row(0, 4)]]);
        source.run_infos.clear();
        let mut sink = RecordingSink::default();
        load_reads(&mut source, "a.pod5", &pool(), usize::MAX, &mut sink);

        let read = &sink.reads[0];
        assert_eq!(read.sample_rate, 0.0);
        assert_eq!(read.raw_data.len(), 4);
        assert_eq!(read.attributes.start_time, "1970-01-01T00:00:00.000+00:00");
    }
}
