//! Arrow backed access to the three POD5 tables.
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    num::NonZeroUsize,
    path::Path,
    sync::{Mutex, PoisonError},
};

use arrow::{
    array::{
        Array, DictionaryArray, FixedSizeBinaryArray, Float32Array, Int16Array, LargeBinaryArray,
        LargeListArray, ListArray, RecordBatch, StringArray, TimestampMillisecondArray,
        UInt16Array, UInt32Array, UInt64Array, UInt8Array,
    },
    datatypes::{DataType, Int16Type},
    ipc::reader::FileReader,
};
use lru::LruCache;
use pod5_format::Container;

use super::{
    extract::{column, optional_column, ArrowExtract},
    Pod5Source, ReadRowInfo, RunInfo,
};
use crate::error::Pod5Error;

const READS: &str = "reads";
const SIGNAL: &str = "signal";
const RUN_INFO: &str = "run info";

/// Decoded signal batches kept around for reads that span batches or for
/// neighbouring reads landing in the same batch.
const SIGNAL_CACHE_BATCHES: usize = 8;

type IpcReader = FileReader<Cursor<Vec<u8>>>;

/// An opened POD5 file.
///
/// The reads and signal tables are loaded into memory when opened; record
/// batches are decoded lazily.
pub struct Pod5File {
    reads: IpcReader,
    run_infos: HashMap<String, RunInfo>,
    signal: SignalTable,
}

impl Pod5File {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Pod5Error> {
        let file = BufReader::new(File::open(path)?);
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, Pod5Error> {
        let mut container = Container::from_reader(reader)?;
        let reads = FileReader::try_new(Cursor::new(container.read_table_bytes()?), None)?;
        let run_infos = index_run_infos(container.run_info_table_bytes()?)?;
        let signal = SignalTable::new(container.signal_table_bytes()?)?;
        log::debug!(
            "Opened POD5 with {} read batches and {} acquisitions",
            reads.num_batches(),
            run_infos.len()
        );
        Ok(Self {
            reads,
            run_infos,
            signal,
        })
    }
}

impl Pod5Source for Pod5File {
    type Batch = ReadBatch;

    fn batch_count(&self) -> usize {
        self.reads.num_batches()
    }

    fn read_batch(&mut self, index: usize) -> Result<ReadBatch, Pod5Error> {
        let count = self.reads.num_batches();
        if index >= count {
            return Err(Pod5Error::BatchOutOfRange { index, count });
        }
        self.reads.set_index(index)?;
        let record = self
            .reads
            .next()
            .ok_or(Pod5Error::BatchOutOfRange { index, count })??;
        ReadBatch::new(&record)
    }

    fn batch_row_count(&self, batch: &ReadBatch) -> usize {
        batch.read_id.len()
    }

    fn row_info(&self, batch: &ReadBatch, row: usize) -> Result<ReadRowInfo, Pod5Error> {
        let num_samples = match &batch.num_samples {
            Some(num_samples) => u64::extract(num_samples, "num_samples", row)?,
            None => self.signal.total_samples(&batch.signal_rows(row)?)?,
        };
        Ok(ReadRowInfo {
            read_id: <[u8; 16]>::extract(&batch.read_id, "read_id", row)?,
            channel: u16::extract(&batch.channel, "channel", row)?,
            well: u8::extract(&batch.well, "well", row)?,
            read_number: u32::extract(&batch.read_number, "read_number", row)?,
            start_sample: u64::extract(&batch.start, "start", row)?,
            calibration_offset: f32::extract(&batch.calibration_offset, "calibration_offset", row)?,
            calibration_scale: f32::extract(&batch.calibration_scale, "calibration_scale", row)?,
            num_samples,
            run_info: batch.run_info.acquisition_id(row)?,
        })
    }

    fn run_info(&self, _: &ReadBatch, acquisition_id: &str) -> Result<RunInfo, Pod5Error> {
        self.run_infos
            .get(acquisition_id)
            .cloned()
            .ok_or_else(|| Pod5Error::UnknownRunInfo(acquisition_id.to_string()))
    }

    fn read_signal(&self, batch: &ReadBatch, row: usize, out: &mut [i16]) -> Result<(), Pod5Error> {
        self.signal.read_into(&batch.signal_rows(row)?, out)
    }
}

/// One record batch of the reads table with its columns resolved.
pub struct ReadBatch {
    read_id: FixedSizeBinaryArray,
    signal: ListArray,
    channel: UInt16Array,
    well: UInt8Array,
    read_number: UInt32Array,
    start: UInt64Array,
    calibration_offset: Float32Array,
    calibration_scale: Float32Array,
    num_samples: Option<UInt64Array>,
    run_info: RunInfoColumn,
}

impl ReadBatch {
    fn new(batch: &RecordBatch) -> Result<Self, Pod5Error> {
        let read_id = column::<FixedSizeBinaryArray>(batch, READS, "read_id")?;
        if read_id.value_length() != 16 {
            return Err(Pod5Error::ColumnType {
                table: READS,
                column: "read_id",
                found: read_id.data_type().to_string(),
            });
        }
        let signal = column::<ListArray>(batch, READS, "signal")?;
        if signal.value_type() != DataType::UInt64 {
            return Err(Pod5Error::ColumnType {
                table: READS,
                column: "signal",
                found: signal.data_type().to_string(),
            });
        }
        Ok(Self {
            read_id,
            signal,
            channel: column(batch, READS, "channel")?,
            well: column(batch, READS, "well")?,
            read_number: column(batch, READS, "read_number")?,
            start: column(batch, READS, "start")?,
            calibration_offset: column(batch, READS, "calibration_offset")?,
            calibration_scale: column(batch, READS, "calibration_scale")?,
            num_samples: optional_column(batch, READS, "num_samples")?,
            run_info: RunInfoColumn::new(batch)?,
        })
    }

    /// Rows of the signal table holding this read's samples, in order.
    fn signal_rows(&self, row: usize) -> Result<Vec<u64>, Pod5Error> {
        if row >= self.signal.len() {
            return Err(Pod5Error::RowOutOfRange {
                row,
                count: self.signal.len(),
            });
        }
        if self.signal.is_null(row) {
            return Err(Pod5Error::NullValue {
                column: "signal",
                row,
            });
        }
        let rows = self.signal.value(row);
        let rows = rows
            .as_any()
            .downcast_ref::<UInt64Array>()
            .ok_or_else(|| Pod5Error::ColumnType {
                table: READS,
                column: "signal",
                found: rows.data_type().to_string(),
            })?;
        if rows.null_count() > 0 {
            return Err(Pod5Error::NullValue {
                column: "signal",
                row,
            });
        }
        Ok(rows.values().to_vec())
    }
}

/// `run_info` is normally dictionary encoded but plain strings read the same.
enum RunInfoColumn {
    Dictionary { keys: Int16Array, values: StringArray },
    Plain(StringArray),
}

impl RunInfoColumn {
    fn new(batch: &RecordBatch) -> Result<Self, Pod5Error> {
        let array = batch
            .column_by_name("run_info")
            .ok_or(Pod5Error::MissingColumn {
                table: READS,
                column: "run_info",
            })?;
        match array.as_any().downcast_ref::<DictionaryArray<Int16Type>>() {
            Some(dictionary) => {
                let values = dictionary
                    .values()
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .cloned()
                    .ok_or_else(|| Pod5Error::ColumnType {
                        table: READS,
                        column: "run_info",
                        found: array.data_type().to_string(),
                    })?;
                Ok(Self::Dictionary {
                    keys: dictionary.keys().clone(),
                    values,
                })
            }
            None => column::<StringArray>(batch, READS, "run_info").map(Self::Plain),
        }
    }

    fn acquisition_id(&self, row: usize) -> Result<String, Pod5Error> {
        match self {
            Self::Dictionary { keys, values } => {
                if row >= keys.len() {
                    return Err(Pod5Error::RowOutOfRange {
                        row,
                        count: keys.len(),
                    });
                }
                if keys.is_null(row) {
                    return Err(Pod5Error::NullValue {
                        column: "run_info",
                        row,
                    });
                }
                let key = usize::try_from(keys.value(row)).map_err(|_| {
                    Pod5Error::UnknownRunInfo(format!("dictionary key {}", keys.value(row)))
                })?;
                String::extract(values, "run_info", key)
            }
            Self::Plain(values) => String::extract(values, "run_info", row),
        }
    }
}

fn index_run_infos(table: Vec<u8>) -> Result<HashMap<String, RunInfo>, Pod5Error> {
    let reader = FileReader::try_new(Cursor::new(table), None)?;
    let mut run_infos = HashMap::new();
    for batch in reader {
        let batch = batch?;
        let acquisition_id = column::<StringArray>(&batch, RUN_INFO, "acquisition_id")?;
        let start_time =
            column::<TimestampMillisecondArray>(&batch, RUN_INFO, "acquisition_start_time")?;
        let sample_rate = column::<UInt16Array>(&batch, RUN_INFO, "sample_rate")?;
        for row in 0..batch.num_rows() {
            let run_info = RunInfo {
                acquisition_id: String::extract(&acquisition_id, "acquisition_id", row)?,
                acquisition_start_time_ms: i64::extract(
                    &start_time,
                    "acquisition_start_time",
                    row,
                )?,
                sample_rate: u16::extract(&sample_rate, "sample_rate", row)?,
            };
            run_infos.insert(run_info.acquisition_id.clone(), run_info);
        }
    }
    Ok(run_infos)
}

/// Signal samples are either VBZ compressed blobs or plain `i16` lists.
#[derive(Clone)]
enum SignalColumn {
    Vbz(LargeBinaryArray),
    Uncompressed(LargeListArray),
}

#[derive(Clone)]
struct SignalBatch {
    signal: SignalColumn,
    samples: UInt32Array,
}

impl SignalBatch {
    fn new(batch: &RecordBatch) -> Result<Self, Pod5Error> {
        let samples = column::<UInt32Array>(batch, SIGNAL, "samples")?;
        let array = batch.column_by_name("signal").ok_or(Pod5Error::MissingColumn {
            table: SIGNAL,
            column: "signal",
        })?;
        let signal = match array.data_type() {
            DataType::LargeBinary => SignalColumn::Vbz(column(batch, SIGNAL, "signal")?),
            DataType::LargeList(field) if field.data_type() == &DataType::Int16 => {
                SignalColumn::Uncompressed(column(batch, SIGNAL, "signal")?)
            }
            other => {
                return Err(Pod5Error::ColumnType {
                    table: SIGNAL,
                    column: "signal",
                    found: other.to_string(),
                })
            }
        };
        Ok(Self { signal, samples })
    }

    fn num_rows(&self) -> usize {
        self.samples.len()
    }

    fn decode_into(&self, row: usize, out: &mut [i16]) -> Result<(), Pod5Error> {
        match &self.signal {
            SignalColumn::Vbz(compressed) => {
                if compressed.is_null(row) {
                    return Err(Pod5Error::NullValue {
                        column: "signal",
                        row,
                    });
                }
                svb16::decode_into(compressed.value(row), out)?;
            }
            SignalColumn::Uncompressed(lists) => {
                if lists.is_null(row) {
                    return Err(Pod5Error::NullValue {
                        column: "signal",
                        row,
                    });
                }
                let values = lists.value(row);
                let values = values
                    .as_any()
                    .downcast_ref::<Int16Array>()
                    .ok_or_else(|| Pod5Error::ColumnType {
                        table: SIGNAL,
                        column: "signal",
                        found: values.data_type().to_string(),
                    })?;
                if values.len() != out.len() {
                    return Err(Pod5Error::SignalLength {
                        expected: out.len(),
                        found: values.len(),
                    });
                }
                out.copy_from_slice(values.values());
            }
        }
        Ok(())
    }
}

struct SignalBatches {
    reader: IpcReader,
    cache: LruCache<usize, SignalBatch>,
}

impl SignalBatches {
    fn get(&mut self, index: usize) -> Result<SignalBatch, Pod5Error> {
        if let Some(batch) = self.cache.get(&index) {
            return Ok(batch.clone());
        }
        let count = self.reader.num_batches();
        self.reader.set_index(index)?;
        let record = self
            .reader
            .next()
            .ok_or(Pod5Error::BatchOutOfRange { index, count })??;
        let batch = SignalBatch::new(&record)?;
        self.cache.put(index, batch.clone());
        Ok(batch)
    }
}

/// The signal table, addressed by global row index.
///
/// Every batch but the last holds the same number of rows, so a row's batch
/// is found by division.
struct SignalTable {
    batches: Mutex<SignalBatches>,
    batch_size: usize,
    batch_count: usize,
}

impl SignalTable {
    fn new(table: Vec<u8>) -> Result<Self, Pod5Error> {
        let reader = FileReader::try_new(Cursor::new(table), None)?;
        let batch_count = reader.num_batches();
        let capacity = NonZeroUsize::new(SIGNAL_CACHE_BATCHES).unwrap_or(NonZeroUsize::MIN);
        let mut batches = SignalBatches {
            reader,
            cache: LruCache::new(capacity),
        };
        let batch_size = if batch_count > 0 {
            batches.get(0)?.num_rows().max(1)
        } else {
            1
        };
        Ok(Self {
            batches: Mutex::new(batches),
            batch_size,
            batch_count,
        })
    }

    fn row(&self, row: u64) -> Result<(SignalBatch, usize), Pod5Error> {
        let index = usize::try_from(row).map_err(|_| Pod5Error::SignalRowOutOfRange(row))?;
        let batch_index = index / self.batch_size;
        let local = index % self.batch_size;
        if batch_index >= self.batch_count {
            return Err(Pod5Error::SignalRowOutOfRange(row));
        }
        let batch = self
            .batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(batch_index)?;
        if local >= batch.num_rows() {
            return Err(Pod5Error::SignalRowOutOfRange(row));
        }
        Ok((batch, local))
    }

    fn row_samples(&self, row: u64) -> Result<usize, Pod5Error> {
        let (batch, local) = self.row(row)?;
        Ok(u32::extract(&batch.samples, "samples", local)? as usize)
    }

    fn total_samples(&self, rows: &[u64]) -> Result<u64, Pod5Error> {
        rows.iter()
            .map(|&row| self.row_samples(row).map(|samples| samples as u64))
            .sum()
    }

    /// Concatenate the samples of `rows` into `out`, which must be filled
    /// exactly.
    fn read_into(&self, rows: &[u64], out: &mut [i16]) -> Result<(), Pod5Error> {
        let expected = out.len();
        let mut filled = 0;
        for &row in rows {
            let (batch, local) = self.row(row)?;
            let samples = u32::extract(&batch.samples, "samples", local)? as usize;
            let end = filled + samples;
            let dest = out
                .get_mut(filled..end)
                .ok_or(Pod5Error::SignalLength { expected, found: end })?;
            batch.decode_into(local, dest)?;
            filled = end;
        }
        if filled != expected {
            return Err(Pod5Error::SignalLength {
                expected,
                found: filled,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::pod5::fixture::Pod5Fixture;

    fn open(fixture: &Pod5Fixture) -> eyre::Result<Pod5File> {
        Ok(Pod5File::from_reader(Cursor::new(fixture.to_bytes()?))?)
    }

    fn read_all(file: &mut Pod5File) -> eyre::Result<Vec<(ReadRowInfo, Vec<i16>)>> {
        let mut reads = Vec::new();
        for index in 0..file.batch_count() {
            let batch = file.read_batch(index)?;
            for row in 0..file.batch_row_count(&batch) {
                let info = file.row_info(&batch, row)?;
                let mut signal = vec![0i16; info.num_samples as usize];
                file.read_signal(&batch, row, &mut signal)?;
                reads.push((info, signal));
            }
        }
        Ok(reads)
    }

    #[test]
    fn test_read_fixture() -> eyre::Result<()> {
        let fixture = Pod5Fixture::with_reads(5, 3);
        let mut file = open(&fixture)?;
        assert_eq!(file.batch_count(), 2);

        let reads = read_all(&mut file)?;
        assert_eq!(reads.len(), 5);
        for ((info, signal), expected) in reads.iter().zip(&fixture.reads) {
            assert_eq!(Uuid::from_bytes(info.read_id), expected.read_id);
            assert_eq!(info.channel, expected.channel);
            assert_eq!(info.well, expected.well);
            assert_eq!(info.read_number, expected.read_number);
            assert_eq!(info.start_sample, expected.start);
            assert_eq!(info.calibration_scale, expected.calibration_scale);
            assert_eq!(info.num_samples, expected.signal.len() as u64);
            assert_eq!(info.run_info, expected.run_info);
            assert_eq!(signal, &expected.signal);
        }
        Ok(())
    }

    #[test]
    fn test_run_info_lookup() -> eyre::Result<()> {
        let fixture = Pod5Fixture::with_reads(2, 2);
        let mut file = open(&fixture)?;
        let batch = file.read_batch(0)?;
        let info = file.row_info(&batch, 0)?;
        let run_info = file.run_info(&batch, &info.run_info)?;
        assert_eq!(run_info.sample_rate, 4000);
        assert_eq!(run_info.acquisition_start_time_ms, 1_000_000);
        assert!(matches!(
            file.run_info(&batch, "missing"),
            Err(Pod5Error::UnknownRunInfo(_))
        ));
        Ok(())
    }

    #[test]
    fn test_signal_spanning_rows_and_batches() -> eyre::Result<()> {
        let mut fixture = Pod5Fixture::with_reads(3, 2);
        fixture.reads[1].signal = (0..2500).map(|i| (i % 700) as i16 - 350).collect();
        fixture.signal_chunk = 400;
        fixture.signal_batch_size = 2;
        let mut file = open(&fixture)?;

        let reads = read_all(&mut file)?;
        assert_eq!(reads[1].1, fixture.reads[1].signal);
        assert_eq!(reads[2].1, fixture.reads[2].signal);
        Ok(())
    }

    #[test]
    fn test_uncompressed_signal() -> eyre::Result<()> {
        let mut fixture = Pod5Fixture::with_reads(4, 4);
        fixture.compressed = false;
        fixture.signal_chunk = 50;
        let mut file = open(&fixture)?;

        let reads = read_all(&mut file)?;
        for ((_, signal), expected) in reads.iter().zip(&fixture.reads) {
            assert_eq!(signal, &expected.signal);
        }
        Ok(())
    }

    #[test]
    fn test_num_samples_from_signal_rows() -> eyre::Result<()> {
        let mut fixture = Pod5Fixture::with_reads(2, 2);
        fixture.write_num_samples = false;
        fixture.signal_chunk = 30;
        let mut file = open(&fixture)?;
        let batch = file.read_batch(0)?;
        assert_eq!(
            file.row_info(&batch, 1)?.num_samples,
            fixture.reads[1].signal.len() as u64
        );
        Ok(())
    }

    #[test]
    fn test_signal_wrong_length() -> eyre::Result<()> {
        let fixture = Pod5Fixture::with_reads(1, 1);
        let mut file = open(&fixture)?;
        let batch = file.read_batch(0)?;
        let info = file.row_info(&batch, 0)?;

        let mut short = vec![0i16; info.num_samples as usize - 1];
        assert!(file.read_signal(&batch, 0, &mut short).is_err());
        let mut long = vec![0i16; info.num_samples as usize + 1];
        assert!(matches!(
            file.read_signal(&batch, 0, &mut long),
            Err(Pod5Error::SignalLength { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_batch_out_of_range() -> eyre::Result<()> {
        let mut file = open(&Pod5Fixture::with_reads(2, 2))?;
        assert!(matches!(
            file.read_batch(1),
            Err(Pod5Error::BatchOutOfRange { index: 1, count: 1 })
        ));
        Ok(())
    }

    #[test]
    fn test_not_a_pod5() {
        let res = Pod5File::from_reader(Cursor::new(vec![0u8; 256]));
        assert!(matches!(res, Err(Pod5Error::Format(_))));
    }

    #[test]
    fn test_empty_file() -> eyre::Result<()> {
        let file = open(&Pod5Fixture::with_reads(0, 1))?;
        assert_eq!(file.batch_count(), 0);
        Ok(())
    }
}
