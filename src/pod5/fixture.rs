//! Small POD5 files built in memory for tests.
use std::{io::Cursor, path::Path, sync::Arc};

use arrow::{
    array::{
        ArrayRef, DictionaryArray, FixedSizeBinaryArray, Float32Array, Int16Array,
        LargeBinaryArray, LargeListArray, ListArray, RecordBatch, StringArray,
        TimestampMillisecondArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
    },
    datatypes::{Int16Type, Schema, UInt64Type},
    ipc::writer::FileWriter,
};
use pod5_format::{ContainerWriter, ContentType};
use uuid::Uuid;

use super::RunInfo;

#[derive(Debug, Clone)]
pub(crate) struct FixtureRead {
    pub(crate) read_id: Uuid,
    pub(crate) channel: u16,
    pub(crate) well: u8,
    pub(crate) read_number: u32,
    pub(crate) start: u64,
    pub(crate) calibration_offset: f32,
    pub(crate) calibration_scale: f32,
    pub(crate) signal: Vec<i16>,
    pub(crate) run_info: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Pod5Fixture {
    pub(crate) reads: Vec<FixtureRead>,
    pub(crate) run_infos: Vec<RunInfo>,
    /// Rows per reads table batch.
    pub(crate) read_batch_size: usize,
    /// Rows per signal table batch.
    pub(crate) signal_batch_size: usize,
    /// Most samples stored in one signal row.
    pub(crate) signal_chunk: usize,
    pub(crate) compressed: bool,
    pub(crate) write_num_samples: bool,
}

impl Pod5Fixture {
    /// `count` reads spread over two acquisitions.
    pub(crate) fn with_reads(count: usize, read_batch_size: usize) -> Self {
        let reads = (0..count)
            .map(|i| FixtureRead {
                read_id: Uuid::from_u128(0x0123_4567_89ab_cdef_0000_0000_0000_0000 + i as u128),
                channel: 1 + (i % 512) as u16,
                well: 1 + (i % 4) as u8,
                read_number: 100 + i as u32,
                start: 8000 * i as u64,
                calibration_offset: -240.0 + i as f32,
                calibration_scale: 0.1755,
                signal: (0..100 + i * 17)
                    .map(|j| ((j * 31 + i * 7) % 2000) as i16 - 1000)
                    .collect(),
                run_info: format!("acq-{}", i % 2),
            })
            .collect();
        let run_infos = vec![
            RunInfo {
                acquisition_id: "acq-0".to_string(),
                acquisition_start_time_ms: 1_000_000,
                sample_rate: 4000,
            },
            RunInfo {
                acquisition_id: "acq-1".to_string(),
                acquisition_start_time_ms: 2_000_000,
                sample_rate: 5000,
            },
        ];
        Self {
            reads,
            run_infos,
            read_batch_size,
            signal_batch_size: 4,
            signal_chunk: 10_000,
            compressed: true,
            write_num_samples: true,
        }
    }

    pub(crate) fn write<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub(crate) fn to_bytes(&self) -> eyre::Result<Vec<u8>> {
        let mut signal_rows = Vec::new();
        let mut read_rows = Vec::new();
        for read in &self.reads {
            let mut rows = Vec::new();
            for chunk in read.signal.chunks(self.signal_chunk.max(1)) {
                rows.push(signal_rows.len() as u64);
                signal_rows.push((read.read_id, chunk.to_vec()));
            }
            read_rows.push((read, rows));
        }

        let signal = ipc_bytes(
            &self.signal_batch(&[])?.schema(),
            &signal_rows
                .chunks(self.signal_batch_size.max(1))
                .map(|rows| self.signal_batch(rows))
                .collect::<eyre::Result<Vec<_>>>()?,
        )?;
        let run_info = self.run_info_batch()?;
        let run_info = ipc_bytes(&run_info.schema(), &[run_info])?;
        let reads = ipc_bytes(
            &self.reads_batch(&[])?.schema(),
            &read_rows
                .chunks(self.read_batch_size.max(1))
                .map(|rows| self.reads_batch(rows))
                .collect::<eyre::Result<Vec<_>>>()?,
        )?;

        let mut writer = ContainerWriter::new(Cursor::new(Vec::new()))?;
        writer.write_table(&signal, ContentType::SignalTable)?;
        writer.write_table(&run_info, ContentType::RunInfoTable)?;
        writer.write_table(&reads, ContentType::ReadsTable)?;
        Ok(writer.finish()?.into_inner())
    }

    fn signal_batch(&self, rows: &[(Uuid, Vec<i16>)]) -> eyre::Result<RecordBatch> {
        let signal: ArrayRef = if self.compressed {
            let compressed = rows
                .iter()
                .map(|(_, samples)| svb16::encode(samples))
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(LargeBinaryArray::from_iter_values(compressed))
        } else {
            Arc::new(LargeListArray::from_iter_primitive::<Int16Type, _, _>(
                rows.iter()
                    .map(|(_, samples)| Some(samples.iter().copied().map(Some))),
            ))
        };
        Ok(RecordBatch::try_from_iter(vec![
            ("read_id", read_ids(rows.iter().map(|(id, _)| *id))?),
            ("signal", signal),
            (
                "samples",
                Arc::new(UInt32Array::from_iter_values(
                    rows.iter().map(|(_, samples)| samples.len() as u32),
                )) as ArrayRef,
            ),
        ])?)
    }

    fn run_info_batch(&self) -> eyre::Result<RecordBatch> {
        let acquisition_id =
            StringArray::from_iter_values(self.run_infos.iter().map(|r| &r.acquisition_id));
        let start_time = TimestampMillisecondArray::from_iter_values(
            self.run_infos.iter().map(|r| r.acquisition_start_time_ms),
        )
        .with_timezone("UTC");
        let sample_rate = UInt16Array::from_iter_values(self.run_infos.iter().map(|r| r.sample_rate));
        Ok(RecordBatch::try_from_iter(vec![
            ("acquisition_id", Arc::new(acquisition_id) as ArrayRef),
            ("acquisition_start_time", Arc::new(start_time) as ArrayRef),
            ("sample_rate", Arc::new(sample_rate) as ArrayRef),
        ])?)
    }

    fn reads_batch(&self, rows: &[(&FixtureRead, Vec<u64>)]) -> eyre::Result<RecordBatch> {
        let acquisitions = self
            .run_infos
            .iter()
            .map(|r| r.acquisition_id.as_str())
            .collect::<Vec<_>>();
        let keys = rows
            .iter()
            .map(|(read, _)| {
                acquisitions
                    .iter()
                    .position(|id| *id == read.run_info)
                    .map(|key| key as i16)
            })
            .collect::<Int16Array>();
        let run_info = DictionaryArray::<Int16Type>::try_new(
            keys,
            Arc::new(StringArray::from(acquisitions)),
        )?;
        let signal = ListArray::from_iter_primitive::<UInt64Type, _, _>(
            rows.iter()
                .map(|(_, signal_rows)| Some(signal_rows.iter().copied().map(Some))),
        );

        let mut columns = vec![
            ("read_id", read_ids(rows.iter().map(|(read, _)| read.read_id))?),
            ("signal", Arc::new(signal) as ArrayRef),
            (
                "channel",
                Arc::new(UInt16Array::from_iter_values(rows.iter().map(|(r, _)| r.channel))) as ArrayRef,
            ),
            (
                "well",
                Arc::new(UInt8Array::from_iter_values(rows.iter().map(|(r, _)| r.well))) as ArrayRef,
            ),
            (
                "read_number",
                Arc::new(UInt32Array::from_iter_values(
                    rows.iter().map(|(r, _)| r.read_number),
                )) as ArrayRef,
            ),
            (
                "start",
                Arc::new(UInt64Array::from_iter_values(rows.iter().map(|(r, _)| r.start))) as ArrayRef,
            ),
            (
                "calibration_offset",
                Arc::new(Float32Array::from_iter_values(
                    rows.iter().map(|(r, _)| r.calibration_offset),
                )) as ArrayRef,
            ),
            (
                "calibration_scale",
                Arc::new(Float32Array::from_iter_values(
                    rows.iter().map(|(r, _)| r.calibration_scale),
                )) as ArrayRef,
            ),
            ("run_info", Arc::new(run_info) as ArrayRef),
        ];
        if self.write_num_samples {
            columns.push((
                "num_samples",
                Arc::new(UInt64Array::from_iter_values(
                    rows.iter().map(|(r, _)| r.signal.len() as u64),
                )) as ArrayRef,
            ));
        }
        Ok(RecordBatch::try_from_iter(columns)?)
    }
}

fn read_ids<I: Iterator<Item = Uuid>>(ids: I) -> eyre::Result<ArrayRef> {
    let ids = ids.map(|id| Some(id.into_bytes()));
    Ok(Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
        ids, 16,
    )?))
}

fn ipc_bytes(schema: &Schema, batches: &[RecordBatch]) -> eyre::Result<Vec<u8>> {
    let mut writer = FileWriter::try_new(Vec::new(), schema)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.finish()?;
    Ok(writer.into_inner()?)
}
