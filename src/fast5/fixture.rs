//! Small multi-read FAST5 files written through HDF5 for tests.
use std::path::Path;

use hdf5::{
    types::{FixedAscii, VarLenAscii, VarLenUnicode},
    File, Group, H5Type,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct FixtureRead {
    pub(crate) read_id: Uuid,
    pub(crate) read_number: i32,
    pub(crate) start_mux: u8,
    pub(crate) start_time: u64,
    pub(crate) channel_number: String,
    pub(crate) signal: Vec<i16>,
    /// Store the signal as `f32` instead of `i16`.
    pub(crate) float_signal: bool,
}

impl FixtureRead {
    pub(crate) fn group_name(&self) -> String {
        format!("read_{}", self.read_id.hyphenated())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Fast5Fixture {
    pub(crate) reads: Vec<FixtureRead>,
    pub(crate) digitisation: f64,
    pub(crate) range: f64,
    pub(crate) offset: f64,
    pub(crate) sampling_rate: f64,
    pub(crate) exp_start_time: String,
}

impl Fast5Fixture {
    /// `count` reads whose group names sort in read order.
    pub(crate) fn with_reads(count: usize) -> Self {
        let reads = (0..count)
            .map(|i| FixtureRead {
                read_id: Uuid::from_u128(0xfa57_0000_0000_4000_8000_0000_0000_0000 + i as u128),
                read_number: 40 + i as i32,
                start_mux: 1 + (i % 4) as u8,
                start_time: 4000 * i as u64 + 1999,
                channel_number: (100 + i).to_string(),
                signal: (0..50 + i * 3).map(|j| (j * 13 % 700) as i16 - 350).collect(),
                float_signal: false,
            })
            .collect();
        Self {
            reads,
            digitisation: 8192.0,
            range: 1402.882,
            offset: -240.0,
            sampling_rate: 4000.0,
            exp_start_time: "2022-03-04T05:06:07Z".to_string(),
        }
    }

    pub(crate) fn write<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let file = File::create(path)?;
        for read in &self.reads {
            let group = file.create_group(&read.group_name())?;

            let channel_id = group.create_group("channel_id")?;
            write_attr(&channel_id, "digitisation", &self.digitisation)?;
            write_attr(&channel_id, "range", &self.range)?;
            write_attr(&channel_id, "offset", &self.offset)?;
            write_attr(&channel_id, "sampling_rate", &self.sampling_rate)?;
            let channel_number: VarLenUnicode = read.channel_number.parse()?;
            write_attr(&channel_id, "channel_number", &channel_number)?;

            let raw = group.create_group("Raw")?;
            if read.float_signal {
                let signal = read.signal.iter().map(|&s| s as f32).collect::<Vec<_>>();
                raw.new_dataset::<f32>()
                    .shape(signal.len())
                    .create("Signal")?
                    .write_raw(&signal)?;
            } else {
                raw.new_dataset::<i16>()
                    .shape(read.signal.len())
                    .create("Signal")?
                    .write_raw(&read.signal)?;
            }
            write_attr(&raw, "start_mux", &read.start_mux)?;
            write_attr(&raw, "read_number", &read.read_number)?;
            write_attr(&raw, "start_time", &read.start_time)?;
            let read_id = FixedAscii::<36>::from_ascii(&read.read_id.hyphenated().to_string())?;
            write_attr(&raw, "read_id", &read_id)?;

            let tracking_id = group.create_group("tracking_id")?;
            let exp_start_time = VarLenAscii::from_ascii(&self.exp_start_time)?;
            write_attr(&tracking_id, "exp_start_time", &exp_start_time)?;
        }
        Ok(())
    }
}

fn write_attr<T: H5Type>(group: &Group, name: &str, value: &T) -> eyre::Result<()> {
    group.new_attr::<T>().create(name)?.write_scalar(value)?;
    Ok(())
}
