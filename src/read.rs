//! The canonical read record produced by both decoders.

/// Per-read acquisition attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadAttributes {
    /// Sequence number of the read within its channel.
    pub read_number: u32,
    /// Physical sensor channel, 1-based.
    pub channel_number: i32,
    /// Well the read was captured from.
    pub mux: u32,
    /// Absolute UTC start time of the read.
    pub start_time: String,
    /// Basename of the file the read was loaded from.
    pub filename: String,
}

/// One nanopore read: raw signal plus what is needed to calibrate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Read {
    /// Raw ADC samples.
    pub raw_data: Vec<i16>,
    /// Samples per second.
    pub sample_rate: f32,
    pub scaling: f32,
    pub offset: f32,
    /// Only present for reads loaded from FAST5.
    pub digitisation: Option<f32>,
    /// Only present for reads loaded from FAST5.
    pub range: Option<f32>,
    pub read_id: String,
    /// Always zero when loaded, later pipeline stages own this.
    pub num_trimmed_samples: u64,
    pub attributes: ReadAttributes,
}

impl Read {
    pub fn num_samples(&self) -> usize {
        self.raw_data.len()
    }

    /// Signal in picoamps, `scaling * (raw + offset)`.
    pub fn to_picoamps(&self) -> Vec<f32> {
        self.raw_data
            .iter()
            .map(|&raw| self.scaling * (raw as f32 + self.offset))
            .collect()
    }

    /// Duration of the read in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.raw_data.len() as f64 / self.sample_rate as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn example_read() -> Read {
        Read {
            raw_data: vec![10, 20, -30],
            sample_rate: 4000.0,
            scaling: 0.5,
            offset: 2.0,
            digitisation: Some(8192.0),
            range: Some(4096.0),
            read_id: "002fde30-9e23-4125-9eae-d112c18a81a7".to_string(),
            num_trimmed_samples: 0,
            attributes: ReadAttributes {
                read_number: 7,
                channel_number: 12,
                mux: 3,
                start_time: "2021-01-01T00:00:02Z".to_string(),
                filename: "batch0.fast5".to_string(),
            },
        }
    }

    #[test]
    fn test_clone_equality() {
        let read = example_read();
        let copy = read.clone();
        assert_eq!(read, copy);

        let mut other = read.clone();
        other.attributes.mux = 4;
        assert_ne!(read, other);
    }

    #[test]
    fn test_to_picoamps() {
        let read = example_read();
        assert_eq!(read.num_samples(), 3);
        assert_eq!(read.to_picoamps(), vec![6.0, 11.0, -14.0]);
    }

    #[test]
    fn test_duration() {
        let mut read = example_read();
        read.raw_data = vec![0; 8000];
        assert_eq!(read.duration(), 2.0);
        read.sample_rate = 0.0;
        assert_eq!(read.duration(), 0.0);
    }
}
