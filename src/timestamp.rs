//! Read start time reconstruction.
//!
//! POD5 stores the acquisition start as epoch milliseconds and each read's
//! start as a sample offset. FAST5 stores the acquisition start as a string
//! and the read's start as a sample offset. Both end up as UTC strings.
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

use crate::error::Fast5Error;

const EXP_START_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Absolute start of a read in epoch milliseconds.
///
/// Returns `None` when the sample rate is zero.
pub(crate) fn start_time_ms(
    acquisition_start_time_ms: i64,
    start_sample: u64,
    sample_rate: u16,
) -> Option<i64> {
    let offset_ms = (start_sample as u128 * 1000).checked_div(sample_rate as u128)?;
    acquisition_start_time_ms.checked_add(i64::try_from(offset_ms).ok()?)
}

/// Format epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmm+00:00`.
pub(crate) fn format_epoch_ms(time_stamp_ms: i64) -> Option<String> {
    let time = DateTime::<Utc>::from_timestamp_millis(time_stamp_ms)?;
    Some(time.format("%Y-%m-%dT%H:%M:%S%.3f+00:00").to_string())
}

/// Add whole seconds to a FAST5 `exp_start_time`, formatted as
/// `YYYY-MM-DDTHH:MM:SSZ`.
pub(crate) fn adjust_time(exp_start_time: &str, offset_seconds: u64) -> Result<String, Fast5Error> {
    let base = parse_exp_start_time(exp_start_time)?;
    let adjusted = i64::try_from(offset_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|delta| base.checked_add_signed(delta))
        .ok_or_else(|| Fast5Error::TimestampOutOfRange(exp_start_time.to_string()))?;
    Ok(adjusted.format(EXP_START_FORMAT).to_string())
}

fn parse_exp_start_time(exp_start_time: &str) -> Result<DateTime<Utc>, Fast5Error> {
    match NaiveDateTime::parse_from_str(exp_start_time, EXP_START_FORMAT) {
        Ok(naive) => Ok(naive.and_utc()),
        // Some writers emit a full RFC 3339 timestamp with an offset or
        // fractional seconds.
        Err(source) => DateTime::parse_from_rfc3339(exp_start_time)
            .map(|time| time.with_timezone(&Utc))
            .map_err(|_| Fast5Error::InvalidTimestamp {
                value: exp_start_time.to_string(),
                source,
            }),
    }
}
