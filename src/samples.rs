//! Reading measurement samples and routing them into [`TimeBins`].
//!
//! Samples are `timestamp,value` pairs where `timestamp` is a unix time in
//! seconds and `value` the measurement (e.g. throughput in Mbit/s).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::bins::{BinsHandle, HandleError, TimeBins};
use crate::shutdown::ShutdownFlag;
use crate::time::fractional_hour_from_timestamp;

/// A single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

/// Outcome of feeding a batch of samples into a [`TimeBins`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccumulateSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// Outcome of streaming sample lines into a [`BinsHandle`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectSummary {
    pub accepted: usize,
    pub rejected: usize,
    pub malformed: usize,
}

/// Reads every sample from a CSV file with a `timestamp,value` header.
pub fn read_samples(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("failed to open samples '{}'", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut samples = Vec::new();

    for result in rdr.deserialize() {
        let sample: Sample =
            result.with_context(|| format!("malformed sample in '{}'", path.display()))?;
        samples.push(sample);
    }

    debug!(path = %path.display(), count = samples.len(), "Samples loaded");
    Ok(samples)
}

/// Parses one `timestamp,value` line of streamed input.
///
/// Returns `Ok(None)` for blank lines, `#` comments and a `timestamp,value` header.
pub fn parse_sample_line(line: &str) -> Result<Option<Sample>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line == "timestamp,value" {
        return Ok(None);
    }

    let (timestamp, value) = line
        .split_once(',')
        .with_context(|| format!("expected 'timestamp,value', got '{line}'"))?;
    let timestamp = timestamp
        .trim()
        .parse()
        .with_context(|| format!("invalid timestamp in '{line}'"))?;
    let value = value
        .trim()
        .parse()
        .with_context(|| format!("invalid value in '{line}'"))?;

    Ok(Some(Sample { timestamp, value }))
}

/// Adds each sample to the bin for its local time of day.
///
/// Samples with a timestamp that has no local time, or whose time of day the
/// bins reject, are logged, counted in [`AccumulateSummary::rejected`] and
/// skipped; the rest of the batch is still added.
pub fn accumulate(
    bins: &mut TimeBins,
    samples: impl IntoIterator<Item = Sample>,
) -> AccumulateSummary {
    let mut summary = AccumulateSummary::default();

    for sample in samples {
        let hour = match fractional_hour_from_timestamp(sample.timestamp) {
            Ok(hour) => hour,
            Err(e) => {
                warn!(timestamp = sample.timestamp, error = %e, "Sample rejected");
                summary.rejected += 1;
                continue;
            }
        };
        match bins.add_value(hour, sample.value) {
            Ok(_) => summary.accepted += 1,
            Err(e) => {
                warn!(timestamp = sample.timestamp, error = %e, "Sample rejected");
                summary.rejected += 1;
            }
        }
    }

    summary
}

/// Feeds `timestamp,value` lines from `reader` into `handle` until EOF or
/// until `shutdown` is triggered.
///
/// Malformed lines and rejected samples are logged and counted; only a read
/// failure or a stopped bins task ends the stream with an error.
pub async fn collect_lines<R>(
    reader: R,
    handle: &BinsHandle,
    shutdown: &ShutdownFlag,
) -> Result<CollectSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = CollectSummary::default();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read samples")?,
            _ = shutdown.wait() => {
                info!("Stopping sample collection");
                break;
            }
        };
        let Some(line) = line else {
            debug!("End of input");
            break;
        };

        let sample = match parse_sample_line(&line) {
            Ok(Some(sample)) => sample,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Skipping malformed line");
                summary.malformed += 1;
                continue;
            }
        };

        let hour = match fractional_hour_from_timestamp(sample.timestamp) {
            Ok(hour) => hour,
            Err(e) => {
                warn!(timestamp = sample.timestamp, error = %e, "Sample rejected");
                summary.rejected += 1;
                continue;
            }
        };
        match handle.add_value(hour, sample.value).await {
            Ok(index) => {
                debug!(index, hour, value = sample.value, "Sample binned");
                summary.accepted += 1;
            }
            Err(HandleError::Bins(e)) => {
                warn!(timestamp = sample.timestamp, error = %e, "Sample rejected");
                summary.rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_sample_line() {
        let sample = parse_sample_line("1700000000, 93.5").unwrap();
        assert_eq!(
            sample,
            Some(Sample {
                timestamp: 1_700_000_000,
                value: 93.5
            })
        );
    }

    #[test]
    fn test_parse_skips_blank_comment_and_header() {
        assert_eq!(parse_sample_line("").unwrap(), None);
        assert_eq!(parse_sample_line("   ").unwrap(), None);
        assert_eq!(parse_sample_line("# speedtest run").unwrap(), None);
        assert_eq!(parse_sample_line("timestamp,value").unwrap(), None);
    }

    #[test]
    fn test_parse_invalid_line() {
        assert!(parse_sample_line("1700000000").is_err());
        assert!(parse_sample_line("noon,12").is_err());
        assert!(parse_sample_line("1700000000,fast").is_err());
    }

    #[test]
    fn test_read_samples_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,value").unwrap();
        writeln!(file, "1700000000,10.5").unwrap();
        writeln!(file, "1700003600,20").unwrap();

        let samples = read_samples(file.path()).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].value, 20.0);
    }

    #[test]
    fn test_read_samples_missing_file() {
        assert!(read_samples("/nonexistent/netperf/samples.csv").is_err());
    }

    #[test]
    fn test_accumulate_into_single_bin() {
        let mut bins = TimeBins::new(1440.0).unwrap();
        let samples = [
            Sample {
                timestamp: 1_700_000_000,
                value: 5.0,
            },
            Sample {
                timestamp: 1_700_020_000,
                value: 15.0,
            },
        ];

        let summary = accumulate(&mut bins, samples);
        assert_eq!(
            summary,
            AccumulateSummary {
                accepted: 2,
                rejected: 0
            }
        );
        assert_eq!(bins.means(), vec![10.0]);
    }

    #[test]
    fn test_accumulate_skips_unrepresentable_timestamp() {
        let mut bins = TimeBins::new(1440.0).unwrap();
        let samples = [1_700_000_000, i64::MAX, 1_700_003_600].map(|timestamp| Sample {
            timestamp,
            value: 6.0,
        });

        let summary = accumulate(&mut bins, samples);
        assert_eq!(
            summary,
            AccumulateSummary {
                accepted: 2,
                rejected: 1
            }
        );
        assert_eq!(bins.total_samples(), 2);
        assert_eq!(bins.means(), vec![6.0]);
    }

    #[tokio::test]
    async fn test_collect_lines_skips_bad_input_and_keeps_going() {
        let handle = BinsHandle::spawn(TimeBins::new(1440.0).unwrap());
        let shutdown = ShutdownFlag::new();
        let input = "timestamp,value\n\
                     1700000000,6.0\n\
                     9223372036854775807,6.0\n\
                     not a sample\n\
                     # comment\n\
                     1700003600,6.0\n";

        let summary = collect_lines(input.as_bytes(), &handle, &shutdown)
            .await
            .unwrap();
        assert_eq!(
            summary,
            CollectSummary {
                accepted: 2,
                rejected: 1,
                malformed: 1
            }
        );

        let bins = handle.into_inner().await.unwrap();
        assert_eq!(bins.total_samples(), 2);
        assert_eq!(bins.means(), vec![6.0]);
    }

    #[tokio::test]
    async fn test_collect_lines_stops_on_shutdown() {
        let handle = BinsHandle::spawn(TimeBins::new(60.0).unwrap());
        let shutdown = ShutdownFlag::new();
        shutdown.trigger();

        let (_writer, reader) = tokio::io::duplex(64);
        let reader = tokio::io::BufReader::new(reader);
        let summary = collect_lines(reader, &handle, &shutdown).await.unwrap();
        assert_eq!(summary, CollectSummary::default());
    }
}
