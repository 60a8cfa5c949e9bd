//! Daily time-bin reports.
//!
//! Supports pretty-printing, JSON serialization, and CSV (optionally gzipped).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::bins::BinsSnapshot;
use crate::bins::utility::{mean, non_zero};

/// One row of a report: a single bin of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRow {
    pub index: usize,
    pub midpoint_hours: f64,
    pub mean: f64,
    pub samples: usize,
}

/// Midpoints and means of every bin of a day, ready for plotting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinReport {
    pub generated_at: DateTime<Utc>,
    pub bin_minutes: f64,
    /// Mean over bins that received at least one non-zero mean.
    pub daily_mean: f64,
    pub bins: Vec<BinRow>,
}

impl BinReport {
    pub fn from_snapshot(snapshot: &BinsSnapshot) -> Self {
        let bins = snapshot
            .midpoints
            .iter()
            .zip(&snapshot.means)
            .zip(&snapshot.counts)
            .enumerate()
            .map(|(index, ((midpoint, mean), samples))| BinRow {
                index,
                midpoint_hours: *midpoint,
                mean: *mean,
                samples: *samples,
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            bin_minutes: snapshot.bin_minutes,
            daily_mean: mean(&non_zero(&snapshot.means)),
            bins,
        }
    }
}

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &BinReport) {
    debug!("{:#?}", report);
}

/// Writes the report as pretty-printed JSON, replacing any existing file.
pub fn write_report_json(path: impl AsRef<Path>, report: &BinReport) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;

    let body = serde_json::to_vec_pretty(report)?;
    fs::write(path, body).with_context(|| format!("failed to write '{}'", path.display()))?;

    info!(path = %path.display(), bins = report.bins.len(), "JSON report written");
    Ok(())
}

/// Writes one CSV row per bin, replacing any existing file.
///
/// If `gzip` is set the CSV is gzip-compressed.
pub fn write_report_csv(path: impl AsRef<Path>, report: &BinReport, gzip: bool) -> Result<()> {
    let path = path.as_ref();
    create_parent_dir(path)?;

    let file = File::create(path).with_context(|| format!("failed to create '{}'", path.display()))?;

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_rows(&mut encoder, report)?;
        encoder.finish()?;
    } else {
        write_rows(file, report)?;
    }

    info!(path = %path.display(), bins = report.bins.len(), gzip, "CSV report written");
    Ok(())
}

fn write_rows<W: Write>(writer: W, report: &BinReport) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in &report.bins {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::TimeBins;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn sample_report() -> BinReport {
        let mut bins = TimeBins::new(360.0).unwrap();
        bins.add_value(1.0, 10.0).unwrap();
        bins.add_value(2.0, 30.0).unwrap();
        bins.add_value(13.0, 50.0).unwrap();
        BinReport::from_snapshot(&bins.snapshot())
    }

    #[test]
    fn test_report_rows_follow_bins() {
        let report = sample_report();

        assert_eq!(report.bins.len(), 4);
        assert_eq!(report.bins[0].midpoint_hours, 3.0);
        assert_eq!(report.bins[0].mean, 20.0);
        assert_eq!(report.bins[0].samples, 2);
        assert_eq!(report.bins[1].mean, 0.0);
        assert_eq!(report.bins[2].mean, 50.0);
    }

    #[test]
    fn test_daily_mean_skips_empty_bins() {
        let report = sample_report();
        assert_eq!(report.daily_mean, 35.0);
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&sample_report());
    }

    #[test]
    fn test_write_csv_has_header_and_one_row_per_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/timebins.csv");

        write_report_csv(&path, &sample_report(), false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "index,midpoint_hours,mean,samples");
        assert_eq!(lines[1], "0,3.0,20.0,2");
    }

    #[test]
    fn test_write_csv_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timebins.csv");

        write_report_csv(&path, &sample_report(), false).unwrap();
        write_report_csv(&path, &sample_report(), false).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn test_write_gzip_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timebins.csv.gz");

        write_report_csv(&path, &sample_report(), true).unwrap();

        let mut decoded = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert!(decoded.starts_with("index,midpoint_hours,mean,samples"));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timebins.json");

        write_report_json(&path, &sample_report()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["bin_minutes"], 360.0);
        assert_eq!(value["bins"].as_array().unwrap().len(), 4);
    }
}
