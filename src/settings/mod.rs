//! Monitor settings.
//!
//! [`Settings`] is loaded from a JSON file, read through typed getters with
//! defaults, mutated in memory by the setters, and written back explicitly
//! with [`Settings::save`]:
//! ```json
//! {
//!     "data_root": "/mnt/usb_storage/netperf",
//!     "speedtest": { "enforce_quota": true, "data_usage_quota_GB": 20 },
//!     "logging": { "log_level": "INFO" },
//!     "reports": { "bin_minutes": 15 }
//! }
//! ```
//! [`SettingKey`] names each setting for the command line and validates
//! textual values before they are applied.

mod document;
mod keys;
mod log_level;

pub use keys::SettingKey;
pub use log_level::LogLevel;

use document::{
    BandwidthMonitorSection, DashboardSection, LoggingSection, ReportsSection, SettingsDocument,
    SpeedtestSection,
};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const APP_PATH: &str = "/opt/netperf";
pub const DEFAULT_SETTINGS_FILE: &str = "/opt/netperf/config/netperf.json";
pub const DEFAULT_DB_WRITE_QUEUE: &str = "/netperf.db";
pub const DEFAULT_LOG_PATH: &str = "/mnt/usb_storage/netperf/log";
pub const DEFAULT_LOGGER_FORMAT: &str = "%(asctime)s %(name)s %(levelname)s:%(message)s";
pub const DEFAULT_BIN_MINUTES: u32 = 60;
const LOG_FILE_NAME: &str = "netperf.log";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to derive client id: {0}")]
    ClientId(#[source] std::io::Error),

    /// A value given for a setting failed validation. The message is meant for the user.
    #[error("{0}")]
    InvalidValue(String),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Settings {
    document: SettingsDocument,
}

impl Settings {
    /// Loads settings from the JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| SettingsError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            document: serde_json::from_str(content)?,
        })
    }

    /// Writes the whole document to `path` as JSON indented by four spaces.
    ///
    /// The JSON goes to a temporary file in the same directory which is then
    /// renamed over `path`, so a failed save leaves the old file intact.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let mut ser = serde_json::Serializer::with_formatter(
                &mut writer,
                PrettyFormatter::with_indent(b"    "),
            );
            self.document
                .serialize(&mut ser)
                .map_err(|source| SettingsError::Json {
                    path: path.to_path_buf(),
                    source,
                })?;
            writer.write_all(b"\n").map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    // Paths

    pub fn data_root(&self) -> Option<&str> {
        self.document.data_root.as_deref()
    }

    fn trimmed_root(&self) -> Option<&str> {
        self.data_root().map(|root| root.trim_end_matches('/'))
    }

    pub fn db_path(&self, client_id: &str) -> Option<String> {
        self.trimmed_root()
            .map(|root| format!("{}/{}/database", root, client_id))
    }

    pub fn db_filename(&self, client_id: &str) -> Option<String> {
        self.db_path(client_id)
            .map(|dir| format!("{}/{}.db", dir, client_id))
    }

    pub fn report_path(&self, client_id: &str) -> Option<String> {
        self.trimmed_root()
            .map(|root| format!("{}/{}/reports", root, client_id))
    }

    pub fn log_path(&self) -> String {
        match self.trimmed_root() {
            Some(root) => format!("{}/log", root),
            None => DEFAULT_LOG_PATH.to_string(),
        }
    }

    pub fn log_filename(&self) -> String {
        format!("{}/{}", self.log_path(), LOG_FILE_NAME)
    }

    pub fn db_write_queue_name(&self) -> &str {
        self.document
            .db_write_queue
            .as_deref()
            .unwrap_or(DEFAULT_DB_WRITE_QUEUE)
    }

    // Speedtest

    pub fn speedtest_enforce_quota(&self) -> Option<bool> {
        self.document.speedtest.as_ref()?.enforce_quota
    }

    pub fn data_usage_quota_gb(&self) -> Option<u64> {
        self.document.speedtest.as_ref()?.data_usage_quota_gb
    }

    pub fn speedtest_client(&self) -> Option<&str> {
        self.document.speedtest.as_ref()?.client.as_deref()
    }

    pub fn speedtest_server_id(&self) -> Option<&str> {
        self.document.speedtest.as_ref()?.server_id.as_ref()?.as_deref()
    }

    // Logging

    pub fn logger_format(&self) -> &str {
        self.document
            .logging
            .as_ref()
            .and_then(|l| l.logger_format.as_deref())
            .unwrap_or(DEFAULT_LOGGER_FORMAT)
    }

    /// Configured log level, or `None` if unset or not a recognized name.
    pub fn log_level(&self) -> Option<LogLevel> {
        self.document
            .logging
            .as_ref()?
            .log_level
            .as_deref()?
            .parse()
            .ok()
    }

    // Dashboard and monitors

    pub fn dashboard_enabled(&self) -> bool {
        self.document
            .dashboard
            .as_ref()
            .and_then(|d| d.enabled)
            .unwrap_or(false)
    }

    pub fn dashboard_queue_name(&self) -> Option<&str> {
        self.document.dashboard.as_ref()?.queue_name.as_deref()
    }

    pub fn bandwidth_monitor_enabled(&self) -> bool {
        self.document
            .bandwidth_monitor
            .as_ref()
            .and_then(|b| b.enabled)
            .unwrap_or(false)
    }

    // Reports

    /// Width of the time-of-day bins used for daily reports.
    pub fn bin_minutes(&self) -> u32 {
        self.document
            .reports
            .as_ref()
            .and_then(|r| r.bin_minutes)
            .unwrap_or(DEFAULT_BIN_MINUTES)
    }

    // Setters. These only change the in-memory document; call `save` to persist.

    pub fn set_data_root(&mut self, path: &str) {
        self.document.data_root = Some(path.trim_end_matches('/').to_string());
    }

    pub fn set_data_usage_quota_gb(&mut self, quota_gb: u64) {
        self.speedtest_mut().data_usage_quota_gb = Some(quota_gb);
    }

    pub fn set_speedtest_enforce_quota(&mut self, flag: bool) {
        self.speedtest_mut().enforce_quota = Some(flag);
    }

    pub fn set_speedtest_client(&mut self, client: &str) {
        self.speedtest_mut().client = Some(client.to_string());
    }

    /// Sets the preferred speedtest server. The literal `"None"` clears it.
    pub fn set_speedtest_server_id(&mut self, server_id: &str) {
        self.speedtest_mut().server_id = match server_id {
            "None" => Some(None),
            id => Some(Some(id.to_string())),
        };
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.document
            .logging
            .get_or_insert_with(LoggingSection::default)
            .log_level = Some(level.to_string());
    }

    pub fn set_dashboard_enabled(&mut self, enabled: bool) {
        self.document
            .dashboard
            .get_or_insert_with(DashboardSection::default)
            .enabled = Some(enabled);
    }

    pub fn set_bandwidth_monitor_enabled(&mut self, enabled: bool) {
        self.document
            .bandwidth_monitor
            .get_or_insert_with(BandwidthMonitorSection::default)
            .enabled = Some(enabled);
    }

    pub fn set_bin_minutes(&mut self, bin_minutes: u32) {
        self.document
            .reports
            .get_or_insert_with(ReportsSection::default)
            .bin_minutes = Some(bin_minutes);
    }

    fn speedtest_mut(&mut self) -> &mut SpeedtestSection {
        self.document
            .speedtest
            .get_or_insert_with(SpeedtestSection::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = r#"{
        "data_root": "/mnt/usb_storage/netperf/",
        "db_write_queue": "/netperf_queue",
        "speedtest": {
            "enforce_quota": true,
            "data_usage_quota_GB": 20,
            "client": "ookla",
            "server_id": null
        },
        "logging": {
            "log_level": "DEBUG"
        },
        "dashboard": {
            "enabled": true,
            "queue_name": "/netperf_dash"
        },
        "interfaces": ["eth0", "wlan0"]
    }"#;

    fn sample() -> Settings {
        Settings::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn test_paths_strip_trailing_slash() {
        let s = sample();
        assert_eq!(s.data_root(), Some("/mnt/usb_storage/netperf/"));
        assert_eq!(
            s.db_filename("01234").as_deref(),
            Some("/mnt/usb_storage/netperf/01234/database/01234.db")
        );
        assert_eq!(
            s.db_path("01234").as_deref(),
            Some("/mnt/usb_storage/netperf/01234/database")
        );
        assert_eq!(
            s.report_path("01234").as_deref(),
            Some("/mnt/usb_storage/netperf/01234/reports")
        );
        assert_eq!(s.log_filename(), "/mnt/usb_storage/netperf/log/netperf.log");
    }

    #[test]
    fn test_defaults_for_empty_document() {
        let s = Settings::from_json("{}").unwrap();
        assert_eq!(s.data_root(), None);
        assert_eq!(s.db_filename("01234"), None);
        assert_eq!(s.report_path("01234"), None);
        assert_eq!(s.log_path(), DEFAULT_LOG_PATH);
        assert_eq!(s.log_filename(), "/mnt/usb_storage/netperf/log/netperf.log");
        assert_eq!(s.db_write_queue_name(), DEFAULT_DB_WRITE_QUEUE);
        assert_eq!(s.logger_format(), DEFAULT_LOGGER_FORMAT);
        assert_eq!(s.log_level(), None);
        assert_eq!(s.speedtest_enforce_quota(), None);
        assert_eq!(s.data_usage_quota_gb(), None);
        assert!(!s.dashboard_enabled());
        assert!(!s.bandwidth_monitor_enabled());
        assert_eq!(s.bin_minutes(), DEFAULT_BIN_MINUTES);
    }

    #[test]
    fn test_typed_getters() {
        let s = sample();
        assert_eq!(s.db_write_queue_name(), "/netperf_queue");
        assert_eq!(s.speedtest_enforce_quota(), Some(true));
        assert_eq!(s.data_usage_quota_gb(), Some(20));
        assert_eq!(s.speedtest_client(), Some("ookla"));
        assert_eq!(s.speedtest_server_id(), None);
        assert_eq!(s.log_level(), Some(LogLevel::Debug));
        assert!(s.dashboard_enabled());
        assert_eq!(s.dashboard_queue_name(), Some("/netperf_dash"));
    }

    #[test]
    fn test_unknown_log_level_reads_as_unset() {
        let s = Settings::from_json(r#"{"logging": {"log_level": "VERBOSE"}}"#).unwrap();
        assert_eq!(s.log_level(), None);
    }

    #[test]
    fn test_setters_create_missing_sections() {
        let mut s = Settings::default();
        s.set_data_usage_quota_gb(5);
        s.set_speedtest_enforce_quota(false);
        s.set_log_level(LogLevel::Warning);
        s.set_dashboard_enabled(true);
        s.set_bandwidth_monitor_enabled(true);
        s.set_bin_minutes(15);

        assert_eq!(s.data_usage_quota_gb(), Some(5));
        assert_eq!(s.speedtest_enforce_quota(), Some(false));
        assert_eq!(s.log_level(), Some(LogLevel::Warning));
        assert!(s.dashboard_enabled());
        assert!(s.bandwidth_monitor_enabled());
        assert_eq!(s.bin_minutes(), 15);
    }

    #[test]
    fn test_set_data_root_strips_trailing_slash() {
        let mut s = Settings::default();
        s.set_data_root("/data/netperf//");
        assert_eq!(s.data_root(), Some("/data/netperf"));
    }

    #[test]
    fn test_server_id_none_clears() {
        let mut s = sample();
        s.set_speedtest_server_id("1234");
        assert_eq!(s.speedtest_server_id(), Some("1234"));

        s.set_speedtest_server_id("None");
        assert_eq!(s.speedtest_server_id(), None);
    }

    #[test]
    fn test_save_then_load_keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netperf.json");

        let mut s = sample();
        s.set_data_usage_quota_gb(40);
        s.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    \"data_root\""));
        assert!(content.contains("\"interfaces\""));
        assert!(content.contains("\"server_id\": null"));

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.data_usage_quota_gb(), Some(40));
    }

    #[test]
    fn test_save_omits_server_id_never_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netperf.json");

        let mut s = Settings::default();
        s.set_data_usage_quota_gb(5);
        s.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains("server_id"));
        assert_eq!(Settings::load(&path).unwrap(), s);
    }

    #[test]
    fn test_save_writes_cleared_server_id_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netperf.json");

        let mut s = Settings::default();
        s.set_speedtest_server_id("1234");
        s.set_speedtest_server_id("None");
        s.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"server_id\": null"));
        assert_eq!(Settings::load(&path).unwrap().speedtest_server_id(), None);
    }

    #[test]
    fn test_save_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netperf.json");
        fs::write(&path, SAMPLE).unwrap();

        sample().save(&path).unwrap();
        sample().save(&path).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["netperf.json"]);
        assert_eq!(Settings::load(&path).unwrap(), sample());
    }

    #[test]
    fn test_failed_save_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/netperf.json");

        let err = sample().save(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_save_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netperf.json");
        fs::write(&path, "x".repeat(4096)).unwrap();

        Settings::default().save(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/netperf.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("netperf.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json { .. }));
    }
}
