//! Command-line names for settings and validation of textual values.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::{LogLevel, Settings, SettingsError};
use crate::bins::TimeBins;

/// A setting addressable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    DataRoot,
    DbFilename,
    DbPath,
    ReportPath,
    LogFilename,
    LogPath,
    DbWriteQueue,
    EnforceQuota,
    DataUsageQuotaGb,
    LoggerFormat,
    LogLevel,
    DashboardEnabled,
    DashboardQueueName,
    BwmonitorEnabled,
    SpeedtestClient,
    SpeedtestServerId,
    BinMinutes,
}

impl SettingKey {
    pub const ALL: [SettingKey; 17] = [
        SettingKey::DataRoot,
        SettingKey::DbFilename,
        SettingKey::DbPath,
        SettingKey::ReportPath,
        SettingKey::LogFilename,
        SettingKey::LogPath,
        SettingKey::DbWriteQueue,
        SettingKey::EnforceQuota,
        SettingKey::DataUsageQuotaGb,
        SettingKey::LoggerFormat,
        SettingKey::LogLevel,
        SettingKey::DashboardEnabled,
        SettingKey::DashboardQueueName,
        SettingKey::BwmonitorEnabled,
        SettingKey::SpeedtestClient,
        SettingKey::SpeedtestServerId,
        SettingKey::BinMinutes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::DataRoot => "data_root",
            SettingKey::DbFilename => "db_filename",
            SettingKey::DbPath => "db_path",
            SettingKey::ReportPath => "report_path",
            SettingKey::LogFilename => "log_filename",
            SettingKey::LogPath => "log_path",
            SettingKey::DbWriteQueue => "db_write_queue",
            SettingKey::EnforceQuota => "enforce_quota",
            SettingKey::DataUsageQuotaGb => "data_usage_quota_GB",
            SettingKey::LoggerFormat => "logger_format",
            SettingKey::LogLevel => "log_level",
            SettingKey::DashboardEnabled => "dashboard_enabled",
            SettingKey::DashboardQueueName => "dashboard_queue_name",
            SettingKey::BwmonitorEnabled => "bwmonitor_enabled",
            SettingKey::SpeedtestClient => "speedtest_client",
            SettingKey::SpeedtestServerId => "speedtest_server_id",
            SettingKey::BinMinutes => "bin_minutes",
        }
    }

    /// Whether reading this key needs the client id (per-client paths).
    pub fn needs_client_id(&self) -> bool {
        matches!(
            self,
            SettingKey::DbFilename | SettingKey::DbPath | SettingKey::ReportPath
        )
    }

    /// Whether `apply` accepts this key. Derived paths and queue names are read-only.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            SettingKey::DataRoot
                | SettingKey::EnforceQuota
                | SettingKey::DataUsageQuotaGb
                | SettingKey::LogLevel
                | SettingKey::DashboardEnabled
                | SettingKey::BwmonitorEnabled
                | SettingKey::SpeedtestClient
                | SettingKey::SpeedtestServerId
                | SettingKey::BinMinutes
        )
    }

    /// Reads the setting as text. `client_id` is only consulted for per-client paths.
    pub fn read(
        &self,
        settings: &Settings,
        client_id: impl FnOnce() -> std::io::Result<String>,
    ) -> Result<Option<String>, SettingsError> {
        let value = match self {
            SettingKey::DbFilename | SettingKey::DbPath | SettingKey::ReportPath => {
                if settings.data_root().is_none() {
                    return Ok(None);
                }
                let id = client_id().map_err(SettingsError::ClientId)?;
                match self {
                    SettingKey::DbFilename => settings.db_filename(&id),
                    SettingKey::DbPath => settings.db_path(&id),
                    _ => settings.report_path(&id),
                }
            }
            SettingKey::DataRoot => settings.data_root().map(str::to_string),
            SettingKey::LogFilename => Some(settings.log_filename()),
            SettingKey::LogPath => Some(settings.log_path()),
            SettingKey::DbWriteQueue => Some(settings.db_write_queue_name().to_string()),
            SettingKey::EnforceQuota => settings.speedtest_enforce_quota().map(|v| v.to_string()),
            SettingKey::DataUsageQuotaGb => settings.data_usage_quota_gb().map(|v| v.to_string()),
            SettingKey::LoggerFormat => Some(settings.logger_format().to_string()),
            SettingKey::LogLevel => settings.log_level().map(|l| l.to_string()),
            SettingKey::DashboardEnabled => Some(settings.dashboard_enabled().to_string()),
            SettingKey::DashboardQueueName => settings.dashboard_queue_name().map(str::to_string),
            SettingKey::BwmonitorEnabled => Some(settings.bandwidth_monitor_enabled().to_string()),
            SettingKey::SpeedtestClient => settings.speedtest_client().map(str::to_string),
            SettingKey::SpeedtestServerId => settings.speedtest_server_id().map(str::to_string),
            SettingKey::BinMinutes => Some(settings.bin_minutes().to_string()),
        };
        Ok(value)
    }

    /// Validates `value` and applies it to `settings` in memory.
    ///
    /// On error `settings` is left unchanged and the error message is suitable
    /// for showing to the user.
    pub fn apply(&self, settings: &mut Settings, value: &str) -> Result<(), SettingsError> {
        match self {
            SettingKey::DataUsageQuotaGb => {
                let quota = value.trim().parse::<u64>().map_err(|_| {
                    invalid("data_usage_quota_GB value must be a positive integer.")
                })?;
                settings.set_data_usage_quota_gb(quota);
            }
            SettingKey::EnforceQuota => {
                let flag = parse_flag(value)
                    .ok_or_else(|| invalid("enforce_quota value must be True or False"))?;
                settings.set_speedtest_enforce_quota(flag);
            }
            SettingKey::DataRoot => {
                if value.is_empty() || !Path::new(value).is_dir() {
                    return Err(invalid("Invalid path."));
                }
                settings.set_data_root(value);
            }
            SettingKey::LogLevel => {
                settings.set_log_level(value.parse::<LogLevel>()?);
            }
            SettingKey::DashboardEnabled => {
                let flag = parse_flag(value)
                    .ok_or_else(|| invalid("dashboard_enabled value must be True or False"))?;
                settings.set_dashboard_enabled(flag);
            }
            SettingKey::BwmonitorEnabled => {
                let flag = parse_flag(value)
                    .ok_or_else(|| invalid("bwmonitor_enabled value must be True or False"))?;
                settings.set_bandwidth_monitor_enabled(flag);
            }
            SettingKey::SpeedtestClient => match value.to_lowercase().as_str() {
                client @ ("ookla" | "speedtest-cli") => settings.set_speedtest_client(client),
                _ => {
                    return Err(invalid(
                        "speedtest_client value must be 'speedtest-cli' or 'ookla'",
                    ));
                }
            },
            SettingKey::SpeedtestServerId => {
                if value.is_empty() {
                    return Err(invalid("speedtest_server_id setting requires a value"));
                }
                settings.set_speedtest_server_id(value);
            }
            SettingKey::BinMinutes => {
                let minutes = value
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|m| TimeBins::new(f64::from(*m)).is_ok())
                    .ok_or_else(|| {
                        invalid("bin_minutes value must be an integer between 1 and 1440")
                    })?;
                settings.set_bin_minutes(minutes);
            }
            read_only => {
                return Err(SettingsError::InvalidValue(format!(
                    "{} cannot be set",
                    read_only.as_str()
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> SettingsError {
    SettingsError::InvalidValue(message.to_string())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| SettingsError::InvalidValue(format!("unknown setting '{s}'")))
    }
}
