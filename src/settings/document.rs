//! Serde model of the settings JSON file.
//!
//! Every section and key is optional. Keys this crate does not know about
//! are kept in `extra` so that saving never drops them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SettingsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) data_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) db_write_queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) speedtest: Option<SpeedtestSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) logging: Option<LoggingSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) dashboard: Option<DashboardSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) bandwidth_monitor: Option<BandwidthMonitorSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) reports: Option<ReportsSection>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SpeedtestSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) enforce_quota: Option<bool>,
    #[serde(
        rename = "data_usage_quota_GB",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) data_usage_quota_gb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) client: Option<String>,
    /// Outer `None`: key absent. `Some(None)`: present as `null` or cleared.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub(crate) server_id: Option<Option<String>>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LoggingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) logger_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) log_level: Option<String>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DashboardSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) queue_name: Option<String>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BandwidthMonitorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) enabled: Option<bool>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ReportsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) bin_minutes: Option<u32>,
    #[serde(flatten)]
    pub(crate) extra: Map<String, Value>,
}

/// Marks a key that appeared in the document, even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
