use std::{collections::BTreeMap, fs, path::Path, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{CatalogRecord, ConfigError, LinkTarget};

const DEFAULT_WRAPPER: &str = "oracle";
const DEFAULT_PORT: u16 = 1521;
const DEFAULT_BULK_SIZE: usize = 16000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;
const DEFAULT_NET_TIMEOUT_SECS: u64 = 600;
const DEFAULT_CONNECT_RETRY_COUNT: u32 = 2;
const DEFAULT_CONNECT_RETRY_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    Ok,
    Recovery,
    NoRecovery,
}

impl LinkStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Recovery => "recovery",
            Self::NoRecovery => "no_recovery",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "ok" => Some(Self::Ok),
            "recovery" => Some(Self::Recovery),
            "no_recovery" => Some(Self::NoRecovery),
            _ => None,
        }
    }
}

/// One configured shard link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub service: String,
    #[serde(default = "default_wrapper")]
    pub wrapper: String,
    pub database: String,
    pub table: String,
    #[serde(default)]
    pub link_status: LinkStatus,
    /// Remote sequence feeding the auto-increment column; empty when none.
    #[serde(default)]
    pub sequence_name: String,
}

impl LinkConfig {
    #[must_use]
    pub fn target(&self) -> LinkTarget {
        LinkTarget::new(self.database.clone(), self.table.clone())
    }

    #[must_use]
    pub fn to_record(&self) -> CatalogRecord {
        [
            ("host", self.host.clone()),
            ("port", self.port.to_string()),
            ("username", self.user.clone()),
            ("password", self.password.clone()),
            ("service", self.service.clone()),
            ("wrapper", self.wrapper.clone()),
            ("db_name", self.database.clone()),
            ("table_name", self.table.clone()),
            ("link_status", self.link_status.as_str().to_string()),
            ("sequence_name", self.sequence_name.clone()),
        ]
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
    }

    pub fn from_record(key: &str, record: &CatalogRecord) -> Result<Self, ConfigError> {
        let required = |field: &'static str| {
            record
                .get(field)
                .cloned()
                .ok_or_else(|| ConfigError::MissingField {
                    key: key.to_string(),
                    field,
                })
        };

        let port = match record.get("port") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidField {
                key: key.to_string(),
                field: "port",
                value: value.clone(),
            })?,
            None => DEFAULT_PORT,
        };
        let link_status = match record.get("link_status") {
            Some(value) => LinkStatus::parse(value).ok_or_else(|| ConfigError::InvalidField {
                key: key.to_string(),
                field: "link_status",
                value: value.clone(),
            })?,
            None => LinkStatus::Ok,
        };

        Ok(Self {
            host: required("host")?,
            port,
            user: required("username")?,
            password: record.get("password").cloned().unwrap_or_default(),
            service: required("service")?,
            wrapper: record
                .get("wrapper")
                .cloned()
                .unwrap_or_else(default_wrapper),
            database: required("db_name")?,
            table: required("table_name")?,
            link_status,
            sequence_name: record.get("sequence_name").cloned().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_connect_timeout")]
    pub connect_secs: u64,
    #[serde(default = "default_net_timeout")]
    pub read_secs: u64,
    #[serde(default = "default_net_timeout")]
    pub write_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_secs: DEFAULT_NET_TIMEOUT_SECS,
            write_secs: DEFAULT_NET_TIMEOUT_SECS,
        }
    }
}

impl Timeouts {
    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read_secs)
    }

    #[must_use]
    pub fn write(&self) -> Duration {
        Duration::from_secs(self.write_secs)
    }
}

/// How a batch of join keys reaches the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BkaMode {
    /// Keys are inserted into a transient table joined against the target.
    #[default]
    TemporaryTable,
    /// Keys are inlined as a `UNION ALL` of single-row selects.
    UnionAll,
}

/// Optimizer hint attached to SELECTs that read through one host key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyHint {
    Index,
    IndexAsc,
    IndexDesc,
    NoIndex,
}

impl KeyHint {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Index => "INDEX",
            Self::IndexAsc => "INDEX_ASC",
            Self::IndexDesc => "INDEX_DESC",
            Self::NoIndex => "NO_INDEX",
        }
    }
}

/// Options for the transient tables used by batched key access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BkaOptions {
    #[serde(default)]
    pub mode: BkaMode,
    #[serde(default = "default_true")]
    pub temporary: bool,
    #[serde(default)]
    pub storage_clause: String,
    #[serde(default)]
    pub national_charset: bool,
}

impl Default for BkaOptions {
    fn default() -> Self {
        Self {
            mode: BkaMode::TemporaryTable,
            temporary: true,
            storage_clause: "ON COMMIT PRESERVE ROWS".to_string(),
            national_charset: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub links: Vec<LinkConfig>,
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    #[serde(default)]
    pub pad_table_names: bool,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default = "default_connect_retry_count")]
    pub connect_retry_count: u32,
    #[serde(default = "default_connect_retry_interval_ms")]
    pub connect_retry_interval_ms: u64,
    #[serde(default)]
    pub bka: BkaOptions,
    /// Hints keyed by host key name.
    #[serde(default)]
    pub key_hints: BTreeMap<String, KeyHint>,
}

impl AdapterConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.links.is_empty() {
            return Err(ConfigError::NoLinks);
        }
        for (index, link) in self.links.iter().enumerate() {
            if link.table.is_empty() {
                return Err(ConfigError::MissingField {
                    key: index.to_string(),
                    field: "table",
                });
            }
        }
        Ok(())
    }

    pub fn link(&self, link: usize) -> Result<&LinkConfig, ConfigError> {
        self.links.get(link).ok_or(ConfigError::LinkOutOfRange {
            link,
            count: self.links.len(),
        })
    }

    #[must_use]
    pub fn targets(&self) -> Vec<LinkTarget> {
        self.links.iter().map(LinkConfig::target).collect()
    }

    #[must_use]
    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_millis(self.connect_retry_interval_ms)
    }
}

/// Timeouts shared between configuration reloads and live connections.
///
/// Connections read it before every statement.
#[derive(Debug, Clone, Default)]
pub struct TimeoutSource(Arc<RwLock<Timeouts>>);

impl TimeoutSource {
    #[must_use]
    pub fn new(timeouts: Timeouts) -> Self {
        Self(Arc::new(RwLock::new(timeouts)))
    }

    #[must_use]
    pub fn get(&self) -> Timeouts {
        *self.0.read()
    }

    pub fn set(&self, timeouts: Timeouts) {
        *self.0.write() = timeouts;
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_wrapper() -> String {
    DEFAULT_WRAPPER.to_string()
}

fn default_bulk_size() -> usize {
    DEFAULT_BULK_SIZE
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_net_timeout() -> u64 {
    DEFAULT_NET_TIMEOUT_SECS
}

fn default_connect_retry_count() -> u32 {
    DEFAULT_CONNECT_RETRY_COUNT
}

fn default_connect_retry_interval_ms() -> u64 {
    DEFAULT_CONNECT_RETRY_INTERVAL_MS
}
