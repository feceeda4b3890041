use std::{collections::BTreeMap, sync::Arc};

use serde::Deserialize;
use tablelink_core::{
    AdapterConfig, BkaMode, BkaOptions, ConfigError, Error, KeyHint, LinkConfig, LinkStatus,
    Result, TableDef, Timeouts,
};
use tablelink_dialect_oracle::OracleShare;

use crate::SqliteRemote;

const DEFAULT_DATABASE: &str = "main";
const DEFAULT_BULK_SIZE: usize = 16000;
const FIXTURE_SOURCE_LABEL: &str = "yaml fixture";

/// A remote table layout plus the SQL that seeds it.
///
/// Every entry of `tables` becomes one shard link onto the same remote
/// database, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteFixture {
    pub setup: String,
    pub database: Option<String>,
    pub tables: Vec<String>,
    pub table: TableDef,
    pub pad_table_names: bool,
    pub bulk_size: Option<usize>,
    pub recovering_links: Vec<usize>,
    /// Sequence name given to every link.
    pub sequence: Option<String>,
    pub bka_mode: BkaMode,
    pub bka_temporary: bool,
    pub key_hints: BTreeMap<String, KeyHint>,
}

impl RemoteFixture {
    #[must_use]
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn adapter_config(&self) -> Result<AdapterConfig> {
        let links = self
            .tables
            .iter()
            .enumerate()
            .map(|(index, table)| LinkConfig {
                host: "localhost".to_string(),
                port: 1521,
                user: "tablelink".to_string(),
                password: String::new(),
                service: "sqlite".to_string(),
                wrapper: "oracle".to_string(),
                database: self.database().to_string(),
                table: table.clone(),
                link_status: if self.recovering_links.contains(&index) {
                    LinkStatus::Recovery
                } else {
                    LinkStatus::Ok
                },
                sequence_name: self.sequence.clone().unwrap_or_default(),
            })
            .collect();
        let config = AdapterConfig {
            links,
            bulk_size: self.bulk_size.unwrap_or(DEFAULT_BULK_SIZE),
            pad_table_names: self.pad_table_names,
            timeouts: Timeouts::default(),
            connect_retry_count: 0,
            connect_retry_interval_ms: 0,
            bka: BkaOptions {
                mode: self.bka_mode,
                temporary: self.bka_temporary,
                storage_clause: String::new(),
                national_charset: false,
            },
            key_hints: self.key_hints.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    /// A fresh remote with `setup` applied.
    pub fn remote(&self) -> Result<Arc<SqliteRemote>> {
        let remote = SqliteRemote::new()
            .map_err(|source| Error::invalid_state(format!("sqlite remote: {source}")))?;
        remote.execute_batch(&self.setup).map_err(|source| {
            Error::invalid_state(format!(
                "fixture setup failed: {source}; setup was: {}",
                source_excerpt(&self.setup)
            ))
        })?;
        Ok(Arc::new(remote))
    }

    pub fn open_share(&self) -> Result<Arc<OracleShare>> {
        OracleShare::open(self.table.clone(), self.adapter_config()?)
    }
}

pub fn load_fixtures_from_str(yaml: &str) -> Result<BTreeMap<String, RemoteFixture>> {
    serde_yaml::from_str(yaml).map_err(|source| Error::Config(ConfigError::Parse(source)))
}

/// Loads the fixture `name`, failing when the document does not define it.
pub fn load_fixture(yaml: &str, name: &str) -> Result<RemoteFixture> {
    load_fixtures_from_str(yaml)?
        .remove(name)
        .ok_or_else(|| {
            Error::invalid_state(format!(
                "fixture `{name}` not found in {}",
                source_excerpt(yaml)
            ))
        })
}

fn source_excerpt(source: &str) -> String {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return FIXTURE_SOURCE_LABEL.to_string();
    }

    const MAX_CHARS: usize = 256;
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_string();
    }

    let mut excerpt: String = trimmed.chars().take(MAX_CHARS).collect();
    excerpt.push_str("...");
    excerpt
}
