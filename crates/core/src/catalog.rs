use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::{Error, Result};

/// Tables reached through the catalog accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogTable {
    Links,
    XaFailures,
    TableStatistics,
    ColumnStatistics,
}

impl CatalogTable {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::XaFailures => "xa_failed_log",
            Self::TableStatistics => "table_sts",
            Self::ColumnStatistics => "table_crd",
        }
    }
}

pub type CatalogRecord = BTreeMap<String, String>;

/// Row-keyed read/write access to the persisted catalog tables.
pub trait CatalogAccessor: Send + Sync {
    fn get(&self, table: CatalogTable, key: &str) -> Result<Option<CatalogRecord>>;

    fn put(&self, table: CatalogTable, key: &str, record: CatalogRecord) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Mutex<HashMap<(CatalogTable, String), CatalogRecord>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self, table: CatalogTable) -> Vec<(String, CatalogRecord)> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .iter()
            .filter(|((owner, _), _)| *owner == table)
            .map(|((_, key), record)| (key.clone(), record.clone()))
            .collect();
        records.sort_by(|left, right| left.0.cmp(&right.0));
        records
    }
}

impl CatalogAccessor for MemoryCatalog {
    fn get(&self, table: CatalogTable, key: &str) -> Result<Option<CatalogRecord>> {
        Ok(self.records.lock().get(&(table, key.to_string())).cloned())
    }

    fn put(&self, table: CatalogTable, key: &str, record: CatalogRecord) -> Result<()> {
        self.records.lock().insert((table, key.to_string()), record);
        Ok(())
    }
}

/// Cached row count and sizes for one remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableStatistics {
    pub records: u64,
    pub data_length: u64,
    pub mean_rec_length: u64,
}

impl TableStatistics {
    #[must_use]
    pub fn to_record(&self) -> CatalogRecord {
        BTreeMap::from([
            ("records".to_string(), self.records.to_string()),
            ("data_length".to_string(), self.data_length.to_string()),
            ("mean_rec_length".to_string(), self.mean_rec_length.to_string()),
        ])
    }

    pub fn from_record(key: &str, record: &CatalogRecord) -> Result<Self> {
        Ok(Self {
            records: parse_count(key, record, "records")?,
            data_length: parse_count(key, record, "data_length")?,
            mean_rec_length: parse_count(key, record, "mean_rec_length")?,
        })
    }
}

/// Per-column cardinality, keyed by column name.
pub fn cardinality_record(cardinality: &[(String, u64)]) -> CatalogRecord {
    cardinality
        .iter()
        .map(|(column, value)| (column.clone(), value.to_string()))
        .collect()
}

pub fn cardinality_from_record(key: &str, record: &CatalogRecord) -> Result<Vec<(String, u64)>> {
    record
        .iter()
        .map(|(column, value)| {
            value
                .parse::<u64>()
                .map(|parsed| (column.clone(), parsed))
                .map_err(|_| invalid_count(key, column, value))
        })
        .collect()
}

fn parse_count(key: &str, record: &CatalogRecord, field: &str) -> Result<u64> {
    let value = record.get(field).ok_or_else(|| {
        Error::invalid_state(format!("statistics record `{key}` is missing `{field}`"))
    })?;
    value
        .parse::<u64>()
        .map_err(|_| invalid_count(key, field, value))
}

fn invalid_count(key: &str, field: &str, value: &str) -> Error {
    Error::invalid_state(format!(
        "statistics record `{key}` has non-numeric `{field}` value `{value}`"
    ))
}
