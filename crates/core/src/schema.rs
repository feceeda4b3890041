use serde::{Deserialize, Serialize};

use crate::{ConfigError, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal { precision: u8, scale: u8 },
    Float,
    Double,
    Char { length: u32 },
    Varchar { length: u32 },
    Text,
    Blob,
    Date,
    DateTime,
    Timestamp,
    Time,
    Year,
}

impl HostType {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Int
                | Self::BigInt
                | Self::Decimal { .. }
                | Self::Float
                | Self::Double
                | Self::Year
        )
    }

    #[must_use]
    pub fn is_large_object(self) -> bool {
        matches!(self, Self::Text | Self::Blob)
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Self::Date | Self::DateTime | Self::Timestamp | Self::Time
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub host_type: HostType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, host_type: HostType) -> Self {
        Self {
            name: name.into(),
            host_type,
            nullable: true,
            auto_increment: false,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDef {
    pub name: String,
    pub columns: Vec<usize>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
}

impl KeyDef {
    pub fn primary(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: true,
            primary: true,
        }
    }

    pub fn index(name: impl Into<String>, columns: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            primary: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableDef {
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub keys: Vec<KeyDef>,
}

impl TableDef {
    #[must_use]
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: KeyDef) -> Self {
        self.keys.push(key);
        self
    }

    #[must_use]
    pub fn primary_key(&self) -> Option<&KeyDef> {
        self.keys.iter().find(|key| key.primary)
    }

    /// The column the remote fills from a sequence when the host leaves it NULL.
    #[must_use]
    pub fn auto_increment_column(&self) -> Option<usize> {
        self.columns.iter().position(|column| column.auto_increment)
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::InvalidField {
                key: "table".to_string(),
                field: "columns",
                value: "[]".to_string(),
            });
        }
        if self.columns.iter().filter(|column| column.auto_increment).count() > 1 {
            return Err(ConfigError::InvalidField {
                key: "table".to_string(),
                field: "auto_increment",
                value: "more than one column".to_string(),
            });
        }
        for key in &self.keys {
            if let Some(column) = key.columns.iter().find(|index| **index >= self.columns.len()) {
                return Err(ConfigError::InvalidField {
                    key: key.name.clone(),
                    field: "columns",
                    value: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Remote owner and table names for one shard link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub database: String,
    pub table: String,
}

impl LinkTarget {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub column: usize,
    pub order: SortOrder,
}

impl OrderKey {
    #[must_use]
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            order: SortOrder::Asc,
        }
    }

    #[must_use]
    pub fn desc(column: usize) -> Self {
        Self {
            column,
            order: SortOrder::Desc,
        }
    }
}

/// Offset and limit of a scan; `limit == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Page {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Page {
    pub const UNBOUNDED: Page = Page {
        offset: 0,
        limit: None,
    };

    #[must_use]
    pub fn new(offset: u64, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBound {
    pub values: Vec<FieldValue>,
    pub inclusive: bool,
}

/// A range over one key: every value of a bound but the last is matched by equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub key: usize,
    pub start: Option<KeyBound>,
    pub end: Option<KeyBound>,
}

impl KeyRange {
    #[must_use]
    pub fn exact(key: usize, values: Vec<FieldValue>) -> Self {
        Self {
            key,
            start: Some(KeyBound {
                values: values.clone(),
                inclusive: true,
            }),
            end: Some(KeyBound {
                values,
                inclusive: true,
            }),
        }
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => {
                start.inclusive && end.inclusive && start.values == end.values
            }
            _ => false,
        }
    }
}
