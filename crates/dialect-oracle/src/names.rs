use tablelink_core::{Bookmark, ConfigError, LinkTarget, Result, StatementBuffer, TableDef};

use crate::quote::quote_identifier;

#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkNames {
    database: String,
    table: String,
    db_table: String,
}

/// Quoted remote names for every shard link of one table.
///
/// Built once when the table is opened. With padding enabled every
/// `"db"."table"` string is right-padded with spaces to the longest one, so a
/// statement built for one link can be retargeted by overwriting bytes in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTableNameCache {
    links: Vec<LinkNames>,
    columns: Vec<String>,
    db_name_max_length: usize,
    table_name_max_length: usize,
    db_table_max_length: usize,
    pad: bool,
}

impl RemoteTableNameCache {
    pub fn new(targets: &[LinkTarget], table: &TableDef, pad: bool) -> Result<Self> {
        if targets.is_empty() {
            return Err(ConfigError::NoLinks.into());
        }

        let links: Vec<LinkNames> = targets
            .iter()
            .map(|target| {
                let database = quote_identifier(&target.database);
                let table = quote_identifier(&target.table);
                let db_table = format!("{database}.{table}");
                LinkNames {
                    database,
                    table,
                    db_table,
                }
            })
            .collect();

        let max = |pick: fn(&LinkNames) -> usize| links.iter().map(pick).max().unwrap_or(0);
        Ok(Self {
            db_name_max_length: max(|names| names.database.len()),
            table_name_max_length: max(|names| names.table.len()),
            db_table_max_length: max(|names| names.db_table.len()),
            columns: table
                .columns
                .iter()
                .map(|column| quote_identifier(&column.name))
                .collect(),
            links,
            pad,
        })
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_padded(&self) -> bool {
        self.pad
    }

    pub fn db_name(&self, link: usize) -> Result<&str> {
        Ok(&self.link(link)?.database)
    }

    pub fn table_name(&self, link: usize) -> Result<&str> {
        Ok(&self.link(link)?.table)
    }

    pub fn db_table_name(&self, link: usize) -> Result<&str> {
        Ok(&self.link(link)?.db_table)
    }

    #[must_use]
    pub fn db_name_max_length(&self) -> usize {
        self.db_name_max_length
    }

    #[must_use]
    pub fn table_name_max_length(&self) -> usize {
        self.table_name_max_length
    }

    #[must_use]
    pub fn db_table_max_length(&self) -> usize {
        self.db_table_max_length
    }

    /// True when every link addresses the same remote table.
    #[must_use]
    pub fn same_db_table_name(&self) -> bool {
        self.links
            .windows(2)
            .all(|pair| pair[0].db_table == pair[1].db_table)
    }

    #[must_use]
    pub fn need_change_db_table_name(&self) -> bool {
        !self.same_db_table_name()
    }

    pub fn append_table_name(&self, buf: &mut StatementBuffer, link: usize) -> Result<()> {
        buf.append(self.db_table_name(link)?)
    }

    /// Appends the table name at a fresh [`Bookmark::TableName`], padded when enabled.
    pub fn append_table_name_with_adjusting(
        &self,
        buf: &mut StatementBuffer,
        link: usize,
    ) -> Result<()> {
        let name = self.adjusted_name(link)?;
        buf.bookmark(Bookmark::TableName);
        buf.append(&name)
    }

    pub fn append_from_with_adjusted_table_name(
        &self,
        buf: &mut StatementBuffer,
        link: usize,
    ) -> Result<()> {
        buf.append(" FROM ")?;
        self.append_table_name_with_adjusting(buf, link)
    }

    /// Rewrites the name at [`Bookmark::TableName`] from `from_link` to `to_link`.
    pub fn patch_table_name(
        &self,
        buf: &mut StatementBuffer,
        from_link: usize,
        to_link: usize,
    ) -> Result<()> {
        let position = buf.require(Bookmark::TableName)?;
        let name = self.adjusted_name(to_link)?;
        if self.pad {
            return buf.overwrite_at(position, &name);
        }
        let current = self.db_table_name(from_link)?.len();
        buf.splice(position..position + current, &name)?;
        Ok(())
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, index: usize) -> Result<&str> {
        self.columns.get(index).map(String::as_str).ok_or_else(|| {
            tablelink_core::Error::invalid_state(format!(
                "column {index} is out of range for a {}-column table",
                self.columns.len()
            ))
        })
    }

    /// Appends `alias` followed by the quoted column name.
    pub fn append_column_name(
        &self,
        buf: &mut StatementBuffer,
        index: usize,
        alias: &str,
    ) -> Result<()> {
        let name = self.column_name(index)?;
        buf.append(alias)?;
        buf.append(name)
    }

    fn adjusted_name(&self, link: usize) -> Result<String> {
        let name = self.db_table_name(link)?;
        if self.pad {
            Ok(format!("{name:<width$}", width = self.db_table_max_length))
        } else {
            Ok(name.to_string())
        }
    }

    fn link(&self, link: usize) -> Result<&LinkNames> {
        self.links.get(link).ok_or_else(|| {
            ConfigError::LinkOutOfRange {
                link,
                count: self.links.len(),
            }
            .into()
        })
    }
}
