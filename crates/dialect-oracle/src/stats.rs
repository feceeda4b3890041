use tablelink_core::{
    CatalogAccessor, CatalogTable, Error, Result, StatementBuffer, TableStatistics,
    cardinality_from_record, cardinality_record,
};
use tracing::debug;

use crate::{
    errors::CURRVAL_NOT_DEFINED,
    handler::OracleHandler,
    quote::append_string_literal,
    session::{Connection, QueryKind},
};

/// Remote statistics for one link, cached in the catalog.
pub struct StatisticsReader<'a> {
    handler: &'a OracleHandler,
    catalog: &'a dyn CatalogAccessor,
    link: usize,
}

impl<'a> StatisticsReader<'a> {
    #[must_use]
    pub fn new(handler: &'a OracleHandler, catalog: &'a dyn CatalogAccessor, link: usize) -> Self {
        Self {
            handler,
            catalog,
            link,
        }
    }

    /// Exact row count by `COUNT(*)`; never cached.
    pub fn show_records(&self, connection: &mut Connection) -> Result<u64> {
        let table = self.handler.share().names().db_table_name(self.link)?;
        connection.exec_query_with(&format!("SELECT COUNT(*) FROM {table}"), QueryKind::Read, false)?;
        let count = single_integer(connection)?.map_or(Ok(0), non_negative)?;
        Ok(count)
    }

    /// Row count and lengths from the dictionary, falling back to `COUNT(*)`
    /// for tables that were never analyzed.
    pub fn show_table_status(
        &self,
        connection: &mut Connection,
        refresh: bool,
    ) -> Result<TableStatistics> {
        let key = self.catalog_key()?;
        if !refresh && let Some(record) = self.catalog.get(CatalogTable::TableStatistics, &key)? {
            debug!(key, "table statistics cache hit");
            return TableStatistics::from_record(&key, &record);
        }
        debug!(key, "table statistics cache miss");

        let sql = self.dictionary_query("SELECT NUM_ROWS, AVG_ROW_LEN FROM ALL_TABLES")?;
        connection.exec_query_with(&sql, QueryKind::Read, false)?;
        let analyzed = {
            let mut cursor = connection.store_result()?;
            match cursor.fetch_row()? {
                Some(row) => match (row.val_int(0)?, row.val_int(1)?) {
                    (Some(records), Some(mean)) => Some((records, mean)),
                    _ => None,
                },
                None => None,
            }
        };
        let statistics = match analyzed {
            Some((records, mean)) => {
                let records = non_negative(records)?;
                let mean_rec_length = non_negative(mean)?;
                TableStatistics {
                    records,
                    data_length: records.saturating_mul(mean_rec_length),
                    mean_rec_length,
                }
            }
            None => TableStatistics {
                records: self.show_records(connection)?,
                ..TableStatistics::default()
            },
        };
        self.catalog
            .put(CatalogTable::TableStatistics, &key, statistics.to_record())?;
        Ok(statistics)
    }

    /// Distinct-value counts per column from the dictionary.
    pub fn show_index(
        &self,
        connection: &mut Connection,
        refresh: bool,
    ) -> Result<Vec<(String, u64)>> {
        let key = self.catalog_key()?;
        if !refresh && let Some(record) = self.catalog.get(CatalogTable::ColumnStatistics, &key)? {
            debug!(key, "column statistics cache hit");
            return cardinality_from_record(&key, &record);
        }
        debug!(key, "column statistics cache miss");

        let sql = self.dictionary_query(
            "SELECT COLUMN_NAME, NUM_DISTINCT FROM ALL_TAB_COL_STATISTICS",
        )?;
        connection.exec_query_with(&sql, QueryKind::Read, false)?;
        let mut cardinality = Vec::new();
        {
            let mut cursor = connection.store_result()?;
            while let Some(row) = cursor.fetch_row()? {
                let Some(column) = row.val_str(0)? else {
                    continue;
                };
                let distinct = row.val_int(1)?.map_or(Ok(0), non_negative)?;
                cardinality.push((column.to_string(), distinct));
            }
        }
        cardinality.sort();
        self.catalog.put(
            CatalogTable::ColumnStatistics,
            &key,
            cardinality_record(&cardinality),
        )?;
        Ok(cardinality)
    }

    /// The value this session last drew from the link's sequence.
    ///
    /// `None` without a configured sequence or before the session drew one.
    pub fn show_last_insert_id(&self, connection: &mut Connection) -> Result<Option<u64>> {
        let Some(sequence) = self.handler.share().sequence(self.link)? else {
            return Ok(None);
        };
        let sql = format!("SELECT {sequence}.CURRVAL FROM DUAL");
        match connection.exec_query_with(&sql, QueryKind::Read, false) {
            Err(Error::Native(native)) if native.native_code == CURRVAL_NOT_DEFINED => {
                return Ok(None);
            }
            other => other?,
        }
        single_integer(connection)?.map(non_negative).transpose()
    }

    /// The next auto-increment value of the link's table.
    ///
    /// Read from the sequence dictionary when the link has a sequence,
    /// otherwise one past the column's current maximum.
    pub fn show_autoinc(&self, connection: &mut Connection) -> Result<Option<u64>> {
        let share = self.handler.share();
        let Some(column) = share.table().auto_increment_column() else {
            return Ok(None);
        };
        let link = share.config().link(self.link)?;
        if !link.sequence_name.is_empty() {
            let mut sql = StatementBuffer::new();
            sql.append("SELECT LAST_NUMBER FROM ALL_SEQUENCES WHERE SEQUENCE_OWNER = ")?;
            append_string_literal(&mut sql, &link.database)?;
            sql.append(" AND SEQUENCE_NAME = ")?;
            append_string_literal(&mut sql, &link.sequence_name)?;
            connection.exec_query_with(sql.as_str(), QueryKind::Read, false)?;
            let next = single_integer(connection)?.ok_or_else(|| {
                Error::invalid_state(format!(
                    "sequence {}.{} does not exist",
                    link.database, link.sequence_name
                ))
            })?;
            return non_negative(next).map(Some);
        }

        let mut sql = StatementBuffer::new();
        sql.append("SELECT MAX(")?;
        share.names().append_column_name(&mut sql, column, "")?;
        sql.append(") FROM ")?;
        share.names().append_table_name(&mut sql, self.link)?;
        connection.exec_query_with(sql.as_str(), QueryKind::Read, false)?;
        let next = match single_integer(connection)? {
            Some(max) => non_negative(max)?.saturating_add(1),
            None => 1,
        };
        debug!(table = %link.table, next, "auto-increment from column maximum");
        Ok(Some(next))
    }

    fn catalog_key(&self) -> Result<String> {
        let link = self.handler.share().config().link(self.link)?;
        Ok(format!("{}.{}", link.database, link.table))
    }

    fn dictionary_query(&self, select: &str) -> Result<String> {
        let link = self.handler.share().config().link(self.link)?;
        let mut sql = StatementBuffer::new();
        sql.append(select)?;
        sql.append(" WHERE OWNER = ")?;
        append_string_literal(&mut sql, &link.database)?;
        sql.append(" AND TABLE_NAME = ")?;
        append_string_literal(&mut sql, &link.table)?;
        Ok(sql.as_str().to_string())
    }
}

fn single_integer(connection: &mut Connection) -> Result<Option<i64>> {
    let mut cursor = connection.store_result()?;
    match cursor.fetch_row()? {
        Some(row) => row.val_int(0),
        None => Ok(None),
    }
}

fn non_negative(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::marshal(format!("negative statistic {value}")))
}
