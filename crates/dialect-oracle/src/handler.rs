use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tablelink_core::{
    AdapterConfig, Bookmark, ConditionSerializer, Error, Expr, HostRow, KeyBound, KeyDef,
    KeyRange, OrderKey, Page, Result, StatementBuffer, TableDef, TableLockMode,
};
use tracing::debug;

use crate::{
    names::RemoteTableNameCache,
    pagination::{self, OrderTerm},
    quote::{append_column_value, quote_identifier},
    serializer::OracleSerializer,
    session::{Connection, QueryKind, lock_table_statement},
};

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Per-table state shared by every handler opened on it.
#[derive(Debug)]
pub struct OracleShare {
    table: TableDef,
    names: RemoteTableNameCache,
    serializer: OracleSerializer,
    config: AdapterConfig,
    bka_sequence: AtomicU64,
}

impl OracleShare {
    pub fn open(table: TableDef, config: AdapterConfig) -> Result<Arc<Self>> {
        table.validate()?;
        config.validate()?;
        let names = RemoteTableNameCache::new(&config.targets(), &table, config.pad_table_names)?;
        let serializer = OracleSerializer::new(
            (0..names.column_count())
                .map(|index| names.column_name(index).map(str::to_string))
                .collect::<Result<_>>()?,
        );
        Ok(Arc::new(Self {
            table,
            names,
            serializer,
            config,
            bka_sequence: AtomicU64::new(0),
        }))
    }

    #[must_use]
    pub fn table(&self) -> &TableDef {
        &self.table
    }

    #[must_use]
    pub fn names(&self) -> &RemoteTableNameCache {
        &self.names
    }

    #[must_use]
    pub fn serializer(&self) -> &OracleSerializer {
        &self.serializer
    }

    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub(crate) fn next_bka_sequence(&self) -> u64 {
        self.bka_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// `"db"."sequence"` feeding `link`'s auto-increment column, if one is configured.
    pub fn sequence(&self, link: usize) -> Result<Option<String>> {
        let name = &self.config.link(link)?.sequence_name;
        if name.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!(
            "{}.{}",
            self.names.db_name(link)?,
            quote_identifier(name)
        )))
    }

    pub fn key(&self, key: usize) -> Result<&KeyDef> {
        self.table.keys.get(key).ok_or_else(|| {
            Error::invalid_state(format!(
                "key {key} is out of range for a table with {} keys",
                self.table.keys.len()
            ))
        })
    }

    /// Appends `col, col, ...` for `columns`, each prefixed by `alias`.
    pub fn append_column_list(
        &self,
        buf: &mut StatementBuffer,
        columns: &[usize],
        alias: &str,
    ) -> Result<()> {
        for (position, column) in columns.iter().enumerate() {
            if position > 0 {
                buf.append(", ")?;
            }
            self.names.append_column_name(buf, *column, alias)?;
        }
        Ok(())
    }

    /// Appends `column = value`, or `column IS NULL` for a NULL value.
    pub fn append_column_equals(
        &self,
        buf: &mut StatementBuffer,
        column: usize,
        value: Option<&[u8]>,
        alias: &str,
    ) -> Result<()> {
        self.names.append_column_name(buf, column, alias)?;
        match value {
            None => buf.append(" IS NULL"),
            Some(_) => {
                buf.append(" = ")?;
                append_column_value(buf, self.host_type(column)?, value)
            }
        }
    }

    /// Appends the key-range predicate after [`Bookmark::Where`].
    pub fn append_key_where(
        &self,
        buf: &mut StatementBuffer,
        range: &KeyRange,
        alias: &str,
    ) -> Result<()> {
        let columns = self.key(range.key)?.columns.clone();
        if range.is_exact()
            && let Some(start) = &range.start
        {
            for (column, value) in columns.iter().zip(&start.values) {
                append_condition_joiner(buf)?;
                self.append_column_equals(buf, *column, value.as_deref(), alias)?;
            }
            return Ok(());
        }

        let mut equal_prefix = 0;
        for (bound, lower) in [(&range.start, true), (&range.end, false)] {
            let Some(bound) = bound else { continue };
            let Some((last, prefix)) = bound.values.split_last() else {
                continue;
            };
            for (column, value) in columns.iter().zip(prefix).skip(equal_prefix) {
                append_condition_joiner(buf)?;
                self.append_column_equals(buf, *column, value.as_deref(), alias)?;
            }
            equal_prefix = equal_prefix.max(prefix.len());
            let column = *columns.get(prefix.len()).ok_or_else(|| {
                Error::invalid_state(format!(
                    "range has {} values for a {}-column key",
                    bound.values.len(),
                    columns.len()
                ))
            })?;
            self.append_bound(buf, column, last.as_deref(), bound, lower, alias)?;
        }
        Ok(())
    }

    /// Appends a pushed-down predicate. Returns `false`, leaving `buf` untouched, when
    /// the predicate cannot be rendered remotely.
    pub fn append_condition(
        &self,
        buf: &mut StatementBuffer,
        condition: &Expr,
        alias: &str,
    ) -> Result<bool> {
        let start = buf.len();
        append_condition_joiner(buf)?;
        buf.append_char('(')?;
        match self.serializer.serialize(condition, Some(&mut *buf), alias) {
            Ok(()) => {
                buf.append_char(')')?;
                Ok(true)
            }
            Err(Error::Unsupported) => {
                buf.truncate(start)?;
                debug!("condition is evaluated locally");
                Ok(false)
            }
            Err(error) => {
                buf.truncate(start)?;
                Err(error)
            }
        }
    }

    /// Appends a WHERE clause identifying the row `row`.
    ///
    /// Uses the primary key when there is one. Otherwise every comparable
    /// column is matched and the statement is limited to one row by identifier.
    pub fn append_row_identity(
        &self,
        buf: &mut StatementBuffer,
        row: &HostRow,
        link: usize,
    ) -> Result<()> {
        buf.bookmark(Bookmark::Where);
        if let Some(primary) = self.table.primary_key() {
            for column in &primary.columns {
                append_condition_joiner(buf)?;
                self.append_column_equals(buf, *column, row.get(*column), "")?;
            }
            return Ok(());
        }

        for (column, definition) in self.table.columns.iter().enumerate() {
            if definition.host_type.is_large_object() {
                continue;
            }
            append_condition_joiner(buf)?;
            self.append_column_equals(buf, column, row.get(column), "")?;
        }
        pagination::apply_to_dml(buf, Page::new(0, Some(1)), &[], &self.names, link)?;
        Ok(())
    }

    fn append_bound(
        &self,
        buf: &mut StatementBuffer,
        column: usize,
        value: Option<&[u8]>,
        bound: &KeyBound,
        lower: bool,
        alias: &str,
    ) -> Result<()> {
        match (value, lower, bound.inclusive) {
            (None, true, true) => Ok(()),
            (None, true, false) => {
                append_condition_joiner(buf)?;
                self.names.append_column_name(buf, column, alias)?;
                buf.append(" IS NOT NULL")
            }
            (None, false, true) => {
                append_condition_joiner(buf)?;
                self.names.append_column_name(buf, column, alias)?;
                buf.append(" IS NULL")
            }
            (None, false, false) => {
                append_condition_joiner(buf)?;
                buf.append("1 = 0")
            }
            (Some(_), lower, inclusive) => {
                append_condition_joiner(buf)?;
                self.names.append_column_name(buf, column, alias)?;
                buf.append(match (lower, inclusive) {
                    (true, true) => " >= ",
                    (true, false) => " > ",
                    (false, true) => " <= ",
                    (false, false) => " < ",
                })?;
                append_column_value(buf, self.host_type(column)?, value)
            }
        }
    }

    fn host_type(&self, column: usize) -> Result<tablelink_core::HostType> {
        self.table
            .columns
            .get(column)
            .map(|definition| definition.host_type)
            .ok_or_else(|| Error::invalid_state(format!("column {column} is out of range")))
    }
}

/// Appends ` WHERE ` or ` AND ` depending on what follows [`Bookmark::Where`].
pub fn append_condition_joiner(buf: &mut StatementBuffer) -> Result<()> {
    let where_pos = buf.require(Bookmark::Where)?;
    if buf.len() == where_pos {
        buf.append(" WHERE ")
    } else {
        buf.append(" AND ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    Analyze,
    Check,
    Optimize,
    Repair,
    DisableKeys,
    EnableKeys,
}

/// Statement state of one open handler on a shared table.
#[derive(Debug)]
pub struct OracleHandler {
    share: Arc<OracleShare>,
    id: u64,
    sql: StatementBuffer,
    insert_sql: StatementBuffer,
    update_sql: StatementBuffer,
    exec_sql: StatementBuffer,
    link: usize,
    row_numbered: bool,
    order_keys: Vec<OrderKey>,
    hint_key: Option<usize>,
    insert_link: usize,
    insert_rows: usize,
}

impl OracleHandler {
    #[must_use]
    pub fn new(share: Arc<OracleShare>) -> Self {
        Self {
            share,
            id: NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed),
            sql: StatementBuffer::new(),
            insert_sql: StatementBuffer::new(),
            update_sql: StatementBuffer::new(),
            exec_sql: StatementBuffer::new(),
            link: 0,
            row_numbered: false,
            order_keys: Vec::new(),
            hint_key: None,
            insert_link: 0,
            insert_rows: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn share(&self) -> &Arc<OracleShare> {
        &self.share
    }

    #[must_use]
    pub fn link(&self) -> usize {
        self.link
    }

    #[must_use]
    pub fn sql(&self) -> &StatementBuffer {
        &self.sql
    }

    #[must_use]
    pub fn insert_sql(&self) -> &StatementBuffer {
        &self.insert_sql
    }

    #[must_use]
    pub fn update_sql(&self) -> &StatementBuffer {
        &self.update_sql
    }

    #[must_use]
    pub fn is_row_numbered(&self) -> bool {
        self.row_numbered
    }

    pub fn reset_select(&mut self, link: usize) -> Result<()> {
        self.share.names.db_table_name(link)?;
        self.sql.reset();
        self.link = link;
        self.row_numbered = false;
        self.order_keys.clear();
        self.hint_key = None;
        self.sql.append("SELECT ")?;
        self.sql.bookmark(Bookmark::SelectList);
        Ok(())
    }

    /// Selects `columns`, or every column when empty, from the handler's link.
    pub fn append_select_part(&mut self, columns: &[usize]) -> Result<()> {
        if columns.is_empty() {
            let all: Vec<usize> = (0..self.share.table.columns.len()).collect();
            self.share.append_column_list(&mut self.sql, &all, "")?;
        } else {
            self.share.append_column_list(&mut self.sql, columns, "")?;
        }
        self.append_from()
    }

    /// Selects only the columns of `key`.
    pub fn append_key_select_part(&mut self, key: usize) -> Result<()> {
        let columns = self.share.key(key)?.columns.clone();
        self.share.append_column_list(&mut self.sql, &columns, "")?;
        self.append_from()
    }

    /// Constrains the SELECT to `range` and asks for the key's configured hint.
    pub fn append_key_where(&mut self, range: &KeyRange) -> Result<()> {
        self.append_key_hint(range.key)?;
        self.share.append_key_where(&mut self.sql, range, "")
    }

    /// Marks the SELECT as reading through `key`; false when no hint is configured for it.
    ///
    /// The hint itself names the target table, so it is rendered per link by
    /// [`OracleHandler::set_sql_for_exec`].
    pub fn append_key_hint(&mut self, key: usize) -> Result<bool> {
        let name = &self.share.key(key)?.name;
        let hinted = self.share.config.key_hints.contains_key(name);
        if hinted {
            self.hint_key = Some(key);
        }
        Ok(hinted)
    }

    pub fn append_condition(&mut self, condition: &Expr) -> Result<bool> {
        self.share.append_condition(&mut self.sql, condition, "")
    }

    pub fn append_order_by(&mut self, keys: &[OrderKey]) -> Result<()> {
        self.order_keys = keys.to_vec();
        self.sql.bookmark(Bookmark::Order);
        if keys.is_empty() {
            return Ok(());
        }
        self.sql.append(" ORDER BY ")?;
        let terms = OrderTerm::from_keys(keys, "");
        pagination::append_order_terms(&mut self.sql, &terms, &self.share.names)
    }

    /// Wraps the SELECT for `page`; the numbering follows the ORDER BY keys.
    pub fn append_limit(&mut self, page: Page) -> Result<()> {
        if self.row_numbered {
            return pagination::reappend_limit(&mut self.sql, page);
        }
        let terms = OrderTerm::from_keys(&self.order_keys, "");
        self.row_numbered =
            pagination::apply_to_select(&mut self.sql, page, &terms, &self.share.names)?;
        Ok(())
    }

    pub fn reappend_limit(&mut self, page: Page) -> Result<()> {
        if !self.row_numbered {
            return self.append_limit(page);
        }
        pagination::reappend_limit(&mut self.sql, page)
    }

    /// `FOR UPDATE` cannot follow a row-numbered subquery, so it is skipped there.
    pub fn append_select_lock(&mut self, for_update: bool) -> Result<()> {
        self.sql.bookmark(Bookmark::Lock);
        if for_update && !self.row_numbered {
            self.sql.append(" FOR UPDATE")?;
        }
        Ok(())
    }

    /// Copies the SELECT into the execution buffer, retargeted at `link`.
    pub fn set_sql_for_exec(&mut self, link: usize) -> Result<&str> {
        self.exec_sql.copy_from(&self.sql)?;
        if link != self.link && self.share.names.need_change_db_table_name() {
            self.share
                .names
                .patch_table_name(&mut self.exec_sql, self.link, link)?;
        }
        if let Some(hint) = self.key_hint(link)? {
            let position = self.exec_sql.require(Bookmark::SelectList)?;
            self.exec_sql.insert_at(position, &hint)?;
        }
        Ok(self.exec_sql.as_str())
    }

    /// `/*+ INDEX("T" "KEY") */ ` for the hinted key on `link`'s table.
    fn key_hint(&self, link: usize) -> Result<Option<String>> {
        let Some(key) = self.hint_key else {
            return Ok(None);
        };
        let name = &self.share.key(key)?.name;
        let Some(hint) = self.share.config.key_hints.get(name) else {
            return Ok(None);
        };
        Ok(Some(format!(
            "/*+ {}({} {}) */ ",
            hint.keyword(),
            self.share.names.table_name(link)?,
            quote_identifier(name)
        )))
    }

    pub fn exec_select(&mut self, connection: &mut Connection, link: usize) -> Result<()> {
        let sql = self.set_sql_for_exec(link)?;
        connection.exec_query_with(sql, QueryKind::Read, false)
    }

    /// Runs the SELECT with a scrollable cursor so the caller can count and reposition.
    pub fn exec_select_scrollable(
        &mut self,
        connection: &mut Connection,
        link: usize,
    ) -> Result<()> {
        let sql = self.set_sql_for_exec(link)?;
        connection.exec_query_with(sql, QueryKind::Read, true)
    }

    pub fn append_insert_header(&mut self, link: usize) -> Result<()> {
        self.insert_sql.reset();
        self.insert_rows = 0;
        self.insert_link = link;
        self.insert_sql.append("INSERT INTO ")?;
        self.share
            .names
            .append_table_name_with_adjusting(&mut self.insert_sql, link)?;
        self.insert_sql.append(" (")?;
        let all: Vec<usize> = (0..self.share.table.columns.len()).collect();
        self.share
            .append_column_list(&mut self.insert_sql, &all, "")?;
        self.insert_sql.append(") VALUES ")?;
        self.insert_sql.bookmark(Bookmark::Values);
        Ok(())
    }

    /// Adds `row` to the multi-row VALUES list.
    ///
    /// A NULL auto-increment value draws `NEXTVAL` from the link's sequence
    /// when one is configured.
    pub fn append_insert_values(&mut self, row: &HostRow) -> Result<()> {
        let columns = &self.share.table.columns;
        if row.len() != columns.len() {
            return Err(Error::marshal(format!(
                "row has {} fields for a {}-column table",
                row.len(),
                columns.len()
            )));
        }
        let sequence = match self.share.table.auto_increment_column() {
            Some(column) if row.is_null(column) => self
                .share
                .sequence(self.insert_link)?
                .map(|sequence| (column, format!("{sequence}.NEXTVAL"))),
            _ => None,
        };
        let start = self.insert_sql.len();
        let result = (|| {
            if self.insert_rows > 0 {
                self.insert_sql.append(", ")?;
            }
            self.insert_sql.append_char('(')?;
            for (index, column) in columns.iter().enumerate() {
                if index > 0 {
                    self.insert_sql.append(", ")?;
                }
                match &sequence {
                    Some((auto, next)) if *auto == index => self.insert_sql.append(next)?,
                    _ => {
                        append_column_value(&mut self.insert_sql, column.host_type, row.get(index))?;
                    }
                }
            }
            self.insert_sql.append_char(')')
        })();
        if result.is_err() {
            self.insert_sql.truncate(start)?;
        } else {
            self.insert_rows += 1;
        }
        result
    }

    #[must_use]
    pub fn insert_row_count(&self) -> usize {
        self.insert_rows
    }

    pub fn clear_insert(&mut self) {
        self.insert_sql.reset();
        self.insert_rows = 0;
    }

    /// Builds an UPDATE of the row `old` to `new` into the update buffer.
    pub fn append_update(&mut self, old: &HostRow, new: &HostRow, link: usize) -> Result<()> {
        self.update_sql.reset();
        self.update_sql.append("UPDATE ")?;
        self.share
            .names
            .append_table_name_with_adjusting(&mut self.update_sql, link)?;
        self.update_sql.append(" SET ")?;
        self.update_sql.bookmark(Bookmark::UpdateSet);
        self.append_assignments(old, new)?;
        self.share
            .append_row_identity(&mut self.update_sql, old, link)
    }

    /// Builds a DELETE of the row `old` into the update buffer.
    pub fn append_delete(&mut self, old: &HostRow, link: usize) -> Result<()> {
        self.update_sql.reset();
        self.update_sql.append("DELETE FROM ")?;
        self.share
            .names
            .append_table_name_with_adjusting(&mut self.update_sql, link)?;
        self.share
            .append_row_identity(&mut self.update_sql, old, link)
    }

    /// Builds an UPDATE of every row in `range` that matches `condition`, limited by `page`.
    pub fn append_update_range(
        &mut self,
        link: usize,
        assignments: &[(usize, Option<Vec<u8>>)],
        range: Option<&KeyRange>,
        condition: Option<&Expr>,
        page: Page,
    ) -> Result<()> {
        self.update_sql.reset();
        self.update_sql.append("UPDATE ")?;
        self.share
            .names
            .append_table_name_with_adjusting(&mut self.update_sql, link)?;
        self.update_sql.append(" SET ")?;
        self.update_sql.bookmark(Bookmark::UpdateSet);
        for (position, (column, value)) in assignments.iter().enumerate() {
            if position > 0 {
                self.update_sql.append(", ")?;
            }
            self.share
                .names
                .append_column_name(&mut self.update_sql, *column, "")?;
            self.update_sql.append(" = ")?;
            append_column_value(
                &mut self.update_sql,
                self.share.host_type(*column)?,
                value.as_deref(),
            )?;
        }
        self.finish_range_dml(link, range, condition, page)
    }

    pub fn append_delete_range(
        &mut self,
        link: usize,
        range: Option<&KeyRange>,
        condition: Option<&Expr>,
        page: Page,
    ) -> Result<()> {
        self.update_sql.reset();
        self.update_sql.append("DELETE FROM ")?;
        self.share
            .names
            .append_table_name_with_adjusting(&mut self.update_sql, link)?;
        self.finish_range_dml(link, range, condition, page)
    }

    /// Runs the statement in the update buffer and returns the affected row count.
    pub fn exec_update(&mut self, connection: &mut Connection) -> Result<u64> {
        connection.exec_query_with(self.update_sql.as_str(), QueryKind::Write, false)?;
        Ok(connection.affected_rows())
    }

    pub fn delete_all_statement(&self, link: usize, truncate: bool) -> Result<String> {
        let table = self.share.names.db_table_name(link)?;
        Ok(if truncate {
            format!("TRUNCATE TABLE {table}")
        } else {
            format!("DELETE FROM {table}")
        })
    }

    pub fn delete_all(
        &mut self,
        connection: &mut Connection,
        link: usize,
        truncate: bool,
    ) -> Result<u64> {
        let sql = self.delete_all_statement(link, truncate)?;
        connection.exec_query_with(&sql, QueryKind::Write, false)?;
        Ok(connection.affected_rows())
    }

    pub fn maintenance_statements(&self, command: Maintenance, link: usize) -> Result<Vec<String>> {
        let names = &self.share.names;
        let table = names.db_table_name(link)?;
        let index = |key: &KeyDef| -> Result<String> {
            Ok(format!(
                "{}.{}",
                names.db_name(link)?,
                quote_identifier(&key.name)
            ))
        };
        let secondary: Vec<&KeyDef> = self
            .share
            .table
            .keys
            .iter()
            .filter(|key| !key.primary)
            .collect();

        let statements = match command {
            Maintenance::Analyze => vec![format!("ANALYZE TABLE {table} COMPUTE STATISTICS")],
            Maintenance::Check => vec![format!("ANALYZE TABLE {table} VALIDATE STRUCTURE")],
            Maintenance::Optimize | Maintenance::Repair => {
                let mut statements = vec![format!("ALTER TABLE {table} MOVE")];
                for key in &self.share.table.keys {
                    statements.push(format!("ALTER INDEX {} REBUILD", index(key)?));
                }
                statements
            }
            Maintenance::DisableKeys => secondary
                .iter()
                .map(|key| Ok(format!("ALTER INDEX {} UNUSABLE", index(*key)?)))
                .collect::<Result<_>>()?,
            Maintenance::EnableKeys => secondary
                .iter()
                .map(|key| Ok(format!("ALTER INDEX {} REBUILD", index(*key)?)))
                .collect::<Result<_>>()?,
        };
        Ok(statements)
    }

    pub fn run_maintenance(
        &self,
        connection: &mut Connection,
        command: Maintenance,
        link: usize,
    ) -> Result<()> {
        for sql in self.maintenance_statements(command, link)? {
            connection.exec_query_with(&sql, QueryKind::Write, false)?;
        }
        Ok(())
    }

    pub fn lock_statement(&self, link: usize, mode: TableLockMode) -> Result<String> {
        let names = &self.share.names;
        Ok(lock_table_statement(
            names.db_name(link)?,
            names.table_name(link)?,
            mode,
        ))
    }

    /// Queues a table lock on `connection` for `link`'s table.
    pub fn lock_table(
        &self,
        connection: &mut Connection,
        link: usize,
        mode: TableLockMode,
    ) -> Result<()> {
        let names = &self.share.names;
        connection.append_lock_table(names.db_name(link)?, names.table_name(link)?, mode);
        Ok(())
    }

    fn append_from(&mut self) -> Result<()> {
        self.sql.bookmark(Bookmark::From);
        self.share
            .names
            .append_from_with_adjusted_table_name(&mut self.sql, self.link)?;
        self.sql.bookmark(Bookmark::Where);
        Ok(())
    }

    fn append_assignments(&mut self, old: &HostRow, new: &HostRow) -> Result<()> {
        let mut written = 0;
        for (column, definition) in self.share.table.columns.iter().enumerate() {
            if old.get(column) == new.get(column) && old.is_null(column) == new.is_null(column) {
                continue;
            }
            if written > 0 {
                self.update_sql.append(", ")?;
            }
            self.share
                .names
                .append_column_name(&mut self.update_sql, column, "")?;
            self.update_sql.append(" = ")?;
            append_column_value(&mut self.update_sql, definition.host_type, new.get(column))?;
            written += 1;
        }
        if written == 0 {
            // Nothing changed; a self-assignment keeps the statement valid.
            let first = self
                .share
                .table
                .primary_key()
                .and_then(|key| key.columns.first().copied())
                .unwrap_or(0);
            self.share
                .names
                .append_column_name(&mut self.update_sql, first, "")?;
            self.update_sql.append(" = ")?;
            self.share
                .names
                .append_column_name(&mut self.update_sql, first, "")?;
        }
        Ok(())
    }

    fn finish_range_dml(
        &mut self,
        link: usize,
        range: Option<&KeyRange>,
        condition: Option<&Expr>,
        page: Page,
    ) -> Result<()> {
        self.update_sql.bookmark(Bookmark::Where);
        if let Some(range) = range {
            self.share
                .append_key_where(&mut self.update_sql, range, "")?;
        }
        if let Some(condition) = condition
            && !self
                .share
                .append_condition(&mut self.update_sql, condition, "")?
        {
            return Err(Error::Unsupported);
        }
        let terms = OrderTerm::from_keys(&self.order_keys, "");
        pagination::apply_to_dml(&mut self.update_sql, page, &terms, &self.share.names, link)?;
        Ok(())
    }
}
