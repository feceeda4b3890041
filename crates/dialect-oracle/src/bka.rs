use std::{collections::HashMap, sync::Arc};

use tablelink_core::{
    BkaMode, Bookmark, Error, Expr, FieldValue, HostRow, Page, Result, SortOrder, SpillTable,
    StatementBuffer,
};
use tracing::{debug, warn};

use crate::{
    errors::TABLE_NOT_FOUND,
    handler::{OracleHandler, OracleShare},
    pagination::{self, OrderTerm},
    quote::{append_column_value, oracle_column_type, quote_identifier},
    session::{Connection, QueryKind},
};

const STAGED_ALIAS: &str = "a.";
const TARGET_ALIAS: &str = "b.";
const STAGED_ID: &str = "a.\"id\"";

/// Distinct join keys of one batch and the members that asked for each.
#[derive(Debug, Default)]
pub struct BkaBatch {
    ids: HashMap<Vec<FieldValue>, usize>,
    members: Vec<Vec<usize>>,
}

impl BkaBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Batch members whose key was staged under `id`.
    #[must_use]
    pub fn members(&self, id: usize) -> &[usize] {
        self.members.get(id).map_or(&[], Vec::as_slice)
    }

    /// Records `member`'s key and returns its staged id plus whether the key is new.
    fn add(&mut self, member: usize, key: &HostRow) -> (usize, bool) {
        let next = self.members.len();
        let id = *self.ids.entry(key.fields().to_vec()).or_insert(next);
        if id == next {
            self.members.push(vec![member]);
            (id, true)
        } else {
            self.members[id].push(member);
            (id, false)
        }
    }
}

/// Stages one batch of join keys for a single round-trip join.
#[derive(Debug)]
pub struct BkaStage {
    share: Arc<OracleShare>,
    handler_id: u64,
    key: usize,
    table_name: String,
    batch: BkaBatch,
    keys: SpillTable,
}

impl BkaStage {
    pub fn new(handler: &OracleHandler, key: usize) -> Result<Self> {
        let share = Arc::clone(handler.share());
        share.key(key)?;
        let sequence = share.next_bka_sequence();
        let table_name = staged_table_name(sequence, handler.id(), share.names().is_padded());
        Ok(Self {
            share,
            handler_id: handler.id(),
            key,
            table_name,
            batch: BkaBatch::new(),
            keys: SpillTable::create()?,
        })
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[must_use]
    pub fn batch(&self) -> &BkaBatch {
        &self.batch
    }

    #[must_use]
    pub fn handler_id(&self) -> u64 {
        self.handler_id
    }

    /// Adds a lookup for batch member `member`; duplicate keys share one staged row.
    pub fn push_key(&mut self, member: usize, key: HostRow) -> Result<usize> {
        let width = self.share.key(self.key)?.columns.len();
        if key.len() != width {
            return Err(Error::marshal(format!(
                "join key has {} values for a {width}-column key",
                key.len()
            )));
        }
        let (id, fresh) = self.batch.add(member, &key);
        if fresh {
            self.keys.insert_row(&key)?;
        }
        Ok(id)
    }

    /// Forgets the batch so the stage can collect the next one.
    pub fn reset(&mut self) -> Result<()> {
        self.batch = BkaBatch::new();
        self.keys.clear()
    }

    /// Stages the batch on `link` and runs the joined SELECT.
    ///
    /// In [`BkaMode::TemporaryTable`] the returned scan owns the transient
    /// table and empties then drops it when finished or dropped. In
    /// [`BkaMode::UnionAll`] the keys travel inline and nothing is created.
    pub fn open<'c>(
        &mut self,
        connection: &'c mut Connection,
        link: usize,
        columns: &[usize],
        condition: Option<&Expr>,
        page: Page,
    ) -> Result<BkaScan<'c>> {
        if self.batch.is_empty() {
            return Err(Error::invalid_state("batched key access with an empty batch"));
        }
        if self.share.config().bka.mode == BkaMode::UnionAll {
            let staged = self.inline_keys()?;
            let (select, width) = self.select_statement(&staged, link, columns, condition, page)?;
            debug!(keys = self.batch.len(), "running batched key join over inline keys");
            connection.exec_query_with(select.as_str(), QueryKind::Read, false)?;
            return Ok(BkaScan {
                connection,
                teardown: Vec::new(),
                finished: false,
                width,
            });
        }

        let names = self.share.names();
        let staged = format!("{}.{}", names.db_name(link)?, quote_identifier(&self.table_name));
        let teardown = vec![format!("TRUNCATE TABLE {staged}"), format!("DROP TABLE {staged}")];
        for statement in &teardown {
            ignore_missing_table(connection, statement)?;
        }
        connection.exec_query_with(&self.create_statement(&staged)?, QueryKind::Write, false)?;
        let mut scan = BkaScan {
            connection,
            teardown,
            finished: false,
            width: 0,
        };

        for insert in self.insert_statements(&staged)? {
            scan.connection
                .exec_query_with(&insert, QueryKind::Write, false)?;
        }
        let (select, width) = self.select_statement(&staged, link, columns, condition, page)?;
        debug!(table = %self.table_name, keys = self.batch.len(), "running batched key join");
        scan.width = width;
        scan.connection
            .exec_query_with(select.as_str(), QueryKind::Read, false)?;
        Ok(scan)
    }

    fn create_statement(&self, staged: &str) -> Result<String> {
        let options = &self.share.config().bka;
        let table = self.share.table();
        let mut sql = StatementBuffer::new();
        sql.append(if options.temporary {
            "CREATE GLOBAL TEMPORARY TABLE "
        } else {
            "CREATE TABLE "
        })?;
        sql.append(staged)?;
        sql.append(" (\"id\" NUMBER(19) NOT NULL")?;
        for (position, column) in self.share.key(self.key)?.columns.iter().enumerate() {
            let host_type = table.columns[*column].host_type;
            sql.append_fmt(format_args!(
                ", \"c{position}\" {}",
                oracle_column_type(host_type, options.national_charset)
            ))?;
        }
        sql.append(", PRIMARY KEY (\"id\"))")?;
        if !options.storage_clause.is_empty() {
            sql.append_char(' ')?;
            sql.append(&options.storage_clause)?;
        }
        Ok(sql.as_str().to_string())
    }

    /// Multi-row INSERTs of the staged keys, split at the bulk size.
    fn insert_statements(&mut self, staged: &str) -> Result<Vec<String>> {
        let key_columns = self.share.key(self.key)?.columns.clone();
        let table = self.share.table();
        let bulk_size = self.share.config().bulk_size;

        let mut header = StatementBuffer::new();
        header.append("INSERT INTO ")?;
        header.append(staged)?;
        header.append(" (\"id\"")?;
        for position in 0..key_columns.len() {
            header.append_fmt(format_args!(", \"c{position}\""))?;
        }
        header.append(") VALUES ")?;
        header.bookmark(Bookmark::Values);

        let mut statements = Vec::new();
        let mut sql = header.clone();
        let mut id = 0usize;
        self.keys.rewind();
        while let Some(key) = self.keys.next_row()? {
            if sql.len() > sql.require(Bookmark::Values)? {
                sql.append(", ")?;
            }
            sql.append_fmt(format_args!("({id}"))?;
            for (position, column) in key_columns.iter().enumerate() {
                sql.append(", ")?;
                append_column_value(&mut sql, table.columns[*column].host_type, key.get(position))?;
            }
            sql.append_char(')')?;
            id += 1;
            if sql.len() >= bulk_size {
                statements.push(sql.as_str().to_string());
                sql.copy_from(&header)?;
            }
        }
        if sql.len() > sql.require(Bookmark::Values)? {
            statements.push(sql.as_str().to_string());
        }
        Ok(statements)
    }

    /// The staged keys as a `UNION ALL` of `DUAL` rows, in staged id order.
    fn inline_keys(&mut self) -> Result<String> {
        let key_columns = self.share.key(self.key)?.columns.clone();
        let table = self.share.table();
        let mut sql = StatementBuffer::new();
        sql.append_char('(')?;
        let mut id = 0usize;
        self.keys.rewind();
        while let Some(key) = self.keys.next_row()? {
            if id > 0 {
                sql.append(" UNION ALL ")?;
            }
            sql.append_fmt(format_args!("SELECT {id} \"id\""))?;
            for (position, column) in key_columns.iter().enumerate() {
                sql.append(", ")?;
                append_column_value(&mut sql, table.columns[*column].host_type, key.get(position))?;
                sql.append_fmt(format_args!(" \"c{position}\""))?;
            }
            sql.append(" FROM DUAL")?;
            id += 1;
        }
        sql.append_char(')')?;
        Ok(sql.as_str().to_string())
    }

    fn select_statement(
        &self,
        staged: &str,
        link: usize,
        columns: &[usize],
        condition: Option<&Expr>,
        page: Page,
    ) -> Result<(StatementBuffer, usize)> {
        let names = self.share.names();
        let all: Vec<usize>;
        let columns = if columns.is_empty() {
            all = (0..self.share.table().columns.len()).collect();
            &all
        } else {
            columns
        };

        let mut sql = StatementBuffer::new();
        sql.append("SELECT ")?;
        sql.bookmark(Bookmark::SelectList);
        self.share.append_column_list(&mut sql, columns, TARGET_ALIAS)?;
        sql.append(", ")?;
        sql.append(STAGED_ID)?;
        sql.append(" bka_id")?;
        sql.bookmark(Bookmark::From);
        sql.append(" FROM ")?;
        sql.append(staged)?;
        sql.append(" a JOIN ")?;
        names.append_table_name_with_adjusting(&mut sql, link)?;
        sql.append(" b ON ")?;
        for (position, column) in self.share.key(self.key)?.columns.iter().enumerate() {
            if position > 0 {
                sql.append(" AND ")?;
            }
            sql.append_fmt(format_args!("{STAGED_ALIAS}\"c{position}\" = "))?;
            names.append_column_name(&mut sql, *column, TARGET_ALIAS)?;
        }
        sql.bookmark(Bookmark::Where);
        if let Some(condition) = condition {
            self.share.append_condition(&mut sql, condition, TARGET_ALIAS)?;
        }
        sql.bookmark(Bookmark::Order);
        sql.append(" ORDER BY ")?;
        sql.append(STAGED_ID)?;
        let terms = [OrderTerm::Raw {
            text: STAGED_ID,
            order: SortOrder::Asc,
        }];
        pagination::apply_to_select(&mut sql, page, &terms, names)?;
        Ok((sql, columns.len()))
    }
}

/// The open result of a batched key join.
///
/// Each row is the selected target columns followed by the staged id. A
/// transient table is truncated and dropped by [`BkaScan::finish`] or on drop,
/// since the remote refuses to drop a temporary table that still holds rows.
pub struct BkaScan<'c> {
    connection: &'c mut Connection,
    teardown: Vec<String>,
    finished: bool,
    width: usize,
}

impl BkaScan<'_> {
    /// Returns the next joined row and the staged id it matched.
    pub fn next_row(&mut self) -> Result<Option<(usize, HostRow)>> {
        let mut cursor = self.connection.store_result()?;
        let Some(row) = cursor.fetch_row()? else {
            return Ok(None);
        };
        let id = row
            .val_int(self.width)?
            .ok_or_else(|| Error::marshal("staged id is NULL"))?;
        let id = usize::try_from(id).map_err(|_| Error::marshal(format!("staged id {id}")))?;
        let fields = row
            .fields()
            .take(self.width)
            .map(|field| field.map(<[u8]>::to_vec))
            .collect();
        Ok(Some((id, HostRow::new(fields))))
    }

    /// Removes the transient table, reporting the first statement the remote refused.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        for statement in &self.teardown {
            self.connection
                .exec_query_with(statement, QueryKind::Write, false)?;
        }
        Ok(())
    }
}

impl Drop for BkaScan<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for statement in &self.teardown {
            if let Err(error) = self
                .connection
                .exec_query_with(statement, QueryKind::Write, false)
            {
                warn!(sql = %statement, %error, "failed to remove batched key table");
                return;
            }
        }
    }
}

fn ignore_missing_table(connection: &mut Connection, sql: &str) -> Result<()> {
    match connection.exec_query_with(sql, QueryKind::Write, false) {
        Err(Error::Native(native)) if native.native_code == TABLE_NOT_FOUND => Ok(()),
        other => other,
    }
}

/// Transient table name unique per share sequence and handler.
///
/// Padded names have a fixed width so one statement template fits every link.
#[must_use]
pub fn staged_table_name(sequence: u64, handler: u64, padded: bool) -> String {
    if padded {
        format!("tmp_bka_{sequence:016x}_{handler:016x}")
    } else {
        format!("tmp_bka_{sequence:x}_{handler:x}")
    }
}
