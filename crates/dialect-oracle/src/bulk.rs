use tablelink_core::{Error, HostRow, LinkStatus, Result, SpillTable, StatementBuffer};
use tracing::{debug, info};

use crate::{
    handler::OracleHandler,
    session::{Connection, QueryKind},
};

const SPILL_INSERT: u8 = b'I';
const SPILL_UPDATE: u8 = b'U';
const SPILL_DELETE: u8 = b'D';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(HostRow),
    Update { old: HostRow, new: HostRow },
    Delete(HostRow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchKind {
    Insert,
    Statements,
}

/// Accumulates mutations for one link and sends them in one round trip.
///
/// Inserts grow one multi-row VALUES list; updates and deletes are joined
/// into an anonymous block. Switching between the two seals the open batch,
/// which the next flush sends ahead of the new one. Mutations for a link
/// other than the one the batch was built for, or for a link under recovery,
/// are encoded into a spill table and replayed later.
#[derive(Debug)]
pub struct BulkMutationBuffer {
    bulk_size: usize,
    built_for: Option<usize>,
    kind: Option<BatchKind>,
    sealed: Vec<String>,
    statements: StatementBuffer,
    statement_count: usize,
    spill: Option<SpillTable>,
    spilled: u64,
}

impl BulkMutationBuffer {
    #[must_use]
    pub fn new(bulk_size: usize) -> Self {
        Self {
            bulk_size,
            built_for: None,
            kind: None,
            sealed: Vec::new(),
            statements: StatementBuffer::new(),
            statement_count: 0,
            spill: None,
            spilled: 0,
        }
    }

    #[must_use]
    pub fn built_for(&self) -> Option<usize> {
        self.built_for
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.sealed.is_empty()
    }

    #[must_use]
    pub fn spilled(&self) -> u64 {
        self.spilled
    }

    /// True once the pending text reached the bulk size.
    #[must_use]
    pub fn is_filled_up(&self, handler: &OracleHandler) -> bool {
        self.pending_len(handler) >= self.bulk_size
    }

    /// Adds `mutation` for `link`. Returns `true` when the caller should flush.
    pub fn push(
        &mut self,
        handler: &mut OracleHandler,
        link: usize,
        mutation: &Mutation,
    ) -> Result<bool> {
        let status = handler.share().config().link(link)?.link_status;
        let foreign_link = self.built_for.is_some_and(|built| built != link);
        if foreign_link || status != LinkStatus::Ok {
            self.spill_mutation(mutation)?;
            debug!(link, ?status, "mutation spilled for replay");
            return Ok(false);
        }
        self.append(handler, link, mutation)
    }

    /// Sends the sealed batches, then the open one. DML is never resent;
    /// everything pending is discarded whether or not it succeeded.
    pub fn flush(
        &mut self,
        handler: &mut OracleHandler,
        connection: &mut Connection,
    ) -> Result<u64> {
        let mut batches = std::mem::take(&mut self.sealed);
        batches.extend(self.take_batch(handler));
        self.built_for = None;

        let mut affected = 0;
        for sql in batches {
            connection.exec_query_with(&sql, QueryKind::Write, false)?;
            affected += connection.affected_rows();
        }
        Ok(affected)
    }

    /// Replays spilled mutations against `link`, flushing as batches fill.
    pub fn replay(
        &mut self,
        handler: &mut OracleHandler,
        connection: &mut Connection,
        link: usize,
    ) -> Result<u64> {
        self.flush(handler, connection)?;
        let Some(mut spill) = self.spill.take() else {
            return Ok(0);
        };
        info!(link, rows = self.spilled, "replaying spilled mutations");
        let columns = handler.share().table().columns.len();
        let mut replayed = 0;
        spill.rewind();
        while let Some(encoded) = spill.next_row()? {
            let mutation = decode_mutation(&encoded, columns)?;
            if self.append(handler, link, &mutation)? {
                self.flush(handler, connection)?;
            }
            replayed += 1;
        }
        self.flush(handler, connection)?;
        self.spilled = 0;
        Ok(replayed)
    }

    fn append(
        &mut self,
        handler: &mut OracleHandler,
        link: usize,
        mutation: &Mutation,
    ) -> Result<bool> {
        self.built_for = Some(link);
        match mutation {
            Mutation::Insert(row) => {
                if self.kind == Some(BatchKind::Statements) {
                    self.seal(handler);
                }
                if self.kind.is_none() {
                    handler.append_insert_header(link)?;
                    self.kind = Some(BatchKind::Insert);
                }
                handler.append_insert_values(row)?;
            }
            Mutation::Update { old, new } => {
                self.begin_statements(handler);
                handler.append_update(old, new, link)?;
                self.push_statement(handler)?;
            }
            Mutation::Delete(old) => {
                self.begin_statements(handler);
                handler.append_delete(old, link)?;
                self.push_statement(handler)?;
            }
        }
        Ok(!self.sealed.is_empty() || self.is_filled_up(handler))
    }

    fn begin_statements(&mut self, handler: &mut OracleHandler) {
        if self.kind == Some(BatchKind::Insert) {
            self.seal(handler);
        }
        self.kind = Some(BatchKind::Statements);
    }

    /// Closes the open batch so a batch of the other kind can start.
    fn seal(&mut self, handler: &mut OracleHandler) {
        if let Some(sql) = self.take_batch(handler) {
            debug!(sealed = self.sealed.len() + 1, "batch kind switched");
            self.sealed.push(sql);
        }
    }

    /// Renders and clears the open batch.
    fn take_batch(&mut self, handler: &mut OracleHandler) -> Option<String> {
        let sql = match self.kind.take()? {
            BatchKind::Insert if handler.insert_row_count() == 0 => {
                handler.clear_insert();
                return None;
            }
            BatchKind::Insert => {
                debug!(rows = handler.insert_row_count(), "closing bulk insert");
                handler.insert_sql().as_str().to_string()
            }
            BatchKind::Statements => {
                debug!(statements = self.statement_count, "closing bulk statements");
                if self.statement_count > 1 {
                    format!("BEGIN {} END;", self.statements.as_str())
                } else {
                    self.statements
                        .as_str()
                        .trim_end_matches(';')
                        .to_string()
                }
            }
        };
        handler.clear_insert();
        self.statements.reset();
        self.statement_count = 0;
        Some(sql)
    }

    fn push_statement(&mut self, handler: &OracleHandler) -> Result<()> {
        if self.statement_count > 0 {
            self.statements.append_char(' ')?;
        }
        self.statements.append(handler.update_sql().as_str())?;
        self.statements.append_char(';')?;
        self.statement_count += 1;
        Ok(())
    }

    fn pending_len(&self, handler: &OracleHandler) -> usize {
        match self.kind {
            Some(BatchKind::Insert) => handler.insert_sql().len(),
            Some(BatchKind::Statements) => self.statements.len(),
            None => 0,
        }
    }

    fn spill_mutation(&mut self, mutation: &Mutation) -> Result<()> {
        if self.spill.is_none() {
            self.spill = Some(SpillTable::create()?);
        }
        let Some(spill) = self.spill.as_mut() else {
            return Err(Error::invalid_state("spill table unavailable"));
        };
        spill.insert_row(&encode_mutation(mutation))?;
        self.spilled += 1;
        Ok(())
    }
}

/// Tag field first, then the row fields; an update carries old then new.
fn encode_mutation(mutation: &Mutation) -> HostRow {
    let (tag, rows): (u8, Vec<&HostRow>) = match mutation {
        Mutation::Insert(row) => (SPILL_INSERT, vec![row]),
        Mutation::Update { old, new } => (SPILL_UPDATE, vec![old, new]),
        Mutation::Delete(row) => (SPILL_DELETE, vec![row]),
    };
    let mut encoded = HostRow::new(vec![Some(vec![tag])]);
    for row in rows {
        for field in row.fields() {
            encoded.push(field.clone());
        }
    }
    encoded
}

fn decode_mutation(encoded: &HostRow, columns: usize) -> Result<Mutation> {
    let fields = encoded.fields();
    let row = |start: usize| -> Result<HostRow> {
        fields
            .get(start..start + columns)
            .map(|slice| HostRow::new(slice.to_vec()))
            .ok_or_else(|| Error::marshal("spilled mutation is truncated"))
    };
    match encoded.get(0) {
        Some([SPILL_INSERT]) => Ok(Mutation::Insert(row(1)?)),
        Some([SPILL_UPDATE]) => Ok(Mutation::Update {
            old: row(1)?,
            new: row(1 + columns)?,
        }),
        Some([SPILL_DELETE]) => Ok(Mutation::Delete(row(1)?)),
        _ => Err(Error::marshal("spilled mutation has an unknown tag")),
    }
}
