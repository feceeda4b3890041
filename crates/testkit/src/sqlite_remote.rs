use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use parking_lot::Mutex;
use rusqlite::{OptionalExtension, functions::FunctionFlags, types::Value};
use tablelink_core::Xid;
use tablelink_dialect_oracle::{
    ColumnDescriptor, Credentials, DefineType, ExecuteMode, FetchOrientation, Fetched, Handle,
    HandleKind, NATIVE_DATE_LEN, NativeClient, NativeFailure, NativeResult, NativeType,
    encode_native_date, native_codes,
};
use tracing::debug;

const DICTIONARY_DDL: &str = "
CREATE TABLE ALL_TABLES (
  OWNER TEXT NOT NULL,
  TABLE_NAME TEXT NOT NULL,
  NUM_ROWS INTEGER,
  AVG_ROW_LEN INTEGER
);
CREATE TABLE ALL_TAB_COL_STATISTICS (
  OWNER TEXT NOT NULL,
  TABLE_NAME TEXT NOT NULL,
  COLUMN_NAME TEXT NOT NULL,
  NUM_DISTINCT INTEGER
);
CREATE TABLE ALL_SEQUENCES (
  SEQUENCE_OWNER TEXT NOT NULL,
  SEQUENCE_NAME TEXT NOT NULL,
  LAST_NUMBER INTEGER NOT NULL,
  PRIMARY KEY (SEQUENCE_OWNER, SEQUENCE_NAME)
);
CREATE TABLE DUAL (DUMMY TEXT);
INSERT INTO DUAL VALUES ('X');
";

const TEMPORARY_PREFIX: &str = "CREATE GLOBAL TEMPORARY TABLE ";
const DROP_PREFIX: &str = "DROP TABLE ";

const IGNORED_PREFIXES: &[&str] = &[
    "ALTER SESSION",
    "SET TRANSACTION",
    "LOCK TABLE",
    "ALTER INDEX",
    "ANALYZE TABLE",
];

const INVALID_HANDLE: i32 = -2;
const INVALID_SQL: i32 = 900;
const NO_SUCH_COLUMN: i32 = 904;
const INCONSISTENT_TYPES: i32 = 932;
const FETCH_OUT_OF_SEQUENCE: i32 = 1002;
const VARIABLE_NOT_BOUND: i32 = 1007;
const INVALID_LOGON: i32 = 1017;
const NOT_NULL_VIOLATION: i32 = 1400;
const DATE_FORMAT_MISMATCH: i32 = 1861;
const SEQUENCE_NOT_FOUND: i32 = 2289;
const END_OF_FILE: i32 = 3113;
const NOT_CONNECTED: i32 = 3114;
const TEMPORARY_TABLE_IN_USE: i32 = 14452;
const SCROLL_REQUIRED: i32 = 24391;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FailurePoint {
    Attach,
    Execute(String),
    Commit,
    Rollback,
}

#[derive(Debug)]
struct ScriptedFailure {
    point: FailurePoint,
    failure: NativeFailure,
}

#[derive(Debug, Clone)]
struct RemoteColumn {
    name: String,
    native_type: NativeType,
    size: usize,
}

#[derive(Debug, Default)]
struct RemoteStatement {
    sql: String,
    columns: Vec<RemoteColumn>,
    rows: Vec<Vec<Value>>,
    defines: HashMap<usize, DefineType>,
    position: u64,
    executed: bool,
    scrollable: bool,
    changed: Option<u64>,
}

impl RemoteStatement {
    fn reset(&mut self, sql: &str) {
        *self = Self {
            sql: sql.to_string(),
            ..Self::default()
        };
    }

    fn current_value(&self, position: usize) -> NativeResult<&Value> {
        let index = usize::try_from(self.position)
            .ok()
            .and_then(|row| row.checked_sub(1))
            .ok_or_else(|| NativeFailure::new(FETCH_OUT_OF_SEQUENCE, "no current row"))?;
        self.rows
            .get(index)
            .and_then(|row| row.get(position))
            .ok_or_else(|| {
                NativeFailure::new(VARIABLE_NOT_BOUND, format!("no column at position {position}"))
            })
    }
}

enum Outcome {
    Rows {
        columns: Vec<RemoteColumn>,
        rows: Vec<Vec<Value>>,
    },
    Changed(u64),
}

enum Translated {
    Ignored,
    Block(String),
    Statement(String),
}

struct State {
    db: rusqlite::Connection,
    next_id: u64,
    handles: HashMap<u64, HandleKind>,
    statements: HashMap<u64, RemoteStatement>,
    lobs: HashMap<u64, Vec<u8>>,
    severed: HashSet<u64>,
    log: Vec<String>,
    failures: Vec<ScriptedFailure>,
    attach_count: u64,
    in_transaction: bool,
    last_call_timeout: Option<Duration>,
    temporary_tables: HashSet<String>,
    current_values: HashMap<String, i64>,
}

impl State {
    fn alloc(&mut self, kind: HandleKind) -> Handle {
        self.next_id += 1;
        let id = self.next_id;
        self.handles.insert(id, kind);
        if kind == HandleKind::Statement {
            self.statements.insert(id, RemoteStatement::default());
        }
        Handle { kind, id }
    }

    fn require(&self, handle: Handle) -> NativeResult<()> {
        if self.handles.get(&handle.id) != Some(&handle.kind) {
            return Err(invalid_handle(handle));
        }
        if handle.kind == HandleKind::ServiceContext && self.severed.contains(&handle.id) {
            return Err(NativeFailure::new(
                END_OF_FILE,
                "end-of-file on communication channel",
            ));
        }
        Ok(())
    }

    fn statement_mut(&mut self, handle: Handle) -> NativeResult<&mut RemoteStatement> {
        self.statements
            .get_mut(&handle.id)
            .ok_or_else(|| invalid_handle(handle))
    }

    fn executed_statement(&self, handle: Handle) -> NativeResult<&RemoteStatement> {
        let statement = self
            .statements
            .get(&handle.id)
            .ok_or_else(|| invalid_handle(handle))?;
        if !statement.executed {
            return Err(NativeFailure::new(
                FETCH_OUT_OF_SEQUENCE,
                "statement has not been executed",
            ));
        }
        Ok(statement)
    }

    fn take_failure(&mut self, matches: impl Fn(&FailurePoint) -> bool) -> Option<NativeFailure> {
        let index = self
            .failures
            .iter()
            .position(|scripted| matches(&scripted.point))?;
        Some(self.failures.remove(index).failure)
    }

    /// A temporary table still holding rows refuses to be dropped.
    fn check_drop(&self, sql: &str) -> NativeResult<()> {
        let Some(table) = sql.trim().strip_prefix(DROP_PREFIX) else {
            return Ok(());
        };
        if !self.temporary_tables.contains(table) {
            return Ok(());
        }
        let rows: i64 = self
            .db
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(native_failure)?;
        if rows > 0 {
            return Err(NativeFailure::new(
                TEMPORARY_TABLE_IN_USE,
                "attempt to create, alter or drop an index on temporary table already in use",
            ));
        }
        Ok(())
    }

    fn track_temporary_table(&mut self, sql: &str) {
        let trimmed = sql.trim();
        if let Some(table) = trimmed.strip_prefix(DROP_PREFIX) {
            self.temporary_tables.remove(table);
        } else if let Some(rest) = trimmed.strip_prefix(TEMPORARY_PREFIX)
            && let Some((table, _)) = rest.split_once(" (")
        {
            self.temporary_tables.insert(table.to_string());
        }
    }

    /// Replaces `"OWNER"."SEQ".NEXTVAL` and `.CURRVAL` references with values.
    fn resolve_sequences(&mut self, sql: &str) -> NativeResult<String> {
        let mut resolved = String::with_capacity(sql.len());
        let mut rest = sql;
        while let Some((before, next, after)) = next_pseudo_column(rest) {
            let (prefix, owner, name) = split_sequence_reference(before)?;
            let value = if next {
                self.next_value(owner, name)?
            } else {
                self.current_values.get(name).copied().ok_or_else(|| {
                    NativeFailure::new(
                        native_codes::CURRVAL_NOT_DEFINED,
                        format!("sequence {name}.CURRVAL is not yet defined in this session"),
                    )
                })?
            };
            resolved.push_str(prefix);
            resolved.push_str(&value.to_string());
            rest = after;
        }
        resolved.push_str(rest);
        Ok(resolved)
    }

    fn next_value(&mut self, owner: Option<&str>, name: &str) -> NativeResult<i64> {
        let value: Option<i64> = self
            .db
            .query_row(
                "UPDATE ALL_SEQUENCES SET LAST_NUMBER = LAST_NUMBER + 1 \
                 WHERE SEQUENCE_NAME = ?1 AND (?2 IS NULL OR SEQUENCE_OWNER = ?2) \
                 RETURNING LAST_NUMBER - 1",
                rusqlite::params![name, owner],
                |row| row.get(0),
            )
            .optional()
            .map_err(native_failure)?;
        let value = value.ok_or_else(|| {
            NativeFailure::new(SEQUENCE_NOT_FOUND, format!("sequence {name} does not exist"))
        })?;
        self.current_values.insert(name.to_string(), value);
        Ok(value)
    }

    fn end_transaction(&mut self, sql: &str) -> NativeResult<()> {
        if self.in_transaction {
            self.db.execute_batch(sql).map_err(native_failure)?;
            self.in_transaction = false;
        }
        Ok(())
    }
}

/// A remote server simulated over one in-memory SQLite database.
///
/// Every connection opened through it shares the same database, so one
/// session's uncommitted writes are visible to the others. Statements in the
/// remote dialect that SQLite has no use for (session settings, table locks,
/// index maintenance) are logged and acknowledged without effect.
///
/// Sequences live in `ALL_SEQUENCES`, where `LAST_NUMBER` is the value the
/// next `NEXTVAL` hands out. A global temporary table that still holds rows
/// cannot be dropped.
pub struct SqliteRemote {
    state: Mutex<State>,
}

impl SqliteRemote {
    pub fn new() -> rusqlite::Result<Self> {
        let db = rusqlite::Connection::open_in_memory()?;
        register_functions(&db)?;
        db.execute_batch(DICTIONARY_DDL)?;
        Ok(Self {
            state: Mutex::new(State {
                db,
                next_id: 0,
                handles: HashMap::new(),
                statements: HashMap::new(),
                lobs: HashMap::new(),
                severed: HashSet::new(),
                log: Vec::new(),
                failures: Vec::new(),
                attach_count: 0,
                in_transaction: false,
                last_call_timeout: None,
                temporary_tables: HashSet::new(),
                current_values: HashMap::new(),
            }),
        })
    }

    /// Runs setup SQL directly, bypassing the statement log.
    pub fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.state.lock().db.execute_batch(sql)
    }

    pub fn query(&self, sql: &str) -> rusqlite::Result<Vec<Vec<Value>>> {
        let state = self.state.lock();
        let mut prepared = state.db.prepare(sql)?;
        let width = prepared.column_count();
        let mut cursor = prepared.query([])?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.next()? {
            rows.push(
                (0..width)
                    .map(|index| row.get::<_, Value>(index))
                    .collect::<rusqlite::Result<Vec<_>>>()?,
            );
        }
        Ok(rows)
    }

    pub fn table_exists(&self, name: &str) -> rusqlite::Result<bool> {
        let state = self.state.lock();
        let count: i64 = state.db.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// The next executed statement containing `fragment` fails once with `code`.
    pub fn fail_execute(&self, fragment: &str, code: i32, message: &str) {
        self.script(FailurePoint::Execute(fragment.to_string()), code, message);
    }

    pub fn fail_attach(&self, code: i32, message: &str) {
        self.script(FailurePoint::Attach, code, message);
    }

    pub fn fail_commit(&self, code: i32, message: &str) {
        self.script(FailurePoint::Commit, code, message);
    }

    pub fn fail_rollback(&self, code: i32, message: &str) {
        self.script(FailurePoint::Rollback, code, message);
    }

    /// Every session open right now loses its server.
    pub fn sever_sessions(&self) {
        let mut state = self.state.lock();
        let services: Vec<u64> = state
            .handles
            .iter()
            .filter(|(_, kind)| **kind == HandleKind::ServiceContext)
            .map(|(id, _)| *id)
            .collect();
        state.severed.extend(services);
    }

    /// Statements in execution order, including ones that failed.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    pub fn attach_count(&self) -> u64 {
        self.state.lock().attach_count
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().handles.len()
    }

    pub fn last_call_timeout(&self) -> Option<Duration> {
        self.state.lock().last_call_timeout
    }

    pub fn in_transaction(&self) -> bool {
        self.state.lock().in_transaction
    }

    fn script(&self, point: FailurePoint, code: i32, message: &str) {
        self.state.lock().failures.push(ScriptedFailure {
            point,
            failure: NativeFailure::new(code, message),
        });
    }
}

impl fmt::Debug for SqliteRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SqliteRemote")
            .field("handles", &state.handles.len())
            .field("statements_logged", &state.log.len())
            .field("scripted_failures", &state.failures.len())
            .field("in_transaction", &state.in_transaction)
            .finish_non_exhaustive()
    }
}

impl NativeClient for SqliteRemote {
    fn handle_alloc(&self, kind: HandleKind, parent: Option<Handle>) -> NativeResult<Handle> {
        let mut state = self.state.lock();
        if let Some(parent) = parent
            && !state.handles.contains_key(&parent.id)
        {
            return Err(invalid_handle(parent));
        }
        Ok(state.alloc(kind))
    }

    fn handle_free(&self, handle: Handle) {
        let mut state = self.state.lock();
        state.handles.remove(&handle.id);
        state.statements.remove(&handle.id);
        state.lobs.remove(&handle.id);
        state.severed.remove(&handle.id);
    }

    fn server_attach(&self, server: Handle, dblink: &str) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.require(server)?;
        state.attach_count += 1;
        debug!(dblink, attempt = state.attach_count, "attaching to sqlite remote");
        match state.take_failure(|point| *point == FailurePoint::Attach) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn server_detach(&self, server: Handle) -> NativeResult<()> {
        self.state.lock().require(server)
    }

    fn session_begin(
        &self,
        service: Handle,
        session: Handle,
        credentials: &Credentials,
    ) -> NativeResult<()> {
        let state = self.state.lock();
        state.require(service)?;
        state.require(session)?;
        if credentials.user.is_empty() {
            return Err(NativeFailure::new(
                INVALID_LOGON,
                "invalid username/password; logon denied",
            ));
        }
        Ok(())
    }

    fn session_end(&self, service: Handle, session: Handle) -> NativeResult<()> {
        let state = self.state.lock();
        if state.handles.get(&service.id) != Some(&service.kind) {
            return Err(invalid_handle(service));
        }
        state.require(session)
    }

    fn ping(&self, service: Handle) -> NativeResult<()> {
        self.state.lock().require(service)
    }

    fn set_call_timeout(&self, service: Handle, timeout: Duration) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.require(service)?;
        state.last_call_timeout = Some(timeout);
        Ok(())
    }

    fn prepare(&self, statement: Handle, sql: &str) -> NativeResult<()> {
        self.state.lock().statement_mut(statement)?.reset(sql);
        Ok(())
    }

    fn set_prefetch_rows(&self, statement: Handle, _rows: u32) -> NativeResult<()> {
        self.state.lock().require(statement)
    }

    fn execute(
        &self,
        service: Handle,
        statement: Handle,
        _iterations: u32,
        mode: ExecuteMode,
    ) -> NativeResult<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.require(service)?;
        let sql = state.statement_mut(statement)?.sql.clone();
        state.log.push(sql.clone());
        if let Some(failure) = state.take_failure(|point| match point {
            FailurePoint::Execute(fragment) => sql.contains(fragment.as_str()),
            _ => false,
        }) {
            return Err(failure);
        }

        state.check_drop(&sql)?;
        let resolved = state.resolve_sequences(&sql)?;
        let outcome = run_remote(&state.db, &resolved)?;
        state.track_temporary_table(&sql);
        let remote = state.statement_mut(statement)?;
        remote.executed = true;
        remote.scrollable = mode.scrollable;
        match outcome {
            Outcome::Rows { columns, rows } => {
                remote.columns = columns;
                remote.rows = rows;
            }
            Outcome::Changed(changed) => remote.changed = Some(changed),
        }
        Ok(())
    }

    fn column_count(&self, statement: Handle) -> NativeResult<usize> {
        Ok(self.state.lock().executed_statement(statement)?.columns.len())
    }

    fn describe_column(
        &self,
        statement: Handle,
        position: usize,
    ) -> NativeResult<ColumnDescriptor> {
        let state = self.state.lock();
        let column = state
            .executed_statement(statement)?
            .columns
            .get(position)
            .ok_or_else(|| {
                NativeFailure::new(VARIABLE_NOT_BOUND, format!("no column at position {position}"))
            })?;
        Ok(ColumnDescriptor {
            name: column.name.clone(),
            native_type: column.native_type,
            size: column.size,
        })
    }

    fn define_by_pos(
        &self,
        statement: Handle,
        position: usize,
        define: DefineType,
    ) -> NativeResult<()> {
        self.state
            .lock()
            .statement_mut(statement)?
            .defines
            .insert(position, define);
        Ok(())
    }

    fn fetch(&self, statement: Handle, orientation: FetchOrientation) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.executed_statement(statement)?;
        let remote = state.statement_mut(statement)?;
        if !remote.scrollable && orientation != FetchOrientation::Next {
            return Err(NativeFailure::new(
                SCROLL_REQUIRED,
                "fetch orientation requires a scrollable cursor",
            ));
        }
        let total = remote.rows.len() as u64;
        let target = match orientation {
            FetchOrientation::Next => remote.position + 1,
            FetchOrientation::First => 1,
            FetchOrientation::Last => total,
            FetchOrientation::Absolute(position) => position,
        };
        if target == 0 || target > total {
            return Err(NativeFailure::new(
                native_codes::NO_DATA_FOUND,
                "no data found",
            ));
        }
        remote.position = target;
        Ok(())
    }

    fn read_defined(
        &self,
        statement: Handle,
        position: usize,
        out: &mut [u8],
    ) -> NativeResult<Fetched> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let remote = state.executed_statement(statement)?;
        let define = remote.defines.get(&position).copied().ok_or_else(|| {
            NativeFailure::new(VARIABLE_NOT_BOUND, format!("column {position} is not defined"))
        })?;
        let value = remote.current_value(position)?.clone();

        match (define, value) {
            (_, Value::Null) => Ok(Fetched::Null),
            (DefineType::Date, Value::Text(text)) => {
                let bytes = encode_native_date(&text).map_err(|_| {
                    NativeFailure::new(
                        DATE_FORMAT_MISMATCH,
                        format!("literal `{text}` does not match format string"),
                    )
                })?;
                let target = out.get_mut(..NATIVE_DATE_LEN).ok_or_else(|| {
                    NativeFailure::new(INCONSISTENT_TYPES, "date buffer is too small")
                })?;
                target.copy_from_slice(&bytes);
                Ok(Fetched::Value {
                    len: NATIVE_DATE_LEN,
                })
            }
            (DefineType::Date, _) => Err(NativeFailure::new(
                INCONSISTENT_TYPES,
                "inconsistent datatypes: expected DATE",
            )),
            (DefineType::Lob, value) => {
                let bytes = match value {
                    Value::Blob(bytes) => bytes,
                    Value::Text(text) => text.into_bytes(),
                    other => render_text(&other),
                };
                let locator = state.alloc(HandleKind::LobLocator);
                state.lobs.insert(locator.id, bytes);
                Ok(Fetched::Lob(locator))
            }
            (DefineType::Text { .. }, value) => {
                let bytes = render_text(&value);
                let copied = bytes.len().min(out.len());
                out[..copied].copy_from_slice(&bytes[..copied]);
                Ok(Fetched::Value { len: bytes.len() })
            }
        }
    }

    fn row_count(&self, statement: Handle) -> NativeResult<u64> {
        let state = self.state.lock();
        let remote = state.executed_statement(statement)?;
        Ok(remote.changed.unwrap_or(remote.position))
    }

    fn current_position(&self, statement: Handle) -> NativeResult<u64> {
        Ok(self.state.lock().executed_statement(statement)?.position)
    }

    fn param_count(&self, statement: Handle) -> NativeResult<usize> {
        self.state.lock().require(statement)?;
        Ok(0)
    }

    fn lob_length(&self, service: Handle, locator: Handle) -> NativeResult<u64> {
        let state = self.state.lock();
        state.require(service)?;
        state
            .lobs
            .get(&locator.id)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| invalid_handle(locator))
    }

    fn lob_read(
        &self,
        service: Handle,
        locator: Handle,
        offset: u64,
        out: &mut [u8],
    ) -> NativeResult<usize> {
        let state = self.state.lock();
        state.require(service)?;
        let bytes = state
            .lobs
            .get(&locator.id)
            .ok_or_else(|| invalid_handle(locator))?;
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(bytes.len());
        let copied = (bytes.len() - start).min(out.len());
        out[..copied].copy_from_slice(&bytes[start..start + copied]);
        Ok(copied)
    }

    fn trans_start(
        &self,
        service: Handle,
        transaction: Handle,
        xid: Option<&Xid>,
    ) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.require(service)?;
        state.require(transaction)?;
        if !state.in_transaction {
            state.db.execute_batch("BEGIN").map_err(native_failure)?;
            state.in_transaction = true;
        }
        if let Some(xid) = xid {
            debug!(%xid, "xa branch started on sqlite remote");
        }
        Ok(())
    }

    fn trans_detach(&self, service: Handle) -> NativeResult<()> {
        self.state.lock().require(service)
    }

    fn trans_prepare(&self, service: Handle) -> NativeResult<()> {
        self.state.lock().require(service)
    }

    fn trans_commit(&self, service: Handle, _two_phase: bool) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.require(service)?;
        if let Some(failure) = state.take_failure(|point| *point == FailurePoint::Commit) {
            return Err(failure);
        }
        state.end_transaction("COMMIT")
    }

    fn trans_rollback(&self, service: Handle) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.require(service)?;
        if let Some(failure) = state.take_failure(|point| *point == FailurePoint::Rollback) {
            return Err(failure);
        }
        state.end_transaction("ROLLBACK")
    }
}

fn register_functions(db: &rusqlite::Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    db.create_scalar_function("HEXTORAW", 1, flags, |ctx| {
        let Some(text) = ctx.get::<Option<String>>(0)? else {
            return Ok(Value::Null);
        };
        decode_hex(&text).map(Value::Blob).ok_or_else(|| {
            rusqlite::Error::UserFunctionError(format!("`{text}` is not hexadecimal").into())
        })
    })?;
    db.create_scalar_function("EMPTY_BLOB", 0, flags, |_| Ok(Value::Blob(Vec::new())))?;
    db.create_scalar_function("NVL", 2, flags, |ctx| {
        let first = ctx.get::<Value>(0)?;
        if first == Value::Null {
            ctx.get::<Value>(1)
        } else {
            Ok(first)
        }
    })?;
    db.create_scalar_function("BITAND", 2, flags, |ctx| {
        Ok(ctx.get::<i64>(0)? & ctx.get::<i64>(1)?)
    })?;
    Ok(())
}

fn run_remote(db: &rusqlite::Connection, sql: &str) -> NativeResult<Outcome> {
    match translate(sql) {
        Translated::Ignored => Ok(Outcome::Changed(0)),
        Translated::Block(body) => {
            let before = db.total_changes();
            db.execute_batch(&body).map_err(native_failure)?;
            Ok(Outcome::Changed(db.total_changes().saturating_sub(before)))
        }
        Translated::Statement(sql) => run_single(db, &sql),
    }
}

fn run_single(db: &rusqlite::Connection, sql: &str) -> NativeResult<Outcome> {
    let mut prepared = db.prepare(sql).map_err(native_failure)?;
    let described: Vec<(String, Option<String>)> = prepared
        .columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                column.decl_type().map(str::to_string),
            )
        })
        .collect();
    if described.is_empty() {
        let changed = prepared.execute([]).map_err(native_failure)?;
        return Ok(Outcome::Changed(changed as u64));
    }

    let width = described.len();
    let mut rows = Vec::new();
    let mut cursor = prepared.query([]).map_err(native_failure)?;
    while let Some(row) = cursor.next().map_err(native_failure)? {
        rows.push(
            (0..width)
                .map(|index| row.get::<_, Value>(index))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(native_failure)?,
        );
    }

    let columns = described
        .into_iter()
        .enumerate()
        .map(|(index, (name, declared))| {
            let native_type = declared
                .as_deref()
                .map(native_type_for_declared)
                .or_else(|| infer_native_type(&rows, index))
                .unwrap_or(NativeType::Varchar);
            RemoteColumn {
                name,
                native_type,
                size: declared.as_deref().and_then(declared_length).unwrap_or(0),
            }
        })
        .collect();
    Ok(Outcome::Rows { columns, rows })
}

fn translate(sql: &str) -> Translated {
    let trimmed = sql.trim();
    let upper = trimmed.to_ascii_uppercase();
    if IGNORED_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
        || (upper.starts_with("ALTER TABLE") && upper.contains(" MOVE"))
    {
        return Translated::Ignored;
    }
    if upper.starts_with("BEGIN ") && upper.ends_with("END;") {
        return Translated::Block(trimmed["BEGIN ".len()..trimmed.len() - "END;".len()].to_string());
    }
    if upper.starts_with("TRUNCATE TABLE ") {
        return Translated::Statement(format!(
            "DELETE FROM {}",
            &trimmed["TRUNCATE TABLE ".len()..]
        ));
    }
    if upper.starts_with("CREATE GLOBAL TEMPORARY TABLE ") {
        let rest = &trimmed["CREATE GLOBAL TEMPORARY TABLE ".len()..];
        let rest = ["ON COMMIT PRESERVE ROWS", "ON COMMIT DELETE ROWS"]
            .iter()
            .find_map(|clause| rest.strip_suffix(clause))
            .unwrap_or(rest);
        return Translated::Statement(format!("CREATE TABLE {}", rest.trim_end()));
    }
    let statement = trimmed.strip_suffix(" FOR UPDATE").unwrap_or(trimmed);
    Translated::Statement(statement.to_string())
}

/// Splits at the first `.NEXTVAL` or `.CURRVAL`; the flag is true for `NEXTVAL`.
fn next_pseudo_column(sql: &str) -> Option<(&str, bool, &str)> {
    let next = sql.find(".NEXTVAL").map(|at| (at, true, ".NEXTVAL".len()));
    let current = sql.find(".CURRVAL").map(|at| (at, false, ".CURRVAL".len()));
    let (at, is_next, len) = match (next, current) {
        (Some(next), Some(current)) => {
            if next.0 < current.0 {
                next
            } else {
                current
            }
        }
        (found, None) | (None, found) => found?,
    };
    Some((&sql[..at], is_next, &sql[at + len..]))
}

/// Peels a quoted `"SEQ"` or `"OWNER"."SEQ"` off the end of `before`.
fn split_sequence_reference(before: &str) -> NativeResult<(&str, Option<&str>, &str)> {
    let unquote = |text: &str| -> Option<(usize, usize)> {
        let body = text.strip_suffix('"')?;
        let open = body.rfind('"')?;
        Some((open, body.len()))
    };
    let malformed =
        || NativeFailure::new(INVALID_SQL, format!("malformed sequence reference near `{before}`"));
    let (open, close) = unquote(before).ok_or_else(malformed)?;
    let name = &before[open + 1..close];
    let head = &before[..open];
    if let Some(owner_part) = head.strip_suffix('.')
        && let Some((owner_open, owner_close)) = unquote(owner_part)
    {
        let owner = &owner_part[owner_open + 1..owner_close];
        return Ok((&owner_part[..owner_open], Some(owner), name));
    }
    Ok((head, None, name))
}

fn native_type_for_declared(declared: &str) -> NativeType {
    let upper = declared.to_ascii_uppercase();
    if upper.starts_with("DATE") {
        NativeType::Date
    } else if upper.contains("TIMESTAMP") {
        NativeType::Timestamp
    } else if upper.contains("BLOB") {
        NativeType::Blob
    } else if upper.contains("CLOB") {
        NativeType::Clob
    } else if upper.starts_with("RAW") {
        NativeType::Raw
    } else if ["DOUBLE", "FLOAT", "REAL"]
        .iter()
        .any(|name| upper.contains(name))
    {
        NativeType::BinaryDouble
    } else if ["INT", "NUMBER", "DEC", "NUMERIC"]
        .iter()
        .any(|name| upper.contains(name))
    {
        NativeType::Number
    } else if upper.starts_with("CHAR") || upper.starts_with("NCHAR") {
        NativeType::Char
    } else {
        NativeType::Varchar
    }
}

fn infer_native_type(rows: &[Vec<Value>], index: usize) -> Option<NativeType> {
    rows.iter()
        .filter_map(|row| row.get(index))
        .find_map(|value| match value {
            Value::Null => None,
            Value::Integer(_) => Some(NativeType::Number),
            Value::Real(_) => Some(NativeType::BinaryDouble),
            Value::Blob(_) => Some(NativeType::Blob),
            Value::Text(text) if text.len() == 19 && encode_native_date(text).is_ok() => {
                Some(NativeType::Date)
            }
            Value::Text(_) => Some(NativeType::Varchar),
        })
}

fn declared_length(declared: &str) -> Option<usize> {
    let (_, rest) = declared.split_once('(')?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn render_text(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => Vec::new(),
        Value::Integer(number) => number.to_string().into_bytes(),
        Value::Real(number) => number.to_string().into_bytes(),
        Value::Text(text) => text.clone().into_bytes(),
        Value::Blob(bytes) => bytes
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<String>()
            .into_bytes(),
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|start| u8::from_str_radix(text.get(start..start + 2)?, 16).ok())
        .collect()
}

fn native_failure(error: rusqlite::Error) -> NativeFailure {
    let message = error.to_string();
    let code = if message.contains("UNIQUE constraint failed") {
        native_codes::UNIQUE_CONSTRAINT
    } else if message.contains("no such table") {
        native_codes::TABLE_NOT_FOUND
    } else if message.contains("no such column") {
        NO_SUCH_COLUMN
    } else if message.contains("NOT NULL constraint failed") {
        NOT_NULL_VIOLATION
    } else {
        INVALID_SQL
    };
    NativeFailure::new(code, message)
}

fn invalid_handle(handle: Handle) -> NativeFailure {
    match handle.kind {
        HandleKind::ServiceContext | HandleKind::Server | HandleKind::Session => {
            NativeFailure::new(NOT_CONNECTED, "not connected to the remote server")
        }
        kind => NativeFailure::new(INVALID_HANDLE, format!("invalid {kind:?} handle")),
    }
}
