use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use tablelink_core::{
    AdapterConfig, BackgroundWorker, Error, LinkConfig, LockRegistry, Pending, Result, Shared,
    TableLockMode, TimeoutSource, Xid,
};
use tracing::{debug, info, warn};

use crate::{
    cursor::{CursorState, ResultCursor},
    errors::map_native,
    oci::{Credentials, ExecuteMode, Handle, HandleKind, NativeClient},
    row::Row,
    txn::Transaction,
};

const NLS_INIT_SQL: &[&str] = &[
    "ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS'",
    "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24:MI:SSXFF'",
    "ALTER SESSION SET NLS_NUMERIC_CHARACTERS = '.,'",
];
const ISOLATION_SQL_PREFIX: &str = "ALTER SESSION SET ISOLATION_LEVEL = ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Isolation {
    /// The dialect only has two levels; weaker requests round down, stronger up.
    #[must_use]
    pub fn remote_level(self) -> &'static str {
        match self {
            Self::ReadUncommitted | Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead | Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Whether a statement is safe to resend after the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Read,
    Write,
}

impl QueryKind {
    #[must_use]
    pub fn of(sql: &str) -> Self {
        let head: String = sql
            .trim_start()
            .chars()
            .take(6)
            .map(|ch| ch.to_ascii_uppercase())
            .collect();
        if head.starts_with("SELECT") || head.starts_with("WITH") {
            Self::Read
        } else {
            Self::Write
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub link: usize,
    pub config: LinkConfig,
    pub retry_count: u32,
    pub retry_interval: Duration,
    pub timeouts: TimeoutSource,
}

impl ConnectParams {
    pub fn from_config(config: &AdapterConfig, link: usize, timeouts: TimeoutSource) -> Result<Self> {
        Ok(Self {
            link,
            config: config.link(link)?.clone(),
            retry_count: config.connect_retry_count,
            retry_interval: config.connect_retry_interval(),
            timeouts,
        })
    }

    fn dblink(&self) -> String {
        format!(
            "//{}:{}/{}",
            self.config.host, self.config.port, self.config.service
        )
    }
}

/// Flags shared with a session-health watchdog.
#[derive(Debug, Default)]
pub struct SessionMonitor {
    need_monitor: AtomicBool,
    force_reconnect: AtomicBool,
}

impl SessionMonitor {
    /// True while a native call is in flight.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.need_monitor.load(Ordering::Acquire)
    }

    pub fn request_reconnect(&self) {
        self.force_reconnect.store(true, Ordering::Release);
    }

    fn take_reconnect_request(&self) -> bool {
        self.force_reconnect.swap(false, Ordering::AcqRel)
    }

    fn set_monitoring(&self, active: bool) {
        self.need_monitor.store(active, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionHandles {
    environment: Handle,
    error: Handle,
    server: Handle,
    pub(crate) service: Handle,
    session: Handle,
    pub(crate) statement: Handle,
}

/// One native session to one shard link.
pub struct Connection {
    pub(crate) client: Arc<dyn NativeClient>,
    params: ConnectParams,
    state: SessionState,
    handles: Option<SessionHandles>,
    transaction: Option<Handle>,
    pub(crate) cursor: Option<CursorState>,
    isolation: Option<&'static str>,
    autocommit: bool,
    table_locked: bool,
    locks: LockRegistry,
    monitor: Arc<SessionMonitor>,
    last_error: Option<String>,
    worker: Option<BackgroundWorker>,
    pending_connect: Option<Pending<Result<SessionHandles>>>,
    pending_disconnect: Option<Pending<()>>,
    affected_rows: u64,
    reconnects: u64,
}

impl Connection {
    pub fn new(client: Arc<dyn NativeClient>, params: ConnectParams) -> Self {
        Self {
            client,
            params,
            state: SessionState::Disconnected,
            handles: None,
            transaction: None,
            cursor: None,
            isolation: None,
            autocommit: false,
            table_locked: false,
            locks: LockRegistry::new(),
            monitor: Arc::new(SessionMonitor::default()),
            last_error: None,
            worker: None,
            pending_connect: None,
            pending_disconnect: None,
            affected_rows: 0,
            reconnects: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn link(&self) -> usize {
        self.params.link
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn monitor(&self) -> Arc<SessionMonitor> {
        Arc::clone(&self.monitor)
    }

    #[must_use]
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    #[must_use]
    pub fn is_table_locked(&self) -> bool {
        self.table_locked
    }

    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn connect(&mut self) -> Result<()> {
        self.wait_pending_disconnect()?;
        if self.state == SessionState::Connected {
            return Ok(());
        }
        self.state = SessionState::Connecting;
        let outcome = connect_with_retry(self.client.as_ref(), &self.params);
        self.finish_connect(outcome)
    }

    /// Starts connecting on the connection's worker; the first statement waits for it.
    pub fn bg_connect(&mut self) -> Result<()> {
        if self.state == SessionState::Connected || self.pending_connect.is_some() {
            return Ok(());
        }
        self.wait_pending_disconnect()?;
        let client = Arc::clone(&self.client);
        let params = self.params.clone();
        let worker = self.worker()?;
        let pending = worker.submit("connect", move || {
            connect_with_retry(client.as_ref(), &params)
        });
        self.pending_connect = Some(pending);
        self.state = SessionState::Connecting;
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        self.wait_pending_connect_silently();
        self.state = SessionState::Disconnecting;
        self.release_session_state();
        if let Some(handles) = self.handles.take() {
            close_session(self.client.as_ref(), &handles);
            info!(link = self.params.link, "disconnected from remote link");
        }
        self.state = SessionState::Disconnected;
        Ok(())
    }

    /// Hands session teardown to the worker and returns immediately.
    pub fn bg_disconnect(&mut self) -> Result<()> {
        self.wait_pending_connect_silently();
        self.state = SessionState::Disconnecting;
        self.release_session_state();
        if let Some(handles) = self.handles.take() {
            let client = Arc::clone(&self.client);
            let link = self.params.link;
            let worker = self.worker()?;
            let pending = worker.submit("disconnect", move || {
                close_session(client.as_ref(), &handles);
                info!(link, "disconnected from remote link");
            });
            self.pending_disconnect = Some(pending);
        }
        self.state = SessionState::Disconnected;
        Ok(())
    }

    pub fn ping(&mut self) -> Result<()> {
        self.ensure_connected()?;
        let service = self.service_handle()?;
        self.client.ping(service).map_err(map_native)
    }

    /// Executes `sql`, classifying it as a read or a write from its first keyword.
    pub fn exec_query(&mut self, sql: &str) -> Result<()> {
        self.exec_query_with(sql, QueryKind::of(sql), false)
    }

    /// Executes `sql`; a read that loses its connection is resent exactly once.
    pub fn exec_query_with(&mut self, sql: &str, kind: QueryKind, scrollable: bool) -> Result<()> {
        if self.monitor.take_reconnect_request() {
            warn!(link = self.params.link, "watchdog requested reconnect");
            self.disconnect()?;
        }
        self.ensure_connected()?;
        self.flush_pending_lock()?;

        match self.run_statement(sql, kind, scrollable) {
            Err(error) if error.is_connection_gone() => {
                self.mark_gone(&error);
                if kind == QueryKind::Write {
                    return Err(error);
                }
                warn!(
                    link = self.params.link,
                    %error,
                    "connection lost during read; reconnecting and resending once"
                );
                self.reconnects += 1;
                self.ensure_connected()?;
                let retried = self.run_statement(sql, kind, scrollable);
                if let Err(error) = &retried
                    && error.is_connection_gone()
                {
                    self.mark_gone(error);
                }
                retried
            }
            other => other,
        }
    }

    pub fn store_result(&mut self) -> Result<ResultCursor<'_>> {
        if self.cursor.is_none() {
            return Err(Error::invalid_state("no result set is open"));
        }
        Ok(ResultCursor::new(self))
    }

    pub fn set_isolation(&mut self, isolation: Isolation) -> Result<()> {
        let level = isolation.remote_level();
        if self.isolation == Some(level) {
            debug!(link = self.params.link, level, "isolation level unchanged");
            return Ok(());
        }
        let sql = format!("{ISOLATION_SQL_PREFIX}{level}");
        self.exec_query_with(&sql, QueryKind::Write, false)?;
        self.isolation = Some(level);
        Ok(())
    }

    /// Autocommit is an execute-mode flag, so changing it costs no round trip.
    pub fn set_autocommit(&mut self, autocommit: bool) {
        if self.autocommit != autocommit {
            debug!(link = self.params.link, autocommit, "autocommit changed");
            self.autocommit = autocommit;
        }
    }

    /// Queues a `LOCK TABLE` for the next statement; names must already be quoted.
    pub fn append_lock_table(&mut self, database: &str, table: &str, mode: TableLockMode) {
        self.locks.insert(database, table, mode);
    }

    #[must_use]
    pub fn pending_lock_count(&self) -> usize {
        self.locks.len()
    }

    /// Releases table locks by committing.
    pub fn unlock_tables(&mut self) -> Result<()> {
        self.locks.reset();
        if self.table_locked {
            self.commit()?;
        }
        self.table_locked = false;
        Ok(())
    }

    pub fn begin_transaction(&mut self) -> Result<Transaction<'_>> {
        self.start_transaction(None)?;
        Ok(Transaction::new(self))
    }

    pub fn start_transaction(&mut self, xid: Option<&Xid>) -> Result<()> {
        self.ensure_connected()?;
        let service = self.service_handle()?;
        if let Some(previous) = self.transaction.take() {
            self.client.handle_free(previous);
        }
        let transaction = self
            .client
            .handle_alloc(HandleKind::Transaction, Some(service))
            .map_err(map_native)?;
        self.transaction = Some(transaction);
        debug!(link = self.params.link, xa = xid.is_some(), "starting transaction");
        self.client
            .trans_start(service, transaction, xid)
            .map_err(map_native)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.finish_transaction(|client, service| client.trans_commit(service, false))
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.finish_transaction(|client, service| client.trans_rollback(service))
    }

    pub fn xa_start(&mut self, xid: &Xid) -> Result<()> {
        self.start_transaction(Some(xid))
    }

    pub fn xa_end(&mut self, xid: &Xid) -> Result<()> {
        let service = self.service_handle()?;
        debug!(link = self.params.link, %xid, "ending xa branch");
        self.client.trans_detach(service).map_err(map_native)
    }

    pub fn xa_prepare(&mut self, xid: &Xid) -> Result<()> {
        let service = self.service_handle()?;
        debug!(link = self.params.link, %xid, "preparing xa branch");
        self.client.trans_prepare(service).map_err(map_native)
    }

    pub fn xa_commit(&mut self, xid: &Xid, one_phase: bool) -> Result<()> {
        debug!(link = self.params.link, %xid, one_phase, "committing xa branch");
        self.finish_transaction(|client, service| client.trans_commit(service, !one_phase))
    }

    pub fn xa_rollback(&mut self, xid: &Xid) -> Result<()> {
        debug!(link = self.params.link, %xid, "rolling back xa branch");
        self.finish_transaction(|client, service| client.trans_rollback(service))
    }

    pub(crate) fn service_handle(&self) -> Result<Handle> {
        self.handles
            .map(|handles| handles.service)
            .ok_or_else(|| Error::invalid_state("connection is not established"))
    }

    pub(crate) fn ensure_connected(&mut self) -> Result<()> {
        if let Some(pending) = self.pending_connect.take() {
            let outcome = self.worker()?.wait(pending)?;
            return self.finish_connect(outcome);
        }
        if self.state != SessionState::Connected {
            return self.connect();
        }
        Ok(())
    }

    fn finish_connect(&mut self, outcome: Result<SessionHandles>) -> Result<()> {
        match outcome {
            Ok(handles) => {
                self.handles = Some(handles);
                self.state = SessionState::Connected;
                self.isolation = None;
                self.last_error = None;
                info!(link = self.params.link, "connected to remote link");
                Ok(())
            }
            Err(error) => {
                self.state = SessionState::Disconnected;
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn run_statement(&mut self, sql: &str, kind: QueryKind, scrollable: bool) -> Result<()> {
        let handles = self
            .handles
            .ok_or_else(|| Error::invalid_state("connection is not established"))?;
        self.cursor = None;

        let timeouts = self.params.timeouts.get();
        let timeout = match kind {
            QueryKind::Read => timeouts.read(),
            QueryKind::Write => timeouts.write(),
        };
        let client = self.client.as_ref();
        client
            .set_call_timeout(handles.service, timeout)
            .map_err(map_native)?;

        debug!(link = self.params.link, ?kind, sql, "executing statement");
        let (prefetch, iterations) = match kind {
            QueryKind::Read => (0, 0),
            QueryKind::Write => (1, 1),
        };
        client
            .prepare(handles.statement, sql)
            .map_err(map_native)?;
        client
            .set_prefetch_rows(handles.statement, prefetch)
            .map_err(map_native)?;

        let mode = ExecuteMode {
            scrollable,
            commit_on_success: kind == QueryKind::Write
                && self.autocommit
                && self.transaction.is_none()
                && !self.table_locked,
        };
        self.monitor.set_monitoring(true);
        let executed = client.execute(handles.service, handles.statement, iterations, mode);
        self.monitor.set_monitoring(false);
        if let Err(failure) = executed {
            let error = map_native(failure);
            self.last_error = Some(error.to_string());
            return Err(error);
        }

        match kind {
            QueryKind::Read => {
                let row = Row::define(client, handles.statement)?;
                self.cursor = Some(CursorState::new(handles.statement, row, scrollable));
                self.affected_rows = 0;
            }
            QueryKind::Write => {
                self.affected_rows = client.row_count(handles.statement).map_err(map_native)?;
            }
        }
        Ok(())
    }

    /// Issues `LOCK TABLE` for the first still-pending registry entry. The
    /// entry leaves the registry only once the remote accepted it.
    fn flush_pending_lock(&mut self) -> Result<()> {
        let Some(request) = self.locks.first_pending() else {
            return Ok(());
        };
        let sql = lock_table_statement(
            &request.target.database,
            &request.target.table,
            request.mode,
        );
        // Marked first so the lock statement itself is not committed on success.
        let was_locked = self.table_locked;
        self.table_locked = true;
        let result = self.run_statement(&sql, QueryKind::Write, false);
        match &result {
            Ok(()) => self.locks.complete(&request),
            Err(error) => {
                self.table_locked = was_locked;
                warn!(%error, table = %request.target.table, "table lock kept pending for retry");
            }
        }
        result
    }

    fn finish_transaction(
        &mut self,
        finish: impl FnOnce(&dyn NativeClient, Handle) -> crate::oci::NativeResult<()>,
    ) -> Result<()> {
        let service = self.service_handle()?;
        let result = finish(self.client.as_ref(), service).map_err(map_native);
        if let Some(transaction) = self.transaction.take() {
            self.client.handle_free(transaction);
        }
        result
    }

    fn mark_gone(&mut self, error: &Error) {
        warn!(link = self.params.link, %error, "remote server has gone away");
        self.last_error = Some(error.to_string());
        self.release_session_state();
        if let Some(handles) = self.handles.take() {
            close_session(self.client.as_ref(), &handles);
        }
        self.state = SessionState::Disconnected;
    }

    fn release_session_state(&mut self) {
        self.cursor = None;
        if let Some(transaction) = self.transaction.take() {
            self.client.handle_free(transaction);
        }
        self.isolation = None;
        self.table_locked = false;
    }

    fn worker(&mut self) -> Result<&BackgroundWorker> {
        if self.worker.is_none() {
            self.worker = Some(BackgroundWorker::new()?);
        }
        self.worker
            .as_ref()
            .ok_or_else(|| Error::invalid_state("background worker unavailable"))
    }

    fn wait_pending_disconnect(&mut self) -> Result<()> {
        if let Some(pending) = self.pending_disconnect.take() {
            self.worker()?.wait(pending)?;
        }
        Ok(())
    }

    fn wait_pending_connect_silently(&mut self) {
        if let Some(pending) = self.pending_connect.take() {
            let outcome = self
                .worker()
                .and_then(|worker| worker.wait(pending))
                .and_then(|outcome| outcome);
            match outcome {
                Ok(handles) => self.handles = Some(handles),
                Err(error) => self.last_error = Some(error.to_string()),
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(error) = self.wait_pending_disconnect() {
            warn!(link = self.params.link, %error, "background disconnect failed");
        }
        if self.handles.is_some() || self.pending_connect.is_some() {
            if let Err(error) = self.disconnect() {
                warn!(link = self.params.link, %error, "disconnect on drop failed");
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("link", &self.params.link)
            .field("state", &self.state)
            .field("autocommit", &self.autocommit)
            .field("table_locked", &self.table_locked)
            .finish_non_exhaustive()
    }
}

/// Lazily opened connections, one per shard link.
pub struct LinkConnections {
    client: Arc<dyn NativeClient>,
    config: AdapterConfig,
    timeouts: TimeoutSource,
    connections: Vec<Option<Shared<Connection>>>,
}

impl LinkConnections {
    #[must_use]
    pub fn new(client: Arc<dyn NativeClient>, config: AdapterConfig) -> Self {
        let timeouts = TimeoutSource::new(config.timeouts);
        let connections = vec![None; config.links.len()];
        Self {
            client,
            config,
            timeouts,
            connections,
        }
    }

    /// Timeouts read by every connection before each statement.
    #[must_use]
    pub fn timeouts(&self) -> &TimeoutSource {
        &self.timeouts
    }

    /// The connection for `link`, created on first use and not yet connected.
    pub fn get(&mut self, link: usize) -> Result<Shared<Connection>> {
        let params = ConnectParams::from_config(&self.config, link, self.timeouts.clone())?;
        let slot = self
            .connections
            .get_mut(link)
            .ok_or_else(|| Error::invalid_state(format!("no connection slot for link {link}")))?;
        let connection = slot.get_or_insert_with(|| {
            Shared::new(Connection::new(Arc::clone(&self.client), params))
        });
        Ok(connection.clone())
    }

    /// Drops the connection for `link`; the next [`LinkConnections::get`] opens a new one.
    pub fn close(&mut self, link: usize) -> Result<()> {
        if let Some(connection) = self.connections.get_mut(link).and_then(Option::take) {
            connection.lock().bg_disconnect()?;
        }
        Ok(())
    }
}

impl fmt::Debug for LinkConnections {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConnections")
            .field("links", &self.connections.len())
            .field(
                "open",
                &self.connections.iter().filter(|slot| slot.is_some()).count(),
            )
            .finish_non_exhaustive()
    }
}

#[must_use]
pub fn lock_mode_keyword(mode: TableLockMode) -> &'static str {
    match mode {
        TableLockMode::ReadLocal => "ROW SHARE",
        TableLockMode::Read => "SHARE",
        TableLockMode::LowPriorityWrite => "ROW EXCLUSIVE",
        TableLockMode::Write => "EXCLUSIVE",
    }
}

/// `LOCK TABLE` text for an owner and table that are already quoted.
#[must_use]
pub fn lock_table_statement(database: &str, table: &str, mode: TableLockMode) -> String {
    format!("LOCK TABLE {database}.{table} IN {} MODE", lock_mode_keyword(mode))
}

fn connect_with_retry(client: &dyn NativeClient, params: &ConnectParams) -> Result<SessionHandles> {
    let mut attempt = 0;
    loop {
        match open_session(client, params) {
            Ok(handles) => return Ok(handles),
            Err(error) if attempt < params.retry_count => {
                attempt += 1;
                warn!(
                    link = params.link,
                    attempt,
                    %error,
                    "connect failed; retrying"
                );
                thread::sleep(params.retry_interval);
            }
            Err(error) => return Err(error),
        }
    }
}

/// Handles acquired so far during connect, released in reverse on failure.
struct Acquired<'a> {
    client: &'a dyn NativeClient,
    handles: Vec<Handle>,
    attached: Option<Handle>,
    session: Option<(Handle, Handle)>,
}

impl<'a> Acquired<'a> {
    fn new(client: &'a dyn NativeClient) -> Self {
        Self {
            client,
            handles: Vec::with_capacity(6),
            attached: None,
            session: None,
        }
    }

    fn alloc(&mut self, kind: HandleKind, parent: Option<Handle>) -> Result<Handle> {
        let handle = self.client.handle_alloc(kind, parent).map_err(map_native)?;
        self.handles.push(handle);
        Ok(handle)
    }

    fn disarm(mut self) {
        self.handles.clear();
        self.attached = None;
        self.session = None;
    }
}

impl Drop for Acquired<'_> {
    fn drop(&mut self) {
        if let Some((service, session)) = self.session.take() {
            let _ = self.client.session_end(service, session);
        }
        if let Some(server) = self.attached.take() {
            let _ = self.client.server_detach(server);
        }
        while let Some(handle) = self.handles.pop() {
            self.client.handle_free(handle);
        }
    }
}

fn open_session(client: &dyn NativeClient, params: &ConnectParams) -> Result<SessionHandles> {
    let mut acquired = Acquired::new(client);
    let environment = acquired.alloc(HandleKind::Environment, None)?;
    let error = acquired.alloc(HandleKind::Error, Some(environment))?;
    let server = acquired.alloc(HandleKind::Server, Some(environment))?;
    client
        .server_attach(server, &params.dblink())
        .map_err(|failure| connect_error(map_native(failure)))?;
    acquired.attached = Some(server);

    let service = acquired.alloc(HandleKind::ServiceContext, Some(environment))?;
    let session = acquired.alloc(HandleKind::Session, Some(environment))?;
    let credentials = Credentials {
        user: params.config.user.clone(),
        password: params.config.password.clone(),
    };
    client
        .session_begin(service, session, &credentials)
        .map_err(|failure| connect_error(map_native(failure)))?;
    acquired.session = Some((service, session));

    let statement = acquired.alloc(HandleKind::Statement, Some(environment))?;
    let timeout = params.timeouts.get().connect();
    client
        .set_call_timeout(service, timeout)
        .map_err(map_native)?;
    for sql in NLS_INIT_SQL {
        debug!(link = params.link, sql, "initializing session");
        client.prepare(statement, sql).map_err(map_native)?;
        client
            .execute(service, statement, 1, ExecuteMode::default())
            .map_err(map_native)?;
    }

    acquired.disarm();
    Ok(SessionHandles {
        environment,
        error,
        server,
        service,
        session,
        statement,
    })
}

fn close_session(client: &dyn NativeClient, handles: &SessionHandles) {
    if let Err(failure) = client.session_end(handles.service, handles.session) {
        warn!(code = failure.code, message = %failure.message, "session end failed");
    }
    if let Err(failure) = client.server_detach(handles.server) {
        warn!(code = failure.code, message = %failure.message, "server detach failed");
    }
    for handle in [
        handles.statement,
        handles.session,
        handles.service,
        handles.server,
        handles.error,
        handles.environment,
    ] {
        client.handle_free(handle);
    }
}

fn connect_error(error: Error) -> Error {
    match error {
        Error::Native(mut native) => {
            if native.host_code == tablelink_core::host_codes::ER_QUERY_ON_FOREIGN_DATA_SOURCE {
                native.host_code = tablelink_core::host_codes::ER_CONNECT_TO_FOREIGN_DATA_SOURCE;
            }
            Error::Native(native)
        }
        other => other,
    }
}
