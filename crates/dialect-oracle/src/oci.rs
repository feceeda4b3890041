use std::time::Duration;

use tablelink_core::Xid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Environment,
    Error,
    Server,
    ServiceContext,
    Session,
    Statement,
    Transaction,
    LobLocator,
}

/// An opaque handle issued by the native client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub kind: HandleKind,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFailure {
    pub code: i32,
    pub message: String,
}

impl NativeFailure {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

pub type NativeResult<T> = std::result::Result<T, NativeFailure>;

/// Column types as reported by statement description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Varchar,
    Char,
    Number,
    BinaryDouble,
    Date,
    Timestamp,
    Raw,
    Clob,
    Blob,
    RowId,
    Long,
}

impl NativeType {
    #[must_use]
    pub fn is_lob(self) -> bool {
        matches!(self, Self::Clob | Self::Blob | Self::Long)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub native_type: NativeType,
    pub size: usize,
}

/// How a result column is bound before fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineType {
    Text { capacity: usize },
    Date,
    Lob,
}

/// Outcome of reading one defined column of the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Null,
    /// `len` is the full value length, which may exceed the buffer offered.
    Value { len: usize },
    Lob(Handle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrientation {
    Next,
    First,
    Last,
    /// One-based row position.
    Absolute(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteMode {
    pub scrollable: bool,
    pub commit_on_success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// The handle-based native client API of the remote dialect.
///
/// Implementations are shared across connections and threads; all state
/// lives behind the handles they issue.
pub trait NativeClient: Send + Sync {
    fn handle_alloc(&self, kind: HandleKind, parent: Option<Handle>) -> NativeResult<Handle>;

    fn handle_free(&self, handle: Handle);

    fn server_attach(&self, server: Handle, dblink: &str) -> NativeResult<()>;

    fn server_detach(&self, server: Handle) -> NativeResult<()>;

    fn session_begin(
        &self,
        service: Handle,
        session: Handle,
        credentials: &Credentials,
    ) -> NativeResult<()>;

    fn session_end(&self, service: Handle, session: Handle) -> NativeResult<()>;

    fn ping(&self, service: Handle) -> NativeResult<()>;

    fn set_call_timeout(&self, service: Handle, timeout: Duration) -> NativeResult<()>;

    fn prepare(&self, statement: Handle, sql: &str) -> NativeResult<()>;

    fn set_prefetch_rows(&self, statement: Handle, rows: u32) -> NativeResult<()>;

    fn execute(
        &self,
        service: Handle,
        statement: Handle,
        iterations: u32,
        mode: ExecuteMode,
    ) -> NativeResult<()>;

    fn column_count(&self, statement: Handle) -> NativeResult<usize>;

    fn describe_column(&self, statement: Handle, position: usize)
    -> NativeResult<ColumnDescriptor>;

    fn define_by_pos(
        &self,
        statement: Handle,
        position: usize,
        define: DefineType,
    ) -> NativeResult<()>;

    fn fetch(&self, statement: Handle, orientation: FetchOrientation) -> NativeResult<()>;

    /// Copies the current row's value at `position` into `out`.
    fn read_defined(
        &self,
        statement: Handle,
        position: usize,
        out: &mut [u8],
    ) -> NativeResult<Fetched>;

    fn row_count(&self, statement: Handle) -> NativeResult<u64>;

    fn current_position(&self, statement: Handle) -> NativeResult<u64>;

    fn param_count(&self, statement: Handle) -> NativeResult<usize>;

    fn lob_length(&self, service: Handle, locator: Handle) -> NativeResult<u64>;

    fn lob_read(
        &self,
        service: Handle,
        locator: Handle,
        offset: u64,
        out: &mut [u8],
    ) -> NativeResult<usize>;

    fn trans_start(
        &self,
        service: Handle,
        transaction: Handle,
        xid: Option<&Xid>,
    ) -> NativeResult<()>;

    fn trans_detach(&self, service: Handle) -> NativeResult<()>;

    fn trans_prepare(&self, service: Handle) -> NativeResult<()>;

    fn trans_commit(&self, service: Handle, two_phase: bool) -> NativeResult<()>;

    fn trans_rollback(&self, service: Handle) -> NativeResult<()>;
}
