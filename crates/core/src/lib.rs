mod buffer;
mod catalog;
mod config;
mod error;
mod expr;
mod guard;
mod lock;
mod row;
mod schema;
mod spill;
mod worker;
mod xid;

pub use buffer::{Bookmark, StatementBuffer};
pub use catalog::{
    CatalogAccessor, CatalogRecord, CatalogTable, MemoryCatalog, TableStatistics,
    cardinality_from_record, cardinality_record,
};
pub use config::{
    AdapterConfig, BkaMode, BkaOptions, KeyHint, LinkConfig, LinkStatus, TimeoutSource, Timeouts,
};
pub use error::{ConfigError, Error, NativeError, Result, SpillError, host_codes};
pub use expr::{
    AggregateFunc, ArithmeticOp, ComparisonOp, ConditionSerializer, Connective, Expr,
    IntervalUnit, Literal, SpatialOp,
};
pub use guard::{HeldLock, Shared};
pub use lock::{LockRegistry, LockRequest, LockTarget, TableLockMode};
pub use row::{FieldValue, HostRow};
pub use schema::{
    ColumnDef, HostType, KeyBound, KeyDef, KeyRange, LinkTarget, OrderKey, Page, SortOrder,
    TableDef,
};
pub use spill::SpillTable;
pub use worker::{BackgroundWorker, Pending};
pub use xid::Xid;
