mod bka;
mod bulk;
mod cursor;
mod date;
mod errors;
mod handler;
mod names;
mod oci;
mod pagination;
mod quote;
mod row;
mod serializer;
mod session;
mod stats;
mod txn;

pub use bka::{BkaBatch, BkaScan, BkaStage, staged_table_name};
pub use bulk::{BulkMutationBuffer, Mutation};
pub use cursor::ResultCursor;
pub use date::{NATIVE_DATE_LEN, ZERO_DATE, decode_native_date, encode_native_date};
pub use errors::{host_code_for, is_dup_entry, is_server_gone, is_xa_nota, map_native};
pub use handler::{Maintenance, OracleHandler, OracleShare, append_condition_joiner};
pub use names::RemoteTableNameCache;
pub use oci::{
    ColumnDescriptor, Credentials, DefineType, ExecuteMode, FetchOrientation, Fetched, Handle,
    HandleKind, NativeClient, NativeFailure, NativeResult, NativeType,
};
pub use pagination::{
    OrderTerm, ROW_NUMBER_ALIAS, append_order_terms, apply_to_dml, apply_to_select,
    reappend_limit,
};
pub use quote::{
    append_column_value, append_escaped, append_hex_literal, append_identifier,
    append_string_literal, is_numeric_literal, oracle_column_type, quote_identifier,
};
pub use row::Row;
pub use serializer::OracleSerializer;
pub use session::{
    ConnectParams, Connection, Isolation, LinkConnections, QueryKind, SessionMonitor,
    SessionState, lock_mode_keyword, lock_table_statement,
};
pub use stats::StatisticsReader;
pub use txn::{BranchPhase, Transaction, TransactionBranch};

/// Native error codes the remote dialect reports for conditions callers react to.
pub mod native_codes {
    pub use crate::errors::{
        CURRVAL_NOT_DEFINED, NO_DATA_FOUND, TABLE_NOT_FOUND, UNIQUE_CONSTRAINT, XA_NOT_FOUND,
    };
}
