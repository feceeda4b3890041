use std::{io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub mod host_codes {
    pub const ER_OUTOFMEMORY: u32 = 1037;
    pub const ER_ACCESS_DENIED: u32 = 1045;
    pub const ER_BAD_NULL: u32 = 1048;
    pub const ER_BAD_FIELD: u32 = 1054;
    pub const ER_DUP_ENTRY: u32 = 1062;
    pub const ER_NO_SUCH_TABLE: u32 = 1146;
    pub const ER_LOCK_WAIT_TIMEOUT: u32 = 1205;
    pub const ER_LOCK_DEADLOCK: u32 = 1213;
    pub const ER_QUERY_INTERRUPTED: u32 = 1317;
    pub const ER_XAER_NOTA: u32 = 1397;
    pub const ER_DATA_TOO_LONG: u32 = 1406;
    pub const ER_CONNECT_TO_FOREIGN_DATA_SOURCE: u32 = 1429;
    pub const ER_QUERY_ON_FOREIGN_DATA_SOURCE: u32 = 1430;
    pub const ER_END_OF_FILE: u32 = 137;
    pub const ER_UNSUPPORTED_PUSHDOWN: u32 = 138;
    pub const CR_SERVER_GONE_ERROR: u32 = 2006;
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("expression cannot be pushed down to the remote dialect")]
    Unsupported,
    #[error("statement buffer could not grow to {requested} bytes")]
    OutOfMemory { requested: usize },
    #[error("duplicate entry on remote table (native error {native_code}): {message}")]
    DuplicateKey { native_code: i32, message: String },
    #[error("end of data")]
    EndOfData,
    #[error("remote server has gone away (native error {native_code}): {message}")]
    ConnectionGone { native_code: i32, message: String },
    #[error(transparent)]
    Native(#[from] NativeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Spill(#[from] SpillError),
    #[error("cannot marshal value: {message}")]
    Marshal { message: String },
    #[error("invalid state: {message}")]
    InvalidState { message: String },
    #[error("background task failed: {message}")]
    Worker { message: String },
}

impl Error {
    pub fn marshal(message: impl Into<String>) -> Self {
        Self::Marshal {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported)
    }

    #[must_use]
    pub fn is_connection_gone(&self) -> bool {
        matches!(self, Self::ConnectionGone { .. })
    }

    #[must_use]
    pub fn host_code(&self) -> u32 {
        match self {
            Self::Unsupported => host_codes::ER_UNSUPPORTED_PUSHDOWN,
            Self::OutOfMemory { .. } => host_codes::ER_OUTOFMEMORY,
            Self::DuplicateKey { .. } => host_codes::ER_DUP_ENTRY,
            Self::EndOfData => host_codes::ER_END_OF_FILE,
            Self::ConnectionGone { .. } => host_codes::CR_SERVER_GONE_ERROR,
            Self::Native(error) => error.host_code,
            Self::Config(_) => host_codes::ER_CONNECT_TO_FOREIGN_DATA_SOURCE,
            Self::Spill(_)
            | Self::Marshal { .. }
            | Self::InvalidState { .. }
            | Self::Worker { .. } => host_codes::ER_QUERY_ON_FOREIGN_DATA_SOURCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote dialect error {native_code}: {message}")]
pub struct NativeError {
    pub native_code: i32,
    pub host_code: u32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration")]
    Parse(#[source] serde_yaml::Error),
    #[error("link record `{key}` is missing field `{field}`")]
    MissingField { key: String, field: &'static str },
    #[error("link record `{key}` has invalid value `{value}` for `{field}`")]
    InvalidField {
        key: String,
        field: &'static str,
        value: String,
    },
    #[error("no shard links configured")]
    NoLinks,
    #[error("shard link {link} is out of range ({count} links configured)")]
    LinkOutOfRange { link: usize, count: usize },
}

#[derive(Debug, Error)]
#[error("spill table operation `{operation}` failed")]
pub struct SpillError {
    pub operation: &'static str,
    #[source]
    pub source: rusqlite::Error,
}
