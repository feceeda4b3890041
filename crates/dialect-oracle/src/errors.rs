use tablelink_core::{Error, NativeError, host_codes};

use crate::oci::NativeFailure;

pub const NO_DATA_FOUND: i32 = 1403;
pub const UNIQUE_CONSTRAINT: i32 = 1;
pub const TABLE_NOT_FOUND: i32 = 942;
pub const XA_NOT_FOUND: i32 = 24756;
pub const CURRVAL_NOT_DEFINED: i32 = 8002;

const SERVER_GONE_CODES: &[i32] = &[28, 3113, 3114, 3135, 12152, 12537, 12541, 12547, 12570];

const NATIVE_TO_HOST: &[(i32, u32)] = &[
    (TABLE_NOT_FOUND, host_codes::ER_NO_SUCH_TABLE),
    (54, host_codes::ER_LOCK_WAIT_TIMEOUT),
    (60, host_codes::ER_LOCK_DEADLOCK),
    (XA_NOT_FOUND, host_codes::ER_XAER_NOTA),
    (1017, host_codes::ER_ACCESS_DENIED),
    (904, host_codes::ER_BAD_FIELD),
    (1400, host_codes::ER_BAD_NULL),
    (12899, host_codes::ER_DATA_TOO_LONG),
    (1013, host_codes::ER_QUERY_INTERRUPTED),
];

#[must_use]
pub fn is_server_gone(code: i32) -> bool {
    SERVER_GONE_CODES.contains(&code)
}

#[must_use]
pub fn is_dup_entry(code: i32) -> bool {
    code == UNIQUE_CONSTRAINT
}

#[must_use]
pub fn is_xa_nota(code: i32) -> bool {
    code == XA_NOT_FOUND
}

#[must_use]
pub fn host_code_for(code: i32) -> u32 {
    NATIVE_TO_HOST
        .iter()
        .find_map(|(native, host)| (*native == code).then_some(*host))
        .unwrap_or(host_codes::ER_QUERY_ON_FOREIGN_DATA_SOURCE)
}

/// Maps a native failure onto the host error taxonomy.
#[must_use]
pub fn map_native(failure: NativeFailure) -> Error {
    let NativeFailure { code, message } = failure;
    match code {
        NO_DATA_FOUND => Error::EndOfData,
        UNIQUE_CONSTRAINT => Error::DuplicateKey {
            native_code: code,
            message,
        },
        code if is_server_gone(code) => Error::ConnectionGone {
            native_code: code,
            message,
        },
        code => Error::Native(NativeError {
            native_code: code,
            host_code: host_code_for(code),
            message,
        }),
    }
}
