use std::fmt;

/// A distributed transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Xid {
    pub format_id: i64,
    pub gtrid: Vec<u8>,
    pub bqual: Vec<u8>,
}

impl Xid {
    pub const MAX_GTRID_LENGTH: usize = 64;
    pub const MAX_BQUAL_LENGTH: usize = 64;

    pub fn new(format_id: i64, gtrid: impl Into<Vec<u8>>, bqual: impl Into<Vec<u8>>) -> Self {
        Self {
            format_id,
            gtrid: gtrid.into(),
            bqual: bqual.into(),
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.gtrid.is_empty()
            && self.gtrid.len() <= Self::MAX_GTRID_LENGTH
            && self.bqual.len() <= Self::MAX_BQUAL_LENGTH
    }

    /// Catalog key for the XA failure log.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.format_id,
            hex(&self.gtrid),
            hex(&self.bqual)
        )
    }
}

impl fmt::Display for Xid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X'{}',X'{}',{}",
            hex(&self.gtrid),
            hex(&self.bqual),
            self.format_id
        )
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
