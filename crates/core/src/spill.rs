use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::{HostRow, Result, SpillError};

const CREATE_SQL: &str = "CREATE TABLE spill (seq INTEGER PRIMARY KEY, lengths BLOB NOT NULL, payload BLOB NOT NULL)";
const INSERT_SQL: &str = "INSERT INTO spill (seq, lengths, payload) VALUES (?1, ?2, ?3)";
const NEXT_SQL: &str = "SELECT seq, lengths, payload FROM spill WHERE seq > ?1 ORDER BY seq LIMIT 1";
const AT_SQL: &str = "SELECT lengths, payload FROM spill WHERE seq = ?1";
const COUNT_SQL: &str = "SELECT COUNT(*) FROM spill";
const CLEAR_SQL: &str = "DELETE FROM spill";

/// An ephemeral local table of encoded rows, kept outside the remote dialect.
///
/// Each row is stored as its length vector and concatenated payload, so it can
/// be replayed byte for byte. Positions are zero-based insertion order.
pub struct SpillTable {
    connection: Connection,
    next_seq: i64,
    cursor: i64,
}

impl SpillTable {
    pub fn create() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(spill_error("open"))?;
        connection
            .execute(CREATE_SQL, params![])
            .map_err(spill_error("create"))?;
        debug!("created spill table");
        Ok(Self {
            connection,
            next_seq: 0,
            cursor: -1,
        })
    }

    pub fn insert_row(&mut self, row: &HostRow) -> Result<u64> {
        let (lengths, payload) = row.encode();
        self.insert_encoded(&lengths, &payload)
    }

    pub fn insert_encoded(&mut self, lengths: &[u8], payload: &[u8]) -> Result<u64> {
        let seq = self.next_seq;
        self.connection
            .execute(INSERT_SQL, params![seq, lengths, payload])
            .map_err(spill_error("insert"))?;
        self.next_seq += 1;
        Ok(seq as u64)
    }

    pub fn len(&self) -> Result<u64> {
        let count: i64 = self
            .connection
            .query_row(COUNT_SQL, params![], |row| row.get(0))
            .map_err(spill_error("count"))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn rewind(&mut self) {
        self.cursor = -1;
    }

    pub fn next_row(&mut self) -> Result<Option<HostRow>> {
        let found = self
            .connection
            .query_row(NEXT_SQL, params![self.cursor], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .optional()
            .map_err(spill_error("next"))?;

        match found {
            Some((seq, lengths, payload)) => {
                self.cursor = seq;
                HostRow::decode(&lengths, &payload).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Reads the row at `position` and leaves the scan cursor on it.
    pub fn row_at(&mut self, position: u64) -> Result<Option<HostRow>> {
        let seq = position as i64;
        let found = self
            .connection
            .query_row(AT_SQL, params![seq], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .optional()
            .map_err(spill_error("position"))?;

        match found {
            Some((lengths, payload)) => {
                self.cursor = seq;
                HostRow::decode(&lengths, &payload).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        self.connection
            .execute(CLEAR_SQL, params![])
            .map_err(spill_error("clear"))?;
        self.next_seq = 0;
        self.cursor = -1;
        Ok(())
    }
}

impl std::fmt::Debug for SpillTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpillTable")
            .field("next_seq", &self.next_seq)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

fn spill_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> crate::Error {
    move |source| SpillError { operation, source }.into()
}
