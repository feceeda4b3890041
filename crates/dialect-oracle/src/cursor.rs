use tablelink_core::{Error, Result, SpillTable};

use crate::{
    errors::map_native,
    oci::{FetchOrientation, Handle, NativeClient},
    row::Row,
    session::Connection,
};

/// Native statement state behind the single open result set of a connection.
#[derive(Debug)]
pub(crate) struct CursorState {
    statement: Handle,
    row: Row,
    scrollable: bool,
    prefetched: bool,
    exhausted: bool,
}

impl CursorState {
    pub(crate) fn new(statement: Handle, row: Row, scrollable: bool) -> Self {
        Self {
            statement,
            row,
            scrollable,
            prefetched: false,
            exhausted: false,
        }
    }
}

/// The open result set of a [`Connection`].
///
/// Rows returned by [`ResultCursor::fetch_row`] are overwritten by the next
/// fetch; use [`ResultCursor::current_row`] to keep one.
pub struct ResultCursor<'c> {
    connection: &'c mut Connection,
}

impl<'c> ResultCursor<'c> {
    pub(crate) fn new(connection: &'c mut Connection) -> Self {
        Self { connection }
    }

    pub fn fetch_row(&mut self) -> Result<Option<&Row>> {
        let (client, service, state) = self.parts()?;
        if state.prefetched {
            state.prefetched = false;
            return Ok(Some(&state.row));
        }
        if state.exhausted {
            return Ok(None);
        }
        if !advance(client, state, FetchOrientation::Next)? {
            state.exhausted = true;
            return Ok(None);
        }
        state.row.fill(client, service, state.statement)?;
        Ok(Some(&state.row))
    }

    /// An owned copy of the last fetched row.
    #[must_use]
    pub fn current_row(&self) -> Option<Row> {
        self.connection.cursor.as_ref().map(|state| state.row.clone())
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.connection
            .cursor
            .as_ref()
            .map_or(0, |state| state.row.len())
    }

    /// Counts rows with `FETCH LAST` and rewinds with `FETCH FIRST`.
    ///
    /// The first row stays buffered for the next [`ResultCursor::fetch_row`].
    pub fn num_rows(&mut self) -> Result<u64> {
        let (client, service, state) = self.parts()?;
        require_scrollable(state)?;
        if !advance(client, state, FetchOrientation::Last)? {
            state.exhausted = true;
            return Ok(0);
        }
        let count = client
            .current_position(state.statement)
            .map_err(map_native)?;

        if advance(client, state, FetchOrientation::First)? {
            state.row.fill(client, service, state.statement)?;
            state.prefetched = true;
            state.exhausted = false;
        }
        Ok(count)
    }

    /// Positions on the zero-based row `position`; scrollable cursors only.
    pub fn move_to_pos(&mut self, position: u64) -> Result<Option<&Row>> {
        let (client, service, state) = self.parts()?;
        require_scrollable(state)?;
        let Some(absolute) = position.checked_add(1) else {
            state.exhausted = true;
            return Err(Error::EndOfData);
        };
        state.prefetched = false;
        if !advance(client, state, FetchOrientation::Absolute(absolute))? {
            state.exhausted = true;
            return Ok(None);
        }
        state.exhausted = false;
        state.row.fill(client, service, state.statement)?;
        Ok(Some(&state.row))
    }

    /// Drains the remaining rows into `spill` for local repositioning.
    pub fn materialize(&mut self, spill: &mut SpillTable) -> Result<u64> {
        let mut stored = 0;
        while let Some(row) = self.fetch_row()? {
            row.store_to_spill(spill)?;
            stored += 1;
        }
        Ok(stored)
    }

    pub fn free(self) {
        self.connection.cursor = None;
    }

    fn parts(&mut self) -> Result<(&dyn NativeClient, Handle, &mut CursorState)> {
        let service = self.connection.service_handle()?;
        let state = self
            .connection
            .cursor
            .as_mut()
            .ok_or_else(|| Error::invalid_state("result set was freed"))?;
        Ok((self.connection.client.as_ref(), service, state))
    }
}

fn require_scrollable(state: &CursorState) -> Result<()> {
    if state.scrollable {
        Ok(())
    } else {
        Err(Error::invalid_state(
            "cursor is not scrollable; materialize it into a spill table to reposition",
        ))
    }
}

/// Returns `false` when the native cursor reports no data.
fn advance(
    client: &dyn NativeClient,
    state: &CursorState,
    orientation: FetchOrientation,
) -> Result<bool> {
    match client.fetch(state.statement, orientation).map_err(map_native) {
        Ok(()) => Ok(true),
        Err(Error::EndOfData) => Ok(false),
        Err(error) => Err(error),
    }
}
