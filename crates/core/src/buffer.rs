use std::{collections::BTreeMap, fmt, ops::Range};

use crate::{Error, Result};

/// Named offsets into a [`StatementBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bookmark {
    SelectList,
    From,
    TableName,
    Where,
    Order,
    Limit,
    Lock,
    UpdateSet,
    Values,
}

/// Append-only statement text with integer bookmarks.
///
/// Bookmarks are plain offsets, so growth of the backing store never
/// invalidates them. Edits that move text (`insert_at`, `splice`) shift the
/// affected bookmarks explicitly; `truncate_to` forgets every bookmark past
/// the new end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementBuffer {
    text: String,
    bookmarks: BTreeMap<Bookmark, usize>,
}

impl StatementBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.reserve(capacity)?;
        Ok(buffer)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let requested = self.text.len().saturating_add(additional);
        self.text
            .try_reserve(additional)
            .map_err(|_| Error::OutOfMemory { requested })
    }

    pub fn append(&mut self, text: &str) -> Result<()> {
        self.reserve(text.len())?;
        self.text.push_str(text);
        Ok(())
    }

    pub fn append_char(&mut self, ch: char) -> Result<()> {
        self.reserve(ch.len_utf8())?;
        self.text.push(ch);
        Ok(())
    }

    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        match args.as_str() {
            Some(text) => self.append(text),
            None => self.append(&args.to_string()),
        }
    }

    pub fn bookmark(&mut self, name: Bookmark) -> usize {
        let position = self.text.len();
        self.bookmarks.insert(name, position);
        position
    }

    pub fn set_bookmark(&mut self, name: Bookmark, position: usize) -> Result<()> {
        if position > self.text.len() {
            return Err(Error::invalid_state(format!(
                "bookmark {name:?} at {position} is past the end of a {}-byte statement",
                self.text.len()
            )));
        }
        self.check_boundary(position)?;
        self.bookmarks.insert(name, position);
        Ok(())
    }

    #[must_use]
    pub fn position(&self, name: Bookmark) -> Option<usize> {
        self.bookmarks.get(&name).copied()
    }

    pub fn require(&self, name: Bookmark) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| Error::invalid_state(format!("statement has no {name:?} bookmark")))
    }

    pub fn clear_bookmark(&mut self, name: Bookmark) {
        self.bookmarks.remove(&name);
    }

    pub fn truncate_to(&mut self, name: Bookmark) -> Result<()> {
        let position = self.require(name)?;
        self.truncate(position)
    }

    /// Cuts the text back to `len` bytes. Bookmarks past the new end are dropped.
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        if len >= self.text.len() {
            return Ok(());
        }
        self.check_boundary(len)?;
        self.text.truncate(len);
        self.bookmarks.retain(|_, position| *position <= len);
        Ok(())
    }

    pub fn copy_from(&mut self, other: &StatementBuffer) -> Result<()> {
        self.text.clear();
        self.reserve(other.text.len())?;
        self.text.push_str(&other.text);
        self.bookmarks.clone_from(&other.bookmarks);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.bookmarks.clear();
    }

    pub fn slice(&self, range: Range<usize>) -> Result<&str> {
        self.text.get(range.clone()).ok_or_else(|| {
            Error::invalid_state(format!(
                "range {range:?} does not fall on characters of a {}-byte statement",
                self.text.len()
            ))
        })
    }

    pub fn tail(&self, from: usize) -> Result<&str> {
        self.slice(from..self.text.len())
    }

    /// Inserts `text` at `position`; every bookmark at or after `position` moves with the text.
    pub fn insert_at(&mut self, position: usize, text: &str) -> Result<()> {
        self.splice(position..position, text).map(|_| ())
    }

    /// Replaces `range` with `text` and returns the length delta.
    ///
    /// Bookmarks at or after `range.end` shift by the delta, bookmarks strictly
    /// inside the range are dropped, bookmarks at or before `range.start` stay.
    pub fn splice(&mut self, range: Range<usize>, text: &str) -> Result<isize> {
        if range.start > range.end || range.end > self.text.len() {
            return Err(Error::invalid_state(format!(
                "splice range {range:?} is outside a {}-byte statement",
                self.text.len()
            )));
        }
        self.check_boundary(range.start)?;
        self.check_boundary(range.end)?;
        self.reserve(text.len())?;

        let removed = range.end - range.start;
        let delta = text.len() as isize - removed as isize;
        let (start, end) = (range.start, range.end);
        self.text.replace_range(range, text);

        self.bookmarks.retain(|_, position| {
            !(*position > start && *position < end) || start == end
        });
        for position in self.bookmarks.values_mut() {
            let shifts = if start == end {
                *position >= start
            } else {
                *position >= end
            };
            if shifts {
                *position = position.saturating_add_signed(delta);
            }
        }
        Ok(delta)
    }

    /// Overwrites bytes in place starting at `position`; the length must not change.
    pub fn overwrite_at(&mut self, position: usize, text: &str) -> Result<()> {
        let end = position + text.len();
        if end > self.text.len()
            || !self.text.is_char_boundary(position)
            || !self.text.is_char_boundary(end)
        {
            return Err(Error::invalid_state(format!(
                "cannot overwrite {} bytes at {position} in a {}-byte statement",
                text.len(),
                self.text.len()
            )));
        }
        self.text.replace_range(position..end, text);
        Ok(())
    }

    fn check_boundary(&self, position: usize) -> Result<()> {
        if self.text.is_char_boundary(position) {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "position {position} splits a character of the statement"
            )))
        }
    }
}

impl fmt::Display for StatementBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
