use tablelink_core::{Error, HostRow, Result, SpillTable, StatementBuffer};

use crate::{
    date::{NATIVE_DATE_LEN, decode_native_date},
    errors::map_native,
    oci::{ColumnDescriptor, DefineType, Fetched, Handle, NativeClient, NativeType},
    quote::append_escaped,
};

const MIN_TEXT_CAPACITY: usize = 64;
const LOB_READ_CHUNK: usize = 8192;

#[derive(Debug, Clone)]
struct ColumnSlot {
    define: DefineType,
    native_type: NativeType,
    buffer: Vec<u8>,
    len: usize,
    null: bool,
}

impl ColumnSlot {
    fn value(&self) -> Option<&[u8]> {
        (!self.null).then(|| &self.buffer[..self.len])
    }

    /// Grows the backing buffer to at least `len` bytes; it never shrinks.
    fn ensure_len(&mut self, len: usize) -> Result<()> {
        if self.buffer.len() < len {
            let additional = len - self.buffer.len();
            self.buffer
                .try_reserve(additional)
                .map_err(|_| Error::OutOfMemory { requested: len })?;
            self.buffer.resize(len, 0);
        }
        Ok(())
    }
}

/// One fetched row: a NULL flag and an owned value buffer per column.
#[derive(Debug)]
pub struct Row {
    slots: Vec<ColumnSlot>,
    cloned: bool,
}

impl Row {
    /// Binds every result column of `statement` and returns the empty row.
    pub(crate) fn define(client: &dyn NativeClient, statement: Handle) -> Result<Self> {
        let count = client.column_count(statement).map_err(map_native)?;
        let mut slots = Vec::with_capacity(count);
        for position in 0..count {
            let descriptor = client
                .describe_column(statement, position)
                .map_err(map_native)?;
            let define = define_type_for(&descriptor);
            client
                .define_by_pos(statement, position, define)
                .map_err(map_native)?;

            let initial = match define {
                DefineType::Text { capacity } => capacity,
                DefineType::Date => NATIVE_DATE_LEN,
                DefineType::Lob => 0,
            };
            slots.push(ColumnSlot {
                define,
                native_type: descriptor.native_type,
                buffer: vec![0; initial],
                len: 0,
                null: true,
            });
        }
        Ok(Self {
            slots,
            cloned: false,
        })
    }

    /// Copies the native cursor's current row into the slots.
    pub(crate) fn fill(
        &mut self,
        client: &dyn NativeClient,
        service: Handle,
        statement: Handle,
    ) -> Result<()> {
        for (position, slot) in self.slots.iter_mut().enumerate() {
            match slot.define {
                DefineType::Text { .. } => {
                    let mut fetched = client
                        .read_defined(statement, position, &mut slot.buffer)
                        .map_err(map_native)?;
                    if let Fetched::Value { len } = fetched
                        && len > slot.buffer.len()
                    {
                        slot.ensure_len(len)?;
                        fetched = client
                            .read_defined(statement, position, &mut slot.buffer)
                            .map_err(map_native)?;
                    }
                    store_fetched(slot, fetched)?;
                }
                DefineType::Date => {
                    let mut raw = [0u8; NATIVE_DATE_LEN];
                    match client
                        .read_defined(statement, position, &mut raw)
                        .map_err(map_native)?
                    {
                        Fetched::Null => slot.null = true,
                        Fetched::Value { .. } => {
                            let text = decode_native_date(&raw);
                            slot.ensure_len(text.len())?;
                            slot.buffer[..text.len()].copy_from_slice(text.as_bytes());
                            slot.len = text.len();
                            slot.null = false;
                        }
                        Fetched::Lob(_) => {
                            return Err(Error::marshal("date column returned a locator"));
                        }
                    }
                }
                DefineType::Lob => {
                    let fetched = client
                        .read_defined(statement, position, &mut [])
                        .map_err(map_native)?;
                    match fetched {
                        Fetched::Null => slot.null = true,
                        Fetched::Lob(locator) => {
                            let result = read_lob(client, service, locator, slot);
                            client.handle_free(locator);
                            result?;
                        }
                        Fetched::Value { .. } => {
                            return Err(Error::marshal("large object column returned inline data"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True for rows copied out of a cursor.
    #[must_use]
    pub fn is_cloned(&self) -> bool {
        self.cloned
    }

    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.slots.get(index).is_none_or(|slot| slot.null)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.slots.get(index).and_then(ColumnSlot::value)
    }

    #[must_use]
    pub fn native_type(&self, index: usize) -> Option<NativeType> {
        self.slots.get(index).map(|slot| slot.native_type)
    }

    pub fn fields(&self) -> impl Iterator<Item = Option<&[u8]>> {
        self.slots.iter().map(ColumnSlot::value)
    }

    pub fn val_str(&self, index: usize) -> Result<Option<&str>> {
        self.get(index)
            .map(|bytes| {
                std::str::from_utf8(bytes)
                    .map_err(|_| Error::marshal(format!("column {index} is not valid UTF-8")))
            })
            .transpose()
    }

    pub fn val_int(&self, index: usize) -> Result<Option<i64>> {
        self.val_str(index)?
            .map(|text| {
                let trimmed = text.trim();
                trimmed.parse::<i64>().or_else(|_| {
                    trimmed
                        .parse::<f64>()
                        .map(|value| value.trunc() as i64)
                        .map_err(|_| Error::marshal(format!("`{text}` is not an integer")))
                })
            })
            .transpose()
    }

    pub fn val_real(&self, index: usize) -> Result<Option<f64>> {
        self.val_str(index)?
            .map(|text| {
                text.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::marshal(format!("`{text}` is not a number")))
            })
            .transpose()
    }

    #[must_use]
    pub fn to_host_row(&self) -> HostRow {
        HostRow::new(
            self.fields()
                .map(|field| field.map(<[u8]>::to_vec))
                .collect(),
        )
    }

    /// Appends column `index` as an escaped string literal, or `NULL`.
    pub fn append_escaped_to(&self, buf: &mut StatementBuffer, index: usize) -> Result<()> {
        match self.val_str(index)? {
            Some(text) => {
                buf.append_char('\'')?;
                append_escaped(buf, text)?;
                buf.append_char('\'')
            }
            None => buf.append("NULL"),
        }
    }

    pub fn store_to_spill(&self, spill: &mut SpillTable) -> Result<u64> {
        spill.insert_row(&self.to_host_row())
    }
}

impl Clone for Row {
    /// The copy owns exactly the bytes in use and survives later fetches.
    fn clone(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|slot| ColumnSlot {
                    define: slot.define,
                    native_type: slot.native_type,
                    buffer: slot.buffer[..slot.len].to_vec(),
                    len: slot.len,
                    null: slot.null,
                })
                .collect(),
            cloned: true,
        }
    }
}

fn define_type_for(descriptor: &ColumnDescriptor) -> DefineType {
    match descriptor.native_type {
        NativeType::Clob | NativeType::Blob | NativeType::Long => DefineType::Lob,
        NativeType::Date => DefineType::Date,
        NativeType::Number | NativeType::BinaryDouble => DefineType::Text {
            capacity: descriptor.size.max(MIN_TEXT_CAPACITY),
        },
        NativeType::Timestamp => DefineType::Text {
            capacity: descriptor.size.max(32),
        },
        NativeType::RowId => DefineType::Text { capacity: 18 },
        NativeType::Varchar | NativeType::Char | NativeType::Raw => DefineType::Text {
            capacity: descriptor.size.max(1),
        },
    }
}

fn store_fetched(slot: &mut ColumnSlot, fetched: Fetched) -> Result<()> {
    match fetched {
        Fetched::Null => {
            slot.null = true;
            slot.len = 0;
        }
        Fetched::Value { len } => {
            if len > slot.buffer.len() {
                return Err(Error::marshal(format!(
                    "value of {len} bytes still truncated after growing to {}",
                    slot.buffer.len()
                )));
            }
            slot.len = len;
            slot.null = false;
        }
        Fetched::Lob(_) => return Err(Error::marshal("text column returned a locator")),
    }
    Ok(())
}

fn read_lob(
    client: &dyn NativeClient,
    service: Handle,
    locator: Handle,
    slot: &mut ColumnSlot,
) -> Result<()> {
    let length = client.lob_length(service, locator).map_err(map_native)?;
    let length = usize::try_from(length)
        .map_err(|_| Error::marshal(format!("large object of {length} bytes")))?;
    slot.ensure_len(length)?;

    let mut read = 0usize;
    while read < length {
        let end = (read + LOB_READ_CHUNK).min(length);
        let chunk = client
            .lob_read(service, locator, read as u64, &mut slot.buffer[read..end])
            .map_err(map_native)?;
        if chunk == 0 {
            return Err(Error::marshal(format!(
                "large object ended after {read} of {length} bytes"
            )));
        }
        read += chunk;
    }
    slot.len = length;
    slot.null = false;
    Ok(())
}
