use crate::{Error, Result};

/// One host field: `None` is SQL NULL, otherwise textual (or raw blob) bytes.
pub type FieldValue = Option<Vec<u8>>;

const NULL_LENGTH: u32 = u32::MAX;

/// A row in the host's format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostRow {
    fields: Vec<FieldValue>,
}

impl HostRow {
    #[must_use]
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Self { fields }
    }

    pub fn from_texts<'a>(fields: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|field| field.map(|text| text.as_bytes().to_vec()))
                .collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).and_then(|field| field.as_deref())
    }

    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.fields.get(index).is_none_or(Option::is_none)
    }

    #[must_use]
    pub fn text(&self, index: usize) -> Option<&str> {
        self.get(index)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    pub fn push(&mut self, field: FieldValue) {
        self.fields.push(field);
    }

    /// Encodes the row as a per-field length vector plus the concatenated payload.
    #[must_use]
    pub fn encode(&self) -> (Vec<u8>, Vec<u8>) {
        let mut lengths = Vec::with_capacity(self.fields.len() * 4);
        let payload_len = self.fields.iter().flatten().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(payload_len);
        for field in &self.fields {
            match field {
                Some(bytes) => {
                    lengths.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                    payload.extend_from_slice(bytes);
                }
                None => lengths.extend_from_slice(&NULL_LENGTH.to_le_bytes()),
            }
        }
        (lengths, payload)
    }

    pub fn decode(lengths: &[u8], payload: &[u8]) -> Result<Self> {
        if lengths.len() % 4 != 0 {
            return Err(Error::marshal(format!(
                "length vector of {} bytes is not a multiple of 4",
                lengths.len()
            )));
        }

        let mut fields = Vec::with_capacity(lengths.len() / 4);
        let mut offset = 0usize;
        for chunk in lengths.chunks_exact(4) {
            let length = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if length == NULL_LENGTH {
                fields.push(None);
                continue;
            }
            let end = offset + length as usize;
            let bytes = payload.get(offset..end).ok_or_else(|| {
                Error::marshal(format!(
                    "payload of {} bytes is too short for field ending at {end}",
                    payload.len()
                ))
            })?;
            fields.push(Some(bytes.to_vec()));
            offset = end;
        }

        if offset != payload.len() {
            return Err(Error::marshal(format!(
                "{} trailing payload bytes after the last field",
                payload.len() - offset
            )));
        }
        Ok(Self { fields })
    }
}
