use std::collections::HashSet;

use bytes::Bytes;
use chainwalk_middleware::{ChainKey, RecordFields};

use crate::error::ChainError;

/// Resolved set of field names known to the feed's schema.
///
/// Built once by the host (typically from a downloaded data dictionary) and
/// reused across fetchers. Fetcher construction resolves its schema against
/// this directory before the first fetch; a miss is a configuration error,
/// never a mid-chain surprise.
#[derive(Debug, Clone, Default)]
pub struct FieldDirectory {
    fields: HashSet<String>,
}

impl FieldDirectory {
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains(name)
    }
}

/// Where the mandatory payload of a sequential chain record lives.
#[derive(Debug, Clone)]
pub enum PayloadField {
    /// Text payload in a string field.
    Text { field: String },
    /// Raw payload in a fixed-width byte field.
    Raw { field: String, width: usize },
}

impl PayloadField {
    fn field(&self) -> &str {
        match self {
            PayloadField::Text { field } => field,
            PayloadField::Raw { field, .. } => field,
        }
    }
}

/// Field mapping for the sequential chain variant.
#[derive(Debug, Clone)]
pub struct ChainSchema {
    pub payload: PayloadField,
    /// Field carrying the key of the next record, empty on the last one.
    pub next_field: String,
    /// Optional flag field marking the payload as tabular.
    pub format_field: Option<String>,
}

impl ChainSchema {
    pub fn resolve(self, directory: &FieldDirectory) -> Result<ResolvedChainSchema, ChainError> {
        require(directory, self.payload.field())?;
        require(directory, &self.next_field)?;
        if let Some(field) = &self.format_field {
            require(directory, field)?;
        }
        Ok(ResolvedChainSchema { schema: self })
    }
}

/// A [`ChainSchema`] whose fields are all present in the directory.
#[derive(Debug, Clone)]
pub struct ResolvedChainSchema {
    schema: ChainSchema,
}

impl ResolvedChainSchema {
    pub(crate) fn payload_field(&self) -> &str {
        self.schema.payload.field()
    }

    pub(crate) fn read_payload(&self, record: &dyn RecordFields) -> Option<Bytes> {
        match &self.schema.payload {
            PayloadField::Text { field } => record.get_string(field).map(Bytes::from),
            PayloadField::Raw { field, width } => {
                let mut buf = vec![0u8; *width];
                let n = record.get_bytes(field, &mut buf);
                if n == 0 {
                    None
                } else {
                    buf.truncate(n);
                    Some(Bytes::from(buf))
                }
            }
        }
    }

    pub(crate) fn read_continuation(&self, record: &dyn RecordFields) -> Option<ChainKey> {
        record
            .get_string(&self.schema.next_field)
            .and_then(|raw| ChainKey::parse(&raw))
    }

    pub(crate) fn read_tabular(&self, record: &dyn RecordFields) -> bool {
        let Some(field) = &self.schema.format_field else {
            return false;
        };
        match record.get_string(field) {
            Some(value) => matches!(value.trim(), "1" | "Y" | "true"),
            None => false,
        }
    }
}

/// Field mapping for the discovery chain variant.
///
/// Both slot ranges are fixed schema properties: payload rows and link
/// references live in bounded, ordered runs of sibling fields (e.g.
/// `ROW64_1`..`ROW64_14`, `LONGLINK1`..`LONGLINK14`). A slot value ending
/// with `continuation_marker` continues into the next slot.
#[derive(Debug, Clone)]
pub struct DiscoverySchema {
    pub fragment_slots: Vec<String>,
    pub link_slots: Vec<String>,
    pub continuation_marker: char,
    /// Optional hard bound on total distinct keys; `None` relies on key
    /// de-duplication alone for cycle safety.
    pub max_keys: Option<usize>,
}

impl DiscoverySchema {
    pub fn resolve(
        self,
        directory: &FieldDirectory,
    ) -> Result<ResolvedDiscoverySchema, ChainError> {
        for slot in self.fragment_slots.iter().chain(self.link_slots.iter()) {
            require(directory, slot)?;
        }
        Ok(ResolvedDiscoverySchema { schema: self })
    }
}

/// A [`DiscoverySchema`] whose slots are all present in the directory.
#[derive(Debug, Clone)]
pub struct ResolvedDiscoverySchema {
    schema: DiscoverySchema,
}

impl ResolvedDiscoverySchema {
    pub(crate) fn max_keys(&self) -> Option<usize> {
        self.schema.max_keys
    }

    pub(crate) fn read_fragments(&self, record: &dyn RecordFields) -> Vec<String> {
        read_spanned(
            record,
            &self.schema.fragment_slots,
            self.schema.continuation_marker,
        )
    }

    pub(crate) fn read_links(&self, record: &dyn RecordFields) -> Vec<String> {
        read_spanned(
            record,
            &self.schema.link_slots,
            self.schema.continuation_marker,
        )
    }
}

fn require(directory: &FieldDirectory, name: &str) -> Result<(), ChainError> {
    if directory.contains(name) {
        Ok(())
    } else {
        Err(ChainError::UnresolvedField(name.to_string()))
    }
}

/// Read the logical values spread across an ordered slot range.
///
/// Slot values are trimmed. A value ending with `marker` is stripped of the
/// marker and continued in the following slot(s); any other non-empty value
/// completes one logical value. An empty slot terminates an open
/// accumulation and is otherwise skipped. An accumulation still open at the
/// end of the range is emitted as-is.
fn read_spanned(record: &dyn RecordFields, slots: &[String], marker: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut acc = String::new();
    for slot in slots {
        let value = record.get_string(slot).unwrap_or_default();
        let value = value.trim();
        if value.is_empty() {
            if !acc.is_empty() {
                out.push(std::mem::take(&mut acc));
            }
            continue;
        }
        match value.strip_suffix(marker) {
            Some(head) => acc.push_str(head),
            None => {
                acc.push_str(value);
                out.push(std::mem::take(&mut acc));
            }
        }
    }
    if !acc.is_empty() {
        out.push(acc);
    }
    out
}
