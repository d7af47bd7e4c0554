use std::collections::HashMap;

use crate::record::RecordFields;

/// Field-map backed record for scripted feeds.
///
/// Either a data record (string and raw fields readable) or a closed
/// status record carrying only diagnostic text.
#[derive(Debug, Clone, Default)]
pub struct MapRecord {
    strings: HashMap<String, String>,
    raw: HashMap<String, Vec<u8>>,
    status: Option<String>,
}

impl MapRecord {
    pub fn data() -> Self {
        Self::default()
    }

    pub fn closed(text: impl Into<String>) -> Self {
        Self {
            status: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_string(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.strings.insert(field.into(), value.into());
        self
    }

    pub fn with_bytes(mut self, field: impl Into<String>, value: &[u8]) -> Self {
        self.raw.insert(field.into(), value.to_vec());
        self
    }
}

impl RecordFields for MapRecord {
    fn get_string(&self, field: &str) -> Option<String> {
        self.strings.get(field).cloned()
    }

    fn get_bytes(&self, field: &str, buf: &mut [u8]) -> usize {
        match self.raw.get(field) {
            Some(value) => {
                let n = value.len().min(buf.len());
                buf[..n].copy_from_slice(&value[..n]);
                n
            }
            None => 0,
        }
    }

    fn is_final_status(&self) -> bool {
        self.status.is_some()
    }

    fn status_text(&self) -> String {
        self.status.clone().unwrap_or_default()
    }
}
