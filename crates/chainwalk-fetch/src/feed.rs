use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use chainwalk_chain::FieldDirectory;
use chainwalk_middleware::{ChainKey, MapRecord, MemoryFeed};

/// JSON description of a scripted feed: the field directory plus the
/// response(s) each key resolves to, in delivery order.
#[derive(Debug, Deserialize)]
pub struct FeedScript {
    pub fields: Vec<String>,
    pub records: HashMap<String, Vec<RecordScript>>,
}

#[derive(Debug, Deserialize)]
pub struct RecordScript {
    #[serde(default)]
    pub fields: HashMap<String, String>,
    /// Status text; when present the record is a closed/final status.
    #[serde(default)]
    pub closed: Option<String>,
}

impl RecordScript {
    fn to_record(&self) -> MapRecord {
        match &self.closed {
            Some(text) => MapRecord::closed(text.clone()),
            None => self
                .fields
                .iter()
                .fold(MapRecord::data(), |rec, (field, value)| {
                    rec.with_string(field.clone(), value.clone())
                }),
        }
    }
}

impl FeedScript {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("opening feed script {}", path.display()))?;
        let script = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing feed script {}", path.display()))?;
        Ok(script)
    }

    pub fn directory(&self) -> FieldDirectory {
        FieldDirectory::from_fields(self.fields.iter().cloned())
    }

    pub fn build_feed(&self) -> anyhow::Result<Arc<MemoryFeed>> {
        let feed = Arc::new(MemoryFeed::new());
        for (raw, responses) in &self.records {
            let key = ChainKey::parse(raw)
                .with_context(|| format!("invalid record key {raw:?} in feed script"))?;
            for response in responses {
                feed.script(&key, response.to_record());
            }
        }
        Ok(feed)
    }
}
