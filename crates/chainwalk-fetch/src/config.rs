use std::path::PathBuf;

use clap::Parser;

/// chainwalk-fetch: walk a JSON-scripted record chain
#[derive(Parser, Debug)]
#[command(name = "chainwalk-fetch")]
pub struct Config {
    /// Path to the JSON feed script
    #[arg(long, env = "CHAINWALK_FEED")]
    pub feed: PathBuf,

    /// Start key for a sequential walk
    #[arg(long, conflicts_with = "keys")]
    pub start: Option<String>,

    /// Stop a sequential walk after this many records
    #[arg(long, env = "CHAINWALK_LIMIT")]
    pub limit: Option<u32>,

    /// Comma-separated initial keys for a discovery walk
    #[arg(long)]
    pub keys: Option<String>,

    /// Field carrying the payload of a sequential chain record
    #[arg(long, default_value = "SEG_TEXT")]
    pub payload_field: String,

    /// Field carrying the continuation key of a sequential chain record
    #[arg(long, default_value = "NEXT_LR")]
    pub next_field: String,

    /// Optional flag field marking a payload as tabular
    #[arg(long)]
    pub format_field: Option<String>,

    /// Comma-separated payload slot range for a discovery walk
    #[arg(long, default_value = "ROW64_1,ROW64_2,ROW64_3")]
    pub fragment_slots: String,

    /// Comma-separated link slot range for a discovery walk
    #[arg(long, default_value = "LONGLINK1,LONGLINK2,LONGLINK3")]
    pub link_slots: String,

    /// Slot continuation marker for a discovery walk
    #[arg(long, default_value = "+")]
    pub marker: char,

    /// Hard bound on distinct keys a discovery walk may touch
    #[arg(long, env = "CHAINWALK_MAX_KEYS")]
    pub max_keys: Option<usize>,

    /// Give up if the walk has not finished after this many seconds
    #[arg(long, env = "CHAINWALK_TIMEOUT_SECS", default_value = "10")]
    pub timeout_secs: u64,
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            parse_list("LONGLINK1, LONGLINK2 ,LONGLINK3"),
            vec!["LONGLINK1", "LONGLINK2", "LONGLINK3"]
        );
    }

    #[test]
    fn test_parse_list_drops_empties() {
        assert_eq!(parse_list("A,,B, ,"), vec!["A", "B"]);
        assert!(parse_list("").is_empty());
    }
}
