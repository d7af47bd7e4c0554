/// Typed field access over one decoded response record.
///
/// The chain logic never parses wire bytes; everything it needs from a
/// record comes through this trait. A record is either data (fields
/// readable) or a final/closed status (`is_final_status`), in which case
/// its field content is ignored and only `status_text` is meaningful.
pub trait RecordFields: Send + Sync {
    /// Named string field, or `None` when the record does not carry it.
    fn get_string(&self, field: &str) -> Option<String>;

    /// Copy a fixed-width raw field into `buf`. Returns the number of bytes
    /// actually present; 0 means the field is absent or empty.
    fn get_bytes(&self, field: &str, buf: &mut [u8]) -> usize;

    /// True when the record is a terminal/closed status rather than data.
    fn is_final_status(&self) -> bool;

    /// Human-readable diagnostic accompanying a status record.
    fn status_text(&self) -> String;
}
