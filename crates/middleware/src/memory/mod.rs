mod record;
mod transport;

pub use record::MapRecord;
pub use transport::MemoryFeed;
