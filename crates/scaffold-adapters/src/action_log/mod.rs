//! Action log storage adapters.

mod jsonl;
mod memory;

pub use jsonl::{JsonLinesActionLog, LOG_DIR, LOG_FILE};
pub use memory::MemoryActionLog;
