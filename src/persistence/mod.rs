//! Persistence primitives: append-only blob log, fjall-backed archive
//! catalog and the single-writer lock.

mod blob_log;
mod doc_store;
mod lock;

pub use blob_log::{BlobLog, BlobPointer};
pub use doc_store::DocStore;
pub use lock::WriterLock;
