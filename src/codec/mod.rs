//! Field codec: flattening raw JSON documents into typed fields and
//! reassembling stored fields into a field mapping.

mod flatten;
mod reconstruct;

pub use flatten::{flatten, PATH_SEPARATOR};
pub use reconstruct::reconstruct;
