pub mod document;
pub mod search;

pub use document::{
    rfc3339_nano, DocumentId, DocumentView, Field, FieldKind, FieldValue, Posting, PostingList,
    StoredField, TermPostings,
};
pub use search::{ScoredDocument, SearchHit, SearchRequest, SearchResults};
