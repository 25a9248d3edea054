use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique document identifier, caller-assigned or generated
pub type DocumentId = String;

/// RFC3339 in UTC with the fraction trimmed of trailing zeros (`.1Z`, not `.100Z`)
pub fn rfc3339_nano(dt: &DateTime<Utc>) -> String {
    let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    // Leap-second instants carry nanos >= 1e9; only the sub-second part is rendered
    let nanos = dt.nanosecond() % 1_000_000_000;
    if nanos > 0 {
        let digits = format!("{:09}", nanos);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out.push('Z');
    out
}

/// Kind of an indexed field, fixed at indexing time
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Number,
    DateTime,
}

/// Typed value of a flattened field
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Number(_) => FieldKind::Number,
            FieldValue::DateTime(_) => FieldKind::DateTime,
        }
    }
}

/// A named, typed value produced by flattening a document
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, FieldValue::Text(text.into()))
    }

    pub fn kind(&self) -> FieldKind {
        self.value.kind()
    }

    /// Encode for the stored field archive.
    ///
    /// Numbers keep their JSON literal, date-times become nanoseconds since
    /// the Unix epoch.
    pub fn to_stored(&self) -> StoredField {
        let encoded = match &self.value {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::DateTime(dt) => dt.timestamp_nanos_opt().unwrap_or_default().to_string(),
        };
        StoredField {
            name: self.name.clone(),
            kind: self.kind(),
            encoded,
        }
    }

    /// Term under which a non-text field is posted
    pub fn literal_term(&self) -> String {
        match &self.value {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::DateTime(dt) => rfc3339_nano(dt),
        }
    }
}

/// Archived copy of one field occurrence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredField {
    pub name: String,
    pub kind: FieldKind,
    pub encoded: String,
}

impl StoredField {
    /// Decode back into a typed field; `None` when the encoding is malformed
    pub fn decode(&self) -> Option<Field> {
        let value = match self.kind {
            FieldKind::Text => FieldValue::Text(self.encoded.clone()),
            FieldKind::Number => {
                FieldValue::Number(serde_json::from_str::<serde_json::Number>(&self.encoded).ok()?)
            }
            FieldKind::DateTime => {
                let nanos: i64 = self.encoded.parse().ok()?;
                FieldValue::DateTime(DateTime::from_timestamp_nanos(nanos))
            }
        };
        Some(Field::new(self.name.clone(), value))
    }
}

/// Per-document statistics recorded in a posting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub term_frequency: u32,
    /// Token count of the field in this document, for length normalization
    pub field_length: u32,
}

/// Documents containing a term within one (field, kind) instance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostingList {
    pub field: String,
    pub kind: FieldKind,
    pub postings: BTreeMap<DocumentId, Posting>,
}

impl PostingList {
    pub fn new(field: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            field: field.into(),
            kind,
            postings: BTreeMap::new(),
        }
    }

    /// Add a document to this posting list with its term frequency
    pub fn add_document(&mut self, doc_id: &str, posting: Posting) {
        self.postings.insert(doc_id.to_string(), posting);
    }

    /// Remove a document from this posting list
    pub fn remove_document(&mut self, doc_id: &str) {
        self.postings.remove(doc_id);
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Number of documents containing this term in this field
    pub fn document_frequency(&self) -> usize {
        self.postings.len()
    }
}

/// Everything posted under one term, across fields
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TermPostings {
    pub term: String,
    pub lists: Vec<PostingList>,
}

impl TermPostings {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            lists: Vec::new(),
        }
    }

    pub fn list_mut(&mut self, field: &str, kind: FieldKind) -> &mut PostingList {
        let pos = match self
            .lists
            .iter()
            .position(|l| l.field == field && l.kind == kind)
        {
            Some(pos) => pos,
            None => {
                self.lists.push(PostingList::new(field, kind));
                self.lists.len() - 1
            }
        };
        &mut self.lists[pos]
    }

    pub fn remove_document(&mut self, field: &str, kind: FieldKind, doc_id: &str) {
        for list in self
            .lists
            .iter_mut()
            .filter(|l| l.field == field && l.kind == kind)
        {
            list.remove_document(doc_id);
        }
        self.lists.retain(|l| !l.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|l| l.is_empty())
    }

    pub fn text_lists(&self) -> impl Iterator<Item = &PostingList> {
        self.lists.iter().filter(|l| l.kind == FieldKind::Text)
    }
}

/// Reconstructed document as returned to clients
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub fields: serde_json::Map<String, serde_json::Value>,
}
