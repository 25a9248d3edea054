//! Document retrieval by id

use tokio_util::sync::CancellationToken;

use crate::codec::reconstruct;
use crate::config::ReconstructPolicy;
use crate::error::Result;
use crate::index::IndexReader;
use crate::models::DocumentView;

/// Fetch the archive of `doc_id` and reassemble its field mapping.
pub fn get_document(
    reader: &IndexReader<'_>,
    doc_id: &str,
    policy: ReconstructPolicy,
    cancel: &CancellationToken,
) -> Result<DocumentView> {
    let stored = reader.fetch(doc_id, cancel)?;
    Ok(DocumentView {
        id: doc_id.to_string(),
        fields: reconstruct(&stored, policy)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexSettings;
    use crate::error::IndexError;
    use crate::index::IndexStore;
    use crate::models::Field;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_get_document_groups_repeated_fields() {
        let tmp = TempDir::new().unwrap();
        let store = IndexStore::open(IndexSettings::new(tmp.path().join("idx"))).unwrap();
        let cancel = CancellationToken::new();
        let fields = vec![
            Field::text("tags", "x"),
            Field::text("title", "t"),
            Field::text("tags", "y"),
        ];
        store.add("d2", &fields, &cancel).unwrap();

        let reader = store.reader();
        let doc = get_document(&reader, "d2", ReconstructPolicy::DropInvalid, &cancel).unwrap();
        assert_eq!(doc.id, "d2");
        assert_eq!(
            serde_json::Value::Object(doc.fields),
            json!({"tags": ["x", "y"], "title": "t"})
        );
    }

    #[test]
    fn test_get_document_missing() {
        let tmp = TempDir::new().unwrap();
        let store = IndexStore::open(IndexSettings::new(tmp.path().join("idx"))).unwrap();
        let reader = store.reader();
        let err = get_document(
            &reader,
            "nope",
            ReconstructPolicy::DropInvalid,
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::NotFound(id) if id == "nope"));
    }
}
