use std::path::Path;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};

use crate::error::{IndexError, Result};
use crate::models::StoredField;
use crate::persistence::{BlobLog, BlobPointer};

/// Stored field archive: fjall catalog of pointers into an append-only blob log.
///
/// Re-indexing an id appends a new record and moves the pointer; the old
/// record stays in the log as dead space. The log is never compacted.
pub struct DocStore {
    archive: Keyspace,
    internal: Keyspace,
    blob_log: BlobLog,
}

const ARCHIVE_KS: &str = "archive";
const INTERNAL_KS: &str = "internal";

impl DocStore {
    pub fn open(db: &Database, blob_path: impl AsRef<Path>) -> Result<Self> {
        let archive = db
            .keyspace(ARCHIVE_KS, KeyspaceCreateOptions::default)
            .map_err(|e| IndexError::storage(format!("failed to open archive keyspace: {}", e)))?;
        let internal = db
            .keyspace(INTERNAL_KS, KeyspaceCreateOptions::default)
            .map_err(|e| IndexError::storage(format!("failed to open internal keyspace: {}", e)))?;
        let blob_log = BlobLog::open(blob_path)?;

        Ok(Self {
            archive,
            internal,
            blob_log,
        })
    }

    /// Persist an archive: append to the blob log, then swing the catalog pointer.
    pub fn put_archive(&self, doc_id: &str, fields: &[StoredField]) -> Result<BlobPointer> {
        let payload = bincode::serialize(fields)?;
        let ptr = self.blob_log.append(&payload)?;
        let val = bincode::serialize(&ptr)?;
        self.archive
            .insert(doc_id.as_bytes(), val)
            .map_err(IndexError::storage)?;
        Ok(ptr)
    }

    pub fn pointer(&self, doc_id: &str) -> Result<Option<BlobPointer>> {
        let Some(val) = self
            .archive
            .get(doc_id.as_bytes())
            .map_err(IndexError::storage)?
        else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&val)?))
    }

    pub fn get_archive(&self, doc_id: &str) -> Result<Option<Vec<StoredField>>> {
        let Some(ptr) = self.pointer(doc_id)? else {
            return Ok(None);
        };
        let payload = self.blob_log.read(ptr)?;
        Ok(Some(bincode::deserialize(&payload)?))
    }

    /// Ids of every archived document, in key order.
    pub fn list_doc_ids(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for kv in self.archive.iter() {
            let key = kv.key().map_err(IndexError::storage)?;
            match std::str::from_utf8(key.as_ref()) {
                Ok(id) => out.push(id.to_string()),
                Err(_) => continue,
            }
        }
        Ok(out)
    }

    /// Write a value into the internal scratch area.
    pub fn set_internal(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.internal
            .insert(key, value)
            .map_err(IndexError::storage)?;
        Ok(())
    }

    pub fn get_internal(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .internal
            .get(key)
            .map_err(IndexError::storage)?
            .map(|v| v.as_ref().to_vec()))
    }

    pub fn sync(&self) -> Result<()> {
        self.blob_log.sync()
    }

    pub fn blob_log(&self) -> &BlobLog {
        &self.blob_log
    }
}
