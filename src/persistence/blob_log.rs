use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Leading byte of every record, bumped if the record layout changes
const RECORD_VERSION: u8 = 1;
const HEADER_LEN: u64 = 9;

/// Pointer to a record inside the blob log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobPointer {
    pub offset: u64,
    pub len: u32,
    pub crc32: u32,
}

/// Append-only log holding archived field sets.
///
/// Record format:
/// - u8 record version
/// - u32 payload length (little endian)
/// - u32 crc32 of payload (little endian)
/// - raw payload bytes
///
/// Replaced archives stay in the log; only the catalog pointer moves.
pub struct BlobLog {
    path: PathBuf,
    file: Mutex<File>,
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

impl BlobLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Append a payload and return its pointer.
    pub fn append(&self, payload: &[u8]) -> Result<BlobPointer> {
        let len = u32::try_from(payload.len())
            .map_err(|_| IndexError::InvalidPayload("document too large to archive".to_string()))?;
        let crc32 = checksum(payload);

        let mut record = Vec::with_capacity(HEADER_LEN as usize + payload.len());
        record.push(RECORD_VERSION);
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(&crc32.to_le_bytes());
        record.extend_from_slice(payload);

        let mut file = self.file.lock();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(&record)?;
        file.flush()?;

        Ok(BlobPointer { offset, len, crc32 })
    }

    /// Read a payload given its pointer, validating header and checksum.
    pub fn read(&self, ptr: BlobPointer) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(ptr.offset))?;

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)?;
        if header[0] != RECORD_VERSION {
            return Err(IndexError::StorageUnavailable(format!(
                "unknown archive record version {} at offset {} of {}",
                header[0],
                ptr.offset,
                self.path.display()
            )));
        }
        let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        let stored_crc = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);

        if len != ptr.len {
            return Err(IndexError::StorageUnavailable(format!(
                "archive length mismatch: expected {}, found {}",
                ptr.len, len
            )));
        }

        let mut payload = vec![0u8; len as usize];
        file.read_exact(&mut payload)?;

        let crc = checksum(&payload);
        if crc != stored_crc || crc != ptr.crc32 {
            return Err(IndexError::StorageUnavailable(
                "archive checksum mismatch (corrupt record)".to_string(),
            ));
        }

        Ok(payload)
    }

    /// Flush written records to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    /// Current size of the log in bytes
    pub fn size(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }
}
