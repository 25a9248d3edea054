use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{IndexSettings, TokenizerConfig};
use crate::error::{IndexError, Result};
use crate::index::analysis::AnalyzedDocument;
use crate::index::scoring::{bm25_score, rank};
use crate::models::{DocumentId, Field, Posting, ScoredDocument, StoredField, TermPostings};
use crate::persistence::{DocStore, WriterLock};
use crate::tokenizer::Tokenizer;

const POSTINGS_KS: &str = "postings";
const STATS_KS: &str = "stats";
const DOC_COUNT_KEY: &[u8] = b"doc_count";
const PENDING_COMMIT_KEY: &[u8] = b"pending_commit";
const ANALYSIS_KEY: &[u8] = b"analysis";
const FIELD_STATS_PREFIX: &str = "field/";
const TERM_KEY_PREFIX: u8 = b't';

/// Length statistics of one text field across the index
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub total_length: u64,
    pub documents: u64,
}

impl FieldStats {
    pub fn average_length(&self) -> f32 {
        if self.documents == 0 {
            0.0
        } else {
            self.total_length as f32 / self.documents as f32
        }
    }
}

/// Point-in-time counters for the whole index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: u64,
    pub archive_bytes: u64,
}

fn term_key(term: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(term.len() + 1);
    key.push(TERM_KEY_PREFIX);
    key.extend_from_slice(term.as_bytes());
    key
}

fn field_stats_key(field: &str) -> Vec<u8> {
    format!("{}{}", FIELD_STATS_PREFIX, field).into_bytes()
}

/// Write steps that tests can make fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FailPoint {
    /// After the archive is swapped, before postings are touched
    AfterArchive,
    /// Writes to the internal scratch area
    InternalWrite,
}

fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(IndexError::Cancelled)
    } else {
        Ok(())
    }
}

/// Durable inverted index plus stored field archive.
///
/// One `IndexStore` is the single writer of its location. Reads go through
/// [`IndexReader`] guards and writes through the commit lock, so a reader
/// sees each document either fully before or fully after an `add`.
pub struct IndexStore {
    settings: IndexSettings,
    docs: DocStore,
    postings: Keyspace,
    stats: Keyspace,
    tokenizer: Tokenizer,
    commit: RwLock<()>,
    /// Set when a failed commit could not be repaired; all operations refuse
    poisoned: AtomicBool,
    #[cfg(test)]
    armed: parking_lot::Mutex<Vec<FailPoint>>,
    _db: Database,
    // Declared last so the location stays locked until everything above is dropped
    _lock: WriterLock,
}

impl IndexStore {
    /// Open (or create) the index at `settings.storage.location`.
    pub fn open(settings: IndexSettings) -> Result<Self> {
        let storage = &settings.storage;
        std::fs::create_dir_all(&storage.location).map_err(|e| {
            IndexError::storage(format!(
                "cannot create index location {}: {}",
                storage.location.display(),
                e
            ))
        })?;

        let lock = WriterLock::acquire(
            storage.lock_path(),
            storage.open_retries,
            Duration::from_millis(storage.open_retry_backoff_ms),
        )?;

        let db = Database::builder(storage.catalog_dir())
            .open()
            .map_err(|e| IndexError::storage(format!("failed to open catalog: {}", e)))?;
        let postings = db
            .keyspace(POSTINGS_KS, KeyspaceCreateOptions::default)
            .map_err(|e| IndexError::storage(format!("failed to open postings keyspace: {}", e)))?;
        let stats = db
            .keyspace(STATS_KS, KeyspaceCreateOptions::default)
            .map_err(|e| IndexError::storage(format!("failed to open stats keyspace: {}", e)))?;
        let docs = DocStore::open(&db, storage.blob_path())?;

        let tokenizer = Tokenizer::new(&settings.tokenizer_config);
        let store = Self {
            settings,
            docs,
            postings,
            stats,
            tokenizer,
            commit: RwLock::new(()),
            poisoned: AtomicBool::new(false),
            #[cfg(test)]
            armed: parking_lot::Mutex::new(Vec::new()),
            _db: db,
            _lock: lock,
        };

        // Postings are only valid for the analysis chain that produced them
        let pending = store.pending_commit()?;
        let recorded = store.recorded_analysis()?;
        if let Some(doc_id) = &pending {
            warn!(doc_id = %doc_id, "previous add did not finish, rebuilding postings");
        } else if let Some(previous) = &recorded {
            if previous != &store.settings.tokenizer_config {
                warn!(
                    previous = ?previous,
                    current = ?store.settings.tokenizer_config,
                    "analysis settings changed, rebuilding postings"
                );
            }
        }
        if pending.is_some() || recorded.as_ref() != Some(&store.settings.tokenizer_config) {
            store.rebuild_from_archive()?;
        }

        info!(
            location = %store.settings.storage.location.display(),
            documents = store.read_doc_count()?,
            "index opened"
        );
        Ok(store)
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Index `fields` under `doc_id`, replacing any previous version.
    ///
    /// Analysis happens before the commit lock is taken; the retire-old /
    /// write-new sequence runs under it.
    pub fn add(&self, doc_id: &str, fields: &[Field], cancel: &CancellationToken) -> Result<()> {
        if doc_id.is_empty() {
            return Err(IndexError::InvalidPayload("document id must not be empty".to_string()));
        }
        check(cancel)?;
        self.ensure_usable()?;
        let analyzed = AnalyzedDocument::analyze(&self.tokenizer, fields);
        let stored: Vec<StoredField> = fields.iter().map(Field::to_stored).collect();
        check(cancel)?;

        let _guard = self.commit.write();
        // Last point at which the add can be abandoned without side effects
        check(cancel)?;
        self.ensure_usable()?;

        let previous = self.docs.get_archive(doc_id)?.map(|archive| {
            let decoded: Vec<Field> = archive.iter().filter_map(StoredField::decode).collect();
            AnalyzedDocument::analyze(&self.tokenizer, &decoded)
        });

        self.stats
            .insert(PENDING_COMMIT_KEY, doc_id.as_bytes())
            .map_err(IndexError::storage)?;

        if let Err(e) = self.commit_locked(doc_id, &stored, previous.as_ref(), &analyzed) {
            warn!(doc_id, error = %e, "add failed mid-commit, rebuilding postings from archive");
            if let Err(repair) = self.rebuild_locked() {
                error!(error = %repair, "rebuild after failed commit failed, refusing further operations");
                self.poisoned.store(true, Ordering::SeqCst);
            }
            return Err(e);
        }

        debug!(
            doc_id,
            fields = fields.len(),
            replaced = previous.is_some(),
            "document committed"
        );
        Ok(())
    }

    /// Write the archive, swap postings and statistics, then clear the marker.
    /// Caller holds the commit lock in write mode.
    fn commit_locked(
        &self,
        doc_id: &str,
        stored: &[StoredField],
        previous: Option<&AnalyzedDocument>,
        analyzed: &AnalyzedDocument,
    ) -> Result<()> {
        self.docs.put_archive(doc_id, stored)?;
        self.injected_failure(FailPoint::AfterArchive)?;
        self.apply_postings(doc_id, previous, analyzed)?;

        if let Some(old) = previous {
            for (field, length) in old.text_lengths() {
                self.update_field_stats(field, -(length as i64), -1)?;
            }
        } else {
            let count = self.read_doc_count()?;
            self.write_doc_count(count + 1)?;
        }
        for (field, length) in analyzed.text_lengths() {
            self.update_field_stats(field, length as i64, 1)?;
        }

        self.stats
            .remove(PENDING_COMMIT_KEY)
            .map_err(IndexError::storage)?;
        Ok(())
    }

    /// Make the next write reaching `point` fail with `StorageUnavailable`
    #[cfg(test)]
    pub(crate) fn fail_next(&self, point: FailPoint) {
        self.armed.lock().push(point);
    }

    #[cfg(test)]
    fn injected_failure(&self, point: FailPoint) -> Result<()> {
        let mut armed = self.armed.lock();
        if let Some(pos) = armed.iter().position(|p| *p == point) {
            armed.remove(pos);
            return Err(IndexError::storage(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn injected_failure(&self, _point: FailPoint) -> Result<()> {
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            Err(IndexError::StorageUnavailable(
                "index is inconsistent after a failed commit; reopen to rebuild".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Retire the old version's postings and write the new ones
    fn apply_postings(
        &self,
        doc_id: &str,
        previous: Option<&AnalyzedDocument>,
        current: &AnalyzedDocument,
    ) -> Result<()> {
        let mut touched: BTreeMap<String, TermPostings> = BTreeMap::new();
        let all_terms = previous
            .into_iter()
            .flat_map(|p| p.terms())
            .chain(current.terms());
        for term in all_terms {
            if !touched.contains_key(term) {
                let postings = self
                    .load_term(term)?
                    .unwrap_or_else(|| TermPostings::new(term.clone()));
                touched.insert(term.clone(), postings);
            }
        }

        if let Some(old) = previous {
            for ((field, kind), terms) in &old.fields {
                for term in terms.frequencies.keys() {
                    if let Some(postings) = touched.get_mut(term) {
                        postings.remove_document(field, *kind, doc_id);
                    }
                }
            }
        }

        for ((field, kind), terms) in &current.fields {
            for (term, tf) in &terms.frequencies {
                if let Some(postings) = touched.get_mut(term) {
                    postings.list_mut(field, *kind).add_document(
                        doc_id,
                        Posting {
                            term_frequency: *tf,
                            field_length: terms.length,
                        },
                    );
                }
            }
        }

        for (term, postings) in touched {
            if postings.is_empty() {
                self.postings
                    .remove(term_key(&term))
                    .map_err(IndexError::storage)?;
            } else {
                let val = bincode::serialize(&postings)?;
                self.postings
                    .insert(term_key(&term), val)
                    .map_err(IndexError::storage)?;
            }
        }
        Ok(())
    }

    fn load_term(&self, term: &str) -> Result<Option<TermPostings>> {
        let Some(val) = self
            .postings
            .get(term_key(term))
            .map_err(IndexError::storage)?
        else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&val)?))
    }

    fn field_stats(&self, field: &str) -> Result<FieldStats> {
        let Some(val) = self
            .stats
            .get(field_stats_key(field))
            .map_err(IndexError::storage)?
        else {
            return Ok(FieldStats::default());
        };
        Ok(bincode::deserialize(&val)?)
    }

    fn update_field_stats(&self, field: &str, length_delta: i64, docs_delta: i64) -> Result<()> {
        let mut stats = self.field_stats(field)?;
        stats.total_length = stats.total_length.saturating_add_signed(length_delta);
        stats.documents = stats.documents.saturating_add_signed(docs_delta);
        if stats.documents == 0 {
            self.stats
                .remove(field_stats_key(field))
                .map_err(IndexError::storage)?;
        } else {
            let val = bincode::serialize(&stats)?;
            self.stats
                .insert(field_stats_key(field), val)
                .map_err(IndexError::storage)?;
        }
        Ok(())
    }

    fn read_doc_count(&self) -> Result<u64> {
        let Some(val) = self.stats.get(DOC_COUNT_KEY).map_err(IndexError::storage)? else {
            return Ok(0);
        };
        let bytes: [u8; 8] = val.as_ref().try_into().map_err(|_| {
            IndexError::StorageUnavailable("corrupt document count".to_string())
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn write_doc_count(&self, count: u64) -> Result<()> {
        self.stats
            .insert(DOC_COUNT_KEY, count.to_be_bytes())
            .map_err(IndexError::storage)?;
        Ok(())
    }

    fn pending_commit(&self) -> Result<Option<String>> {
        Ok(self
            .stats
            .get(PENDING_COMMIT_KEY)
            .map_err(IndexError::storage)?
            .map(|v| String::from_utf8_lossy(v.as_ref()).into_owned()))
    }

    fn recorded_analysis(&self) -> Result<Option<TokenizerConfig>> {
        let Some(val) = self.stats.get(ANALYSIS_KEY).map_err(IndexError::storage)? else {
            return Ok(None);
        };
        Ok(Some(bincode::deserialize(&val)?))
    }

    fn clear_keyspace(keyspace: &Keyspace) -> Result<()> {
        let mut keys = Vec::new();
        for kv in keyspace.iter() {
            let key = kv.key().map_err(IndexError::storage)?;
            keys.push(key.as_ref().to_vec());
        }
        for key in keys {
            keyspace.remove(key).map_err(IndexError::storage)?;
        }
        Ok(())
    }

    /// Recompute postings and statistics from the stored field archives.
    pub fn rebuild_from_archive(&self) -> Result<()> {
        let _guard = self.commit.write();
        self.rebuild_locked()
    }

    fn rebuild_locked(&self) -> Result<()> {
        Self::clear_keyspace(&self.postings)?;
        Self::clear_keyspace(&self.stats)?;

        let ids = self.docs.list_doc_ids()?;
        let mut count = 0u64;
        for doc_id in &ids {
            let Some(archive) = self.docs.get_archive(doc_id)? else {
                continue;
            };
            let decoded: Vec<Field> = archive.iter().filter_map(StoredField::decode).collect();
            let analyzed = AnalyzedDocument::analyze(&self.tokenizer, &decoded);
            self.apply_postings(doc_id, None, &analyzed)?;
            for (field, length) in analyzed.text_lengths() {
                self.update_field_stats(field, length as i64, 1)?;
            }
            count += 1;
        }
        self.write_doc_count(count)?;
        let analysis = bincode::serialize(&self.settings.tokenizer_config)?;
        self.stats
            .insert(ANALYSIS_KEY, analysis)
            .map_err(IndexError::storage)?;
        self.poisoned.store(false, Ordering::SeqCst);
        info!(documents = count, "postings rebuilt from archive");
        Ok(())
    }

    /// Acquire a read guard; released when the guard drops.
    pub fn reader(&self) -> IndexReader<'_> {
        IndexReader {
            store: self,
            _guard: self.commit.read(),
        }
    }

    pub fn search(&self, term: &str, cancel: &CancellationToken) -> Result<Vec<ScoredDocument>> {
        self.reader().search(term, cancel)
    }

    pub fn fetch(&self, doc_id: &str, cancel: &CancellationToken) -> Result<Vec<StoredField>> {
        self.reader().fetch(doc_id, cancel)
    }

    pub fn doc_count(&self) -> Result<u64> {
        self.reader().doc_count()
    }

    pub fn set_internal(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _guard = self.commit.write();
        self.injected_failure(FailPoint::InternalWrite)?;
        self.docs.set_internal(key, value)
    }

    pub fn get_internal(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _reader = self.reader();
        self.docs.get_internal(key)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let _reader = self.reader();
        Ok(IndexStats {
            documents: self.read_doc_count()?,
            archive_bytes: self.docs.blob_log().size()?,
        })
    }

    /// Flush the archive and release the location.
    pub fn close(self) -> Result<()> {
        let _guard = self.commit.write();
        self.docs.sync()?;
        info!(location = %self.settings.storage.location.display(), "index closed");
        Ok(())
    }
}

/// Scoped read access to an [`IndexStore`].
pub struct IndexReader<'a> {
    store: &'a IndexStore,
    _guard: RwLockReadGuard<'a, ()>,
}

impl IndexReader<'_> {
    /// Documents whose text fields match `term`, best first.
    ///
    /// The term goes through the same analysis chain as indexed text, so
    /// case, stemming and multi-word input behave as at index time.
    pub fn search(&self, term: &str, cancel: &CancellationToken) -> Result<Vec<ScoredDocument>> {
        check(cancel)?;
        let mut terms = self.store.tokenizer.terms_or_exact(term);
        terms.sort();
        terms.dedup();
        self.match_terms(&terms, cancel)
    }

    /// OR of already-analyzed terms: per-document BM25 sums, ranked
    pub fn match_terms(
        &self,
        terms: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredDocument>> {
        let mut scores: BTreeMap<DocumentId, f32> = BTreeMap::new();
        for term in terms {
            for (doc_id, score) in self.term_scores(term, cancel)? {
                *scores.entry(doc_id).or_insert(0.0) += score;
            }
        }
        Ok(rank(scores))
    }

    /// BM25 contribution of one normalized term, per document
    pub fn term_scores(
        &self,
        term: &str,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<DocumentId, f32>> {
        self.store.ensure_usable()?;
        let mut scores = BTreeMap::new();
        let Some(postings) = self.store.load_term(term)? else {
            return Ok(scores);
        };
        let total_docs = self.doc_count()? as f32;

        for list in postings.text_lists() {
            check(cancel)?;
            let avg_len = self.store.field_stats(&list.field)?.average_length();
            let df = list.document_frequency() as f32;
            for (doc_id, posting) in &list.postings {
                let score = bm25_score(
                    posting.term_frequency as f32,
                    df,
                    total_docs.max(df),
                    posting.field_length as f32,
                    avg_len,
                );
                *scores.entry(doc_id.clone()).or_insert(0.0) += score;
            }
        }
        Ok(scores)
    }

    /// Stored fields of `doc_id` in indexing order.
    pub fn fetch(&self, doc_id: &str, cancel: &CancellationToken) -> Result<Vec<StoredField>> {
        check(cancel)?;
        self.store.ensure_usable()?;
        self.store
            .docs
            .get_archive(doc_id)?
            .ok_or_else(|| IndexError::NotFound(doc_id.to_string()))
    }

    pub fn doc_count(&self) -> Result<u64> {
        self.store.read_doc_count()
    }
}
