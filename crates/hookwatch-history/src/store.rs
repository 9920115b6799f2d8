use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hookwatch_core::config::MAX_HISTORY_SIZE;
use hookwatch_core::error::Result;
use hookwatch_core::types::WebhookRecord;
use serde_json::value::RawValue;

/// Wire form of one record, encoded once when it enters the history.
pub type EncodedRecord = Arc<RawValue>;

pub(crate) fn encode(record: &WebhookRecord) -> serde_json::Result<EncodedRecord> {
    serde_json::value::to_raw_value(record).map(Arc::from)
}

#[derive(Debug)]
struct Entry {
    record: Arc<WebhookRecord>,
    encoded: EncodedRecord,
}

/// Newest-first, count-bounded buffer of webhook records.
///
/// Not synchronized on its own; [`HistoryStore`] wraps it in a mutex.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<Entry>,
    capacity: usize,
}

impl History {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert at the front and drop the oldest records beyond capacity.
    pub fn append(&mut self, record: WebhookRecord) -> Result<Arc<WebhookRecord>> {
        let record = self.admit(record);
        let encoded = encode(&record)?;
        let record = Arc::new(record);
        self.commit(Arc::clone(&record), encoded);
        Ok(record)
    }

    /// Clamp the record's timestamp so history stays non-decreasing when the
    /// wall clock steps backwards.
    pub(crate) fn admit(&self, mut record: WebhookRecord) -> WebhookRecord {
        if let Some(newest) = self.entries.front() {
            if record.timestamp < newest.record.timestamp {
                record.timestamp = newest.record.timestamp;
            }
        }
        record
    }

    pub(crate) fn commit(&mut self, record: Arc<WebhookRecord>, encoded: EncodedRecord) {
        self.entries.push_front(Entry { record, encoded });
        self.entries.truncate(self.capacity);
    }

    /// Length the history will have once one more record is appended.
    pub(crate) fn len_after_append(&self) -> usize {
        (self.entries.len() + 1).min(self.capacity)
    }

    /// Point-in-time copy, newest first. Records are shared, not cloned.
    pub fn read_all(&self) -> Vec<Arc<WebhookRecord>> {
        self.entries.iter().map(|e| Arc::clone(&e.record)).collect()
    }

    /// Same snapshot as [`History::read_all`], in wire form.
    pub fn read_encoded(&self) -> Vec<EncodedRecord> {
        self.entries.iter().map(|e| Arc::clone(&e.encoded)).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn newest(&self) -> Option<&Arc<WebhookRecord>> {
        self.entries.front().map(|e| &e.record)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }
}

/// Thread-safe wrapper around [`History`].
///
/// Every operation takes the single lock for O(capacity) pointer copies at
/// most; encoding happens before a record is committed. A poisoned lock is
/// recovered: no operation can leave the buffer half-updated, so the data
/// behind it is still valid.
#[derive(Debug, Default)]
pub struct HistoryStore {
    inner: Mutex<History>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(History::with_capacity(capacity)),
        }
    }

    /// Exclusive access, for callers that must pair a mutation with
    /// something else (the hub's broadcast) atomically.
    pub fn lock(&self) -> MutexGuard<'_, History> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, record: WebhookRecord) -> Result<Arc<WebhookRecord>> {
        self.lock().append(record)
    }

    pub fn read_all(&self) -> Vec<Arc<WebhookRecord>> {
        self.lock().read_all()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
