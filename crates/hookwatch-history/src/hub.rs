use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use hookwatch_core::error::Result;
use hookwatch_core::types::{now_iso8601, WebhookRecord};
use hookwatch_protocol::frames::{self, ClientCommand};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::store::{self, EncodedRecord, HistoryStore};

/// One item in a viewer's queue.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A frame serialized once and shared by every recipient.
    Frame(Arc<str>),
    /// A `history_data` reply, left for the viewer's own task to assemble
    /// from records encoded when they were appended.
    History(Vec<EncodedRecord>),
}

impl Outbound {
    /// Text to put on the socket.
    pub fn into_text(self) -> serde_json::Result<Arc<str>> {
        match self {
            Outbound::Frame(text) => Ok(text),
            Outbound::History(records) => frames::history_data(&records).map(Arc::from),
        }
    }
}

/// Outbound queue of one viewer.
pub type ViewerTx = mpsc::Sender<Outbound>;

/// Identity of one live viewer connection, valid for its lifetime only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewerId(String);

impl ViewerId {
    fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of [`SubscriptionHub::publish`].
#[derive(Debug, Clone)]
pub struct Published {
    pub record: Arc<WebhookRecord>,
    /// History size right after this record was appended.
    pub total_count: usize,
    /// Viewers the `new_webhook` frame was queued for.
    pub delivered: usize,
}

/// Viewer registry plus the history it fans out.
///
/// The history lock is the one serialization point: each mutation, the
/// frame describing it, and the enqueue into every viewer queue happen
/// while it is held. Records are encoded outside the lock and enqueueing is
/// `try_send`, so the lock only ever covers pointer copies and short
/// frame assembly; the socket write itself happens in the viewer's own
/// connection task.
pub struct SubscriptionHub {
    store: HistoryStore,
    viewers: DashMap<ViewerId, ViewerTx>,
}

impl SubscriptionHub {
    pub fn new(store: HistoryStore) -> Self {
        Self {
            store,
            viewers: DashMap::new(),
        }
    }

    /// Snapshot of the history, newest first.
    pub fn read_all(&self) -> Vec<Arc<WebhookRecord>> {
        self.store.read_all()
    }

    pub fn history_len(&self) -> usize {
        self.store.len()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_connected(&self, viewer: &ViewerId) -> bool {
        self.viewers.contains_key(viewer)
    }

    /// Register a viewer. Nothing is pushed until it asks for history.
    pub fn connect(&self, tx: ViewerTx) -> ViewerId {
        let id = ViewerId::new();
        self.viewers.insert(id.clone(), tx);
        info!(viewer = %id, viewers = self.viewers.len(), "viewer connected");
        id
    }

    pub fn disconnect(&self, viewer: &ViewerId) {
        if self.viewers.remove(viewer).is_some() {
            info!(viewer = %viewer, viewers = self.viewers.len(), "viewer disconnected");
        }
    }

    /// Run one client command on behalf of `viewer`.
    pub fn handle(&self, viewer: &ViewerId, command: ClientCommand) -> Result<()> {
        debug!(viewer = %viewer, event = command.event_name(), "client command");
        match command {
            ClientCommand::GetHistory => self.get_history(viewer),
            ClientCommand::ClearHistory => self.clear_history(viewer),
        }
    }

    /// Append a record and queue `new_webhook` for every connected viewer,
    /// as one step relative to every other hub operation.
    ///
    /// The frame is serialized before the history is touched, so a failure
    /// leaves the history exactly as it was.
    #[instrument(skip(self, record), fields(request_id = %record.request_id))]
    pub fn publish(&self, record: WebhookRecord) -> Result<Published> {
        let received_at = record.timestamp;
        let mut encoded = store::encode(&record)?;

        let mut history = self.store.lock();

        let record = history.admit(record);
        if record.timestamp != received_at {
            // clamped behind a newer record: the early encoding is stale
            encoded = store::encode(&record)?;
        }
        let total_count = history.len_after_append();
        let frame = frames::new_webhook(&*encoded, total_count)?;

        let record = Arc::new(record);
        history.commit(Arc::clone(&record), encoded);
        let delivered = self.broadcast(Outbound::Frame(frame.into()));
        drop(history);

        Ok(Published {
            record,
            total_count,
            delivered,
        })
    }

    /// Reply to `viewer` alone with the current snapshot.
    ///
    /// Only the encoded records are copied under the lock; the frame is
    /// assembled by the viewer's task, after the lock is gone.
    pub fn get_history(&self, viewer: &ViewerId) -> Result<()> {
        let history = self.store.lock();
        let snapshot = history.read_encoded();
        let total_count = snapshot.len();
        self.send_to(viewer, Outbound::History(snapshot));
        drop(history);

        debug!(viewer = %viewer, total_count, "history queued");
        Ok(())
    }

    /// Empty the history and tell every viewer, the requester included.
    #[instrument(skip(self, viewer), fields(viewer = %viewer))]
    pub fn clear_history(&self, viewer: &ViewerId) -> Result<()> {
        let frame = frames::history_cleared(now_iso8601())?;

        let mut history = self.store.lock();
        let dropped = history.len();
        history.clear();
        let delivered = self.broadcast(Outbound::Frame(frame.into()));
        drop(history);

        info!(dropped, delivered, "webhook history cleared");
        Ok(())
    }

    /// Queue `item` for every viewer registered right now.
    fn broadcast(&self, item: Outbound) -> usize {
        // Copy the registry so connects and disconnects racing with this
        // loop can neither block on nor disturb it.
        let targets: Vec<(ViewerId, ViewerTx)> = self
            .viewers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        targets
            .into_iter()
            .filter(|(id, tx)| self.deliver(id, tx, item.clone()))
            .count()
    }

    fn send_to(&self, viewer: &ViewerId, item: Outbound) -> bool {
        // Clone the sender out so no registry guard is held while delivering.
        let tx = self.viewers.get(viewer).map(|entry| entry.value().clone());
        match tx {
            Some(tx) => self.deliver(viewer, &tx, item),
            None => {
                debug!(viewer = %viewer, "reply dropped: viewer no longer registered");
                false
            }
        }
    }

    /// Non-blocking enqueue. A full queue means the viewer cannot keep up:
    /// it is evicted so it never silently misses individual events.
    fn deliver(&self, viewer: &ViewerId, tx: &ViewerTx, item: Outbound) -> bool {
        match tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(viewer = %viewer, "viewer queue full, evicting slow viewer");
                self.viewers.remove(viewer);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(viewer = %viewer, "viewer queue closed, removing");
                self.viewers.remove(viewer);
                false
            }
        }
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(HistoryStore::default())
    }
}
