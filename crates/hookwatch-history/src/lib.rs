//! Bounded webhook history with real-time fan-out to viewers.
//!
//! [`HistoryStore`] keeps the newest [`MAX_HISTORY_SIZE`] records.
//! [`SubscriptionHub`] owns the store and the viewer registry and is the
//! single serialization point for every mutation and its broadcast.
//! [`Ingestor`] turns a raw HTTP request into a committed record.
//!
//! [`MAX_HISTORY_SIZE`]: hookwatch_core::config::MAX_HISTORY_SIZE

pub mod hub;
pub mod ingest;
pub mod store;

pub use hub::{Outbound, Published, SubscriptionHub, ViewerId, ViewerTx};
pub use ingest::{InboundRequest, Ingestor};
pub use store::{EncodedRecord, History, HistoryStore};
