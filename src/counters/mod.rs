//! Impression counting: an in-memory accumulator drained into durable analytics.
//!
//! List requests call [`CounterStore::increment`] once per returned entity. The
//! [`CounterFlusher`] periodically drains pending deltas and adds them to the
//! `impressions` column of the matching aggregate.

mod flush;
mod store;

pub use flush::{CounterFlusher, FlushReport};
pub use store::{CounterStore, MemoryCounterStore, PendingCount};
