//! Cross-cutting observers attached through [`Store::subscribe`].
//!
//! These replace wrapping the store: each observer is an ordinary
//! subscription projecting the record set's version and size.

use crate::{ReleaseHandle, Store, Version};

/// Publishes every state transition as a `debug` tracing event.
pub fn attach_tracing<V>(store: &Store<V>, name: &'static str) -> ReleaseHandle
where
    V: Clone + Send + Sync + 'static,
{
    store.subscribe(
        |set| (set.version(), set.len()),
        move |(version, records): &(Version, usize)| {
            tracing::debug!(store = name, %version, records, "state transition");
        },
    )
}

/// Records a size gauge and an update counter labelled with `name`.
pub fn attach_metrics<V>(store: &Store<V>, name: &'static str) -> ReleaseHandle
where
    V: Clone + Send + Sync + 'static,
{
    metrics::gauge!("record_store_records", "store" => name).set(store.len() as f64);
    store.subscribe(
        |set| (set.version(), set.len()),
        move |(_, records): &(Version, usize)| {
            metrics::counter!("record_store_updates_total", "store" => name).increment(1);
            metrics::gauge!("record_store_records", "store" => name).set(*records as f64);
        },
    )
}
