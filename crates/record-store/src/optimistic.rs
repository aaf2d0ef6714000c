//! Optimistic updates with rollback.
//!
//! An optimistic operation writes a tentative value into the store before a
//! remote system has confirmed it:
//!
//! 1. the record's current value (or its absence) is captured as a rollback
//!    snapshot in the same update that writes the optimistic value;
//! 2. the confirming future is awaited;
//! 3. on success the confirmed value replaces the optimistic one;
//! 4. on failure the snapshot is restored exactly and the error is returned.
//!
//! Overlapping operations on the same record are not coordinated: the second
//! operation's snapshot holds the first one's unconfirmed value. Dropping the
//! future of [`run`] while it awaits confirmation leaves the optimistic value
//! in place; cancellation is not supported.

use std::fmt::Display;
use std::future::Future;

use crate::{RecordId, Store};

/// Rollback snapshot held while a confirmation is in flight.
#[derive(Debug)]
#[must_use = "a pending operation must be confirmed or rolled back"]
pub struct PendingOperation<V> {
    id: RecordId,
    snapshot: Option<V>,
}

impl<V> PendingOperation<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Captures the current value of `id` and writes the value produced by
    /// `optimistic` in a single update.
    ///
    /// `optimistic` receives the current record and returns the tentative
    /// one; `None` removes the record. Returns the pending operation and the
    /// value that was written.
    pub fn begin<F>(store: &Store<V>, id: impl Into<RecordId>, optimistic: F) -> (Self, Option<V>)
    where
        F: FnOnce(Option<&V>) -> Option<V>,
    {
        let id = id.into();
        let mut snapshot = None;
        let mut applied = None;

        store.update(|set| {
            snapshot = set.get(id.as_str()).cloned();
            let next = optimistic(snapshot.as_ref());
            applied = next.clone();
            set.with_record(id.clone(), next)
        });

        (Self { id, snapshot }, applied)
    }

    /// The record this operation targets.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// The value the record had before the optimistic write.
    pub fn snapshot(&self) -> Option<&V> {
        self.snapshot.as_ref()
    }

    /// Installs the authoritative value and discards the snapshot.
    pub fn confirm(self, store: &Store<V>, confirmed: Option<V>) {
        store.set_record(self.id, confirmed);
    }

    /// Restores the snapshot, removing the record if it did not exist.
    pub fn rollback(self, store: &Store<V>) {
        store.set_record(self.id, self.snapshot);
    }
}

/// Runs one optimistic operation against `store`.
///
/// `optimistic` computes the tentative value from the current record.
/// `confirm` receives that tentative value and resolves to the
/// authoritative one (`None` meaning the record is gone). On failure the
/// rollback snapshot is restored before the error is returned.
#[tracing::instrument(skip_all, fields(record_id = %id))]
pub async fn run<V, E, O, C, Fut>(
    store: &Store<V>,
    id: RecordId,
    optimistic: O,
    confirm: C,
) -> Result<Option<V>, E>
where
    V: Clone + Send + Sync + 'static,
    E: Display,
    O: FnOnce(Option<&V>) -> Option<V>,
    C: FnOnce(Option<V>) -> Fut,
    Fut: Future<Output = Result<Option<V>, E>>,
{
    let (pending, applied) = PendingOperation::begin(store, id, optimistic);

    match confirm(applied).await {
        Ok(confirmed) => {
            pending.confirm(store, confirmed.clone());
            metrics::counter!("optimistic_confirmed_total").increment(1);
            tracing::debug!("optimistic update confirmed");
            Ok(confirmed)
        }
        Err(e) => {
            pending.rollback(store);
            metrics::counter!("optimistic_rolled_back_total").increment(1);
            tracing::warn!(error = %e, "optimistic update rolled back");
            Err(e)
        }
    }
}
