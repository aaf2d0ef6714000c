//! The observable record store.

use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use crate::subscription::{Notify, ReleaseHandle, Subscription, SubscriptionId};
use crate::{RecordId, RecordSet, Version};

struct Subscribers<V> {
    next_id: SubscriptionId,
    entries: Vec<(SubscriptionId, Arc<dyn Notify<V>>)>,
}

impl<V> Default for Subscribers<V> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

struct Inner<V> {
    current: RwLock<RecordSet<V>>,
    subscribers: Mutex<Subscribers<V>>,
}

impl<V> Inner<V> {
    fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = subscribers.entries.iter().position(|(sid, _)| *sid == id) {
            let (_, subscription) = subscribers.entries.remove(pos);
            subscription.deactivate();
        }
    }
}

/// An observable, versioned, in-memory record store.
///
/// The store owns the current [`RecordSet`]; the only way to change it is
/// [`update`](Self::update). Readers always see a fully installed set.
/// After each update every active subscription re-evaluates its projection
/// and fires its callback when the projected value changed.
///
/// Cloning a store yields another handle to the same records.
pub struct Store<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_records(RecordSet::new())
    }

    /// Creates a store holding `records` at the initial version.
    pub fn with_records(records: RecordSet<V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(records.at_version(Version::initial())),
                subscribers: Mutex::new(Subscribers::default()),
            }),
        }
    }

    /// Returns the current snapshot of all records.
    pub fn read(&self) -> RecordSet<V> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the record set with the result of `mutator`.
    ///
    /// The new set is installed atomically and stamped with the next
    /// version, which is returned. Subscriptions are evaluated after the
    /// write lock is released, so callbacks may read or update this store.
    pub fn update<F>(&self, mutator: F) -> Version
    where
        F: FnOnce(RecordSet<V>) -> RecordSet<V>,
    {
        let installed = {
            let mut current = self
                .inner
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let version = current.version().next();
            let next = mutator(current.clone()).at_version(version);
            *current = next.clone();
            next
        };

        tracing::trace!(version = %installed.version(), records = installed.len(), "record set installed");
        self.notify(&installed);
        installed.version()
    }

    /// Registers a subscription.
    ///
    /// `projection` must be pure: it derives a value from the full record
    /// set and must not touch the store. `callback` fires after an update
    /// whose projected value differs from the previously observed one.
    pub fn subscribe<P, F, C>(&self, projection: F, callback: C) -> ReleaseHandle
    where
        P: PartialEq + Clone + Send + 'static,
        F: Fn(&RecordSet<V>) -> P + Send + Sync + 'static,
        C: Fn(&P) + Send + Sync + 'static,
    {
        // Holding the read lock while registering keeps an in-flight update
        // from slipping between the initial projection and registration.
        let current = self
            .inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let subscription: Arc<dyn Notify<V>> = Arc::new(Subscription::<V, P, F, C>::new(
            projection, callback, &*current,
        ));

        let id = {
            let mut subscribers = self
                .inner
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.entries.push((id, subscription));
            id
        };
        drop(current);

        let inner: Weak<Inner<V>> = Arc::downgrade(&self.inner);
        ReleaseHandle::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.unsubscribe(id);
            }
        })
    }

    /// Returns a clone of the record under `id`.
    pub fn get(&self, id: &str) -> Option<V> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Writes `value` under `id`.
    pub fn insert(&self, id: impl Into<RecordId>, value: V) -> Version {
        let id = id.into();
        self.update(move |set| set.with(id, value))
    }

    /// Removes the record under `id`, if any.
    pub fn remove(&self, id: &str) -> Version {
        self.update(|set| set.without(id))
    }

    /// Writes `Some(value)` or removes the record for `None`.
    pub fn set_record(&self, id: impl Into<RecordId>, value: Option<V>) -> Version {
        let id = id.into();
        self.update(move |set| set.with_record(id, value))
    }

    /// Replaces every record at once.
    pub fn replace_all<I, K>(&self, records: I) -> Version
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<RecordId>,
    {
        let next: RecordSet<V> = records.into_iter().collect();
        self.update(move |_| next)
    }

    /// Returns the version of the current record set.
    pub fn version(&self) -> Version {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version()
    }

    /// Returns the number of records currently held.
    pub fn len(&self) -> usize {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn notify(&self, set: &RecordSet<V>) {
        let subscribers: Vec<Arc<dyn Notify<V>>> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, subscription)| Arc::clone(subscription))
            .collect();

        for subscription in subscribers {
            subscription.notify(set);
        }
    }
}

impl<V> Default for Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for Store<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version())
            .field("records", &self.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
