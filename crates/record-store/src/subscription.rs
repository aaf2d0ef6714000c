//! Subscriptions and their release handles.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{RecordSet, Version};

/// Identifier of a registered subscription within one store.
pub(crate) type SubscriptionId = u64;

/// Type-erased subscription as seen by the store.
pub(crate) trait Notify<V>: Send + Sync {
    /// Re-evaluates the projection against `set` and fires the callback if
    /// the projected value changed.
    fn notify(&self, set: &RecordSet<V>);

    /// Marks the subscription inactive; later notifications are ignored.
    fn deactivate(&self);
}

/// Last projected value together with the version it was computed at.
struct Observed<P> {
    version: Version,
    value: P,
}

pub(crate) struct Subscription<V, P, F, C> {
    projection: F,
    callback: C,
    observed: Mutex<Observed<P>>,
    active: AtomicBool,
    _records: PhantomData<fn(&RecordSet<V>)>,
}

impl<V, P, F, C> Subscription<V, P, F, C>
where
    F: Fn(&RecordSet<V>) -> P,
{
    pub(crate) fn new(projection: F, callback: C, initial: &RecordSet<V>) -> Self {
        let value = projection(initial);
        Self {
            projection,
            callback,
            observed: Mutex::new(Observed {
                version: initial.version(),
                value,
            }),
            active: AtomicBool::new(true),
            _records: PhantomData,
        }
    }
}

impl<V, P, F, C> Notify<V> for Subscription<V, P, F, C>
where
    P: PartialEq + Clone + Send,
    F: Fn(&RecordSet<V>) -> P + Send + Sync,
    C: Fn(&P) + Send + Sync,
{
    fn notify(&self, set: &RecordSet<V>) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }

        let changed = {
            let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
            // A nested or concurrent update may already have delivered a newer set.
            if set.version() <= observed.version {
                return;
            }
            observed.version = set.version();

            let next = (self.projection)(set);
            if next == observed.value {
                None
            } else {
                observed.value = next.clone();
                Some(next)
            }
        };

        // The lock is released first so the callback may update the store.
        if let Some(value) = changed {
            (self.callback)(&value);
        }
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Handle returned by [`Store::subscribe`](crate::Store::subscribe).
///
/// Calling [`release`](Self::release) permanently deregisters the
/// subscription. Releasing more than once is a no-op. Dropping the handle
/// without releasing keeps the subscription registered for the lifetime of
/// the store.
#[must_use = "a subscription stays registered until released"]
pub struct ReleaseHandle {
    release: Mutex<Option<ReleaseFn>>,
    released: AtomicBool,
}

impl ReleaseHandle {
    pub(crate) fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Mutex::new(Some(Box::new(release))),
            released: AtomicBool::new(false),
        }
    }

    /// Deregisters the subscription.
    pub fn release(&self) {
        let release = self
            .release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(release) = release {
            release();
            self.released.store(true, Ordering::Release);
        }
    }

    /// Returns true once [`release`](Self::release) has been called.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("released", &self.is_released())
            .finish()
    }
}
