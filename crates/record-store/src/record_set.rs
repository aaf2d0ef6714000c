//! Immutable record set snapshots.

use std::collections::HashMap;
use std::collections::hash_map;
use std::sync::Arc;

use crate::{RecordId, Version};

/// A snapshot of all records held by a store.
///
/// Record sets are values: every modifying method consumes the set and
/// returns a new one. Storage is shared between clones and only copied when
/// a shared set is modified, so handing snapshots to readers is cheap.
#[derive(Debug, Clone)]
pub struct RecordSet<V> {
    records: Arc<HashMap<RecordId, V>>,
    version: Version,
}

impl<V> RecordSet<V> {
    /// Creates an empty record set at the initial version.
    pub fn new() -> Self {
        Self {
            records: Arc::new(HashMap::new()),
            version: Version::initial(),
        }
    }

    /// Returns the version at which this set was installed.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Looks up a record. Absent identifiers yield `None`.
    pub fn get(&self, id: &str) -> Option<&V> {
        self.records.get(id)
    }

    /// Returns true if a record exists under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over all records in no particular order.
    pub fn iter(&self) -> hash_map::Iter<'_, RecordId, V> {
        self.records.iter()
    }

    /// Iterates over record values in no particular order.
    pub fn values(&self) -> hash_map::Values<'_, RecordId, V> {
        self.records.values()
    }

    /// Returns the identifiers of all records in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    pub(crate) fn at_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

impl<V: Clone> RecordSet<V> {
    /// Returns a set where `id` maps to `value`, replacing any previous record.
    pub fn with(mut self, id: impl Into<RecordId>, value: V) -> Self {
        Arc::make_mut(&mut self.records).insert(id.into(), value);
        self
    }

    /// Returns a set without the record under `id`.
    pub fn without(mut self, id: &str) -> Self {
        if self.records.contains_key(id) {
            Arc::make_mut(&mut self.records).remove(id);
        }
        self
    }

    /// Writes `Some(value)` or removes the record for `None`.
    pub fn with_record(self, id: impl Into<RecordId>, value: Option<V>) -> Self {
        let id = id.into();
        match value {
            Some(value) => self.with(id, value),
            None => self.without(id.as_str()),
        }
    }

    /// Returns a set with `f` applied to the record under `id`, if present.
    pub fn map_record(mut self, id: &str, f: impl FnOnce(&mut V)) -> Self {
        if self.records.contains_key(id)
            && let Some(record) = Arc::make_mut(&mut self.records).get_mut(id)
        {
            f(record);
        }
        self
    }
}

impl<V> Default for RecordSet<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Compares records only; versions are ignored.
impl<V: PartialEq> PartialEq for RecordSet<V> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records) || self.records == other.records
    }
}

impl<V: Eq> Eq for RecordSet<V> {}

impl<V, K: Into<RecordId>> FromIterator<(K, V)> for RecordSet<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            records: Arc::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
            version: Version::initial(),
        }
    }
}
