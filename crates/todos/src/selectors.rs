//! Projections over the todo record set.
//!
//! Each selector is a pure function of the record set and can be passed
//! straight to [`Store::subscribe`](record_store::Store::subscribe).

use common::RecordId;
use record_store::RecordSet;

use crate::todo::{Filter, Todo, TodoStats};

/// Selects one todo.
pub fn todo(id: &str) -> impl Fn(&RecordSet<Todo>) -> Option<Todo> + Send + Sync + use<> {
    let id = RecordId::new(id);
    move |set| set.get(id.as_str()).cloned()
}

/// Selects the completed flag of one todo.
pub fn completed(id: &str) -> impl Fn(&RecordSet<Todo>) -> Option<bool> + Send + Sync + use<> {
    let id = RecordId::new(id);
    move |set| set.get(id.as_str()).map(|t| t.completed)
}

/// Key of the single record held by a selection store.
pub const SELECTED: &str = "selected";

/// Selects the id held by a selection store, if any.
pub fn selected_id(selection: &RecordSet<RecordId>) -> Option<RecordId> {
    selection.get(SELECTED).cloned()
}

/// All todos, oldest first; ties are broken by id.
pub fn all_sorted(set: &RecordSet<Todo>) -> Vec<Todo> {
    let mut todos: Vec<Todo> = set.values().cloned().collect();
    todos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    todos
}

/// Todos shown under `filter`, oldest first.
pub fn filtered(filter: Filter) -> impl Fn(&RecordSet<Todo>) -> Vec<Todo> + Send + Sync {
    move |set| {
        all_sorted(set)
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect()
    }
}

/// Number of todos not yet completed.
pub fn remaining_count(set: &RecordSet<Todo>) -> usize {
    set.values().filter(|t| !t.completed).count()
}

pub fn stats(set: &RecordSet<Todo>) -> TodoStats {
    let total = set.len();
    let remaining = remaining_count(set);
    let completed = total - remaining;
    let completion_percentage = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };
    TodoStats {
        total,
        completed,
        remaining,
        completion_percentage,
    }
}
