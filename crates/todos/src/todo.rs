//! Todo records and the values used to create and change them.

use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TodoError};

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: RecordId,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// Creates an open todo stamped with the current time.
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed: false,
            created_at: Utc::now(),
        }
    }

    /// Returns a copy with the completed flag flipped.
    pub fn toggled(&self) -> Self {
        Self {
            completed: !self.completed,
            ..self.clone()
        }
    }
}

/// Input for creating a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    pub title: String,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// Returns the trimmed title, rejecting empty ones.
    pub fn validated_title(&self) -> Result<String> {
        validate_title(&self.title)
    }
}

/// Trims a title and rejects it if nothing is left.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        Err(TodoError::InvalidTitle)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Partial change to a todo. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TodoPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            completed: None,
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            title: None,
            completed: Some(completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }

    /// Returns `todo` with this patch applied.
    pub fn apply_to(&self, todo: &Todo) -> Todo {
        Todo {
            id: todo.id.clone(),
            title: self.title.clone().unwrap_or_else(|| todo.title.clone()),
            completed: self.completed.unwrap_or(todo.completed),
            created_at: todo.created_at,
        }
    }

    /// Builds a todo from this patch alone, for ids with no current record.
    ///
    /// A new todo needs a title, so a patch without one is rejected.
    pub fn into_todo(self, id: impl Into<RecordId>) -> Result<Todo> {
        let title = self.title.ok_or(TodoError::InvalidTitle)?;
        Ok(Todo {
            id: id.into(),
            title: validate_title(&title)?,
            completed: self.completed.unwrap_or(false),
            created_at: Utc::now(),
        })
    }
}

/// Which todos a list view shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    /// Returns true if `todo` is shown under this filter.
    pub fn matches(&self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }
}

impl std::str::FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "all"),
            Filter::Active => write!(f, "active"),
            Filter::Completed => write!(f, "completed"),
        }
    }
}

/// Counts over the whole list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TodoStats {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    /// Share of completed todos in percent; 0 for an empty list.
    pub completion_percentage: f64,
}
