//! Todo endpoints: the server that confirms or rejects client changes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::RecordId;
use record_store::{ReleaseHandle, Store};
use serde::Deserialize;
use todos::{Filter, Todo, TodoPatch, TodoStats, selectors, validate_title};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub store: Store<Todo>,
    /// Observer subscriptions kept alive for the lifetime of the server.
    pub observers: Vec<ReleaseHandle>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateTodoRequest {
    pub id: Option<String>,
    pub title: String,
    pub completed: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub filter: Option<String>,
}

// -- Handlers --

/// GET /todos — lists todos in creation order, optionally filtered.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Todo>>, ApiError> {
    let filter = match query.filter {
        Some(raw) => raw.parse::<Filter>().map_err(ApiError::BadRequest)?,
        None => Filter::All,
    };
    let todos = selectors::filtered(filter)(&state.store.read());
    Ok(Json(todos))
}

/// POST /todos — stores a new todo, keeping a client-chosen id if given.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let title = validate_title(&req.title)?;
    let id = req.id.map(RecordId::new).unwrap_or_else(RecordId::generate);
    let todo = Todo {
        id: id.clone(),
        title,
        completed: req.completed.unwrap_or(false),
        created_at: req.created_at.unwrap_or_else(Utc::now),
    };

    let mut inserted = false;
    state.store.update(|set| {
        if set.contains(id.as_str()) {
            set
        } else {
            inserted = true;
            set.with(id.clone(), todo.clone())
        }
    });

    if !inserted {
        return Err(ApiError::Conflict(format!("todo already exists: {id}")));
    }

    metrics::counter!("todo_server_changes_total", "action" => "create").increment(1);
    tracing::info!(%id, "todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// GET /todos/{id} — returns a single todo.
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, ApiError> {
    state
        .store
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("todo not found: {id}")))
}

/// PATCH /todos/{id} — applies a partial change, creating the todo if absent.
///
/// Creating requires a non-blank title, as on POST.
#[tracing::instrument(skip(state, patch))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<TodoPatch>,
) -> Result<Json<Todo>, ApiError> {
    let mut patch = patch;
    if let Some(title) = &patch.title {
        patch.title = Some(validate_title(title)?);
    }

    // An absent id is created from the patch, which then needs a title.
    let mut result = Err(ApiError::Internal("update was not applied".to_string()));
    state.store.update(|set| {
        let todo = match set.get(&id) {
            Some(existing) => Ok(patch.apply_to(existing)),
            None => patch.into_todo(id.as_str()),
        };
        match todo {
            Ok(todo) => {
                result = Ok(todo.clone());
                set.with(id.as_str(), todo)
            }
            Err(e) => {
                result = Err(e.into());
                set
            }
        }
    });

    let todo = result?;
    metrics::counter!("todo_server_changes_total", "action" => "update").increment(1);
    tracing::info!(%id, completed = todo.completed, "todo updated");
    Ok(Json(todo))
}

/// DELETE /todos/{id} — removes a todo.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut removed = false;
    state.store.update(|set| {
        removed = set.contains(&id);
        set.without(&id)
    });

    if removed {
        metrics::counter!("todo_server_changes_total", "action" => "delete").increment(1);
        tracing::info!(%id, "todo deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("todo not found: {id}")))
    }
}

/// GET /stats — totals over the whole list.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<TodoStats> {
    Json(selectors::stats(&state.store.read()))
}
