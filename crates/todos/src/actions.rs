//! Todo actions: local changes applied optimistically and confirmed remotely.

use common::RecordId;
use record_store::{Request, Store, Transport, TransportExt, optimistic};

use crate::error::{Result, TodoError};
use crate::selectors::{self, SELECTED};
use crate::todo::{NewTodo, Todo, TodoPatch};

/// Path of the todo collection on the confirming server.
pub const TODOS_PATH: &str = "/todos";

fn todo_path(id: &RecordId) -> String {
    format!("{TODOS_PATH}/{id}")
}

/// Actions over a todo store.
///
/// Every mutating action writes its expected outcome into the store first,
/// then asks the server to confirm it. The server's answer replaces the
/// local guess; a rejected change is rolled back before the error is
/// returned.
///
/// The currently selected todo is kept in a separate single-record store so
/// views can subscribe to it independently of the list.
pub struct TodoActions<T: Transport> {
    store: Store<Todo>,
    selection: Store<RecordId>,
    transport: T,
}

impl<T: Transport> TodoActions<T> {
    /// Creates actions over `store` confirmed through `transport`.
    pub fn new(store: Store<Todo>, transport: T) -> Self {
        Self {
            store,
            selection: Store::new(),
            transport,
        }
    }

    /// Returns the store these actions write to.
    pub fn store(&self) -> &Store<Todo> {
        &self.store
    }

    /// Returns the store holding the selected id under [`SELECTED`].
    pub fn selection(&self) -> &Store<RecordId> {
        &self.selection
    }

    /// Marks `id` as selected. The id need not exist yet.
    pub fn select(&self, id: &str) {
        self.selection.insert(SELECTED, RecordId::new(id));
    }

    pub fn clear_selection(&self) {
        self.selection.remove(SELECTED);
    }

    /// Returns the selected id, if any.
    pub fn selected_id(&self) -> Option<RecordId> {
        selectors::selected_id(&self.selection.read())
    }

    /// Returns the selected todo, if one is selected and present.
    pub fn selected(&self) -> Option<Todo> {
        self.selected_id().and_then(|id| self.store.get(id.as_str()))
    }

    /// Returns the transport used for confirmation.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Creates a todo under a freshly generated id.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, new: NewTodo) -> Result<Todo> {
        metrics::counter!("todo_actions_total", "action" => "add").increment(1);
        let title = new.validated_title()?;
        let id = RecordId::generate();
        let draft = Todo::new(id.clone(), title);

        let confirmed = optimistic::run(
            &self.store,
            id.clone(),
            |_| Some(draft.clone()),
            |applied| async move {
                let request = Request::post(TODOS_PATH).json(&applied)?;
                let todo = self.confirm(request).await?;
                Ok::<_, TodoError>(Some(todo))
            },
        )
        .await?;

        let todo = confirmed.ok_or(TodoError::NotFound(id))?;
        tracing::info!(id = %todo.id, "todo added");
        Ok(todo)
    }

    /// Flips the completed flag of an existing todo.
    #[tracing::instrument(skip(self))]
    pub async fn toggle(&self, id: &str) -> Result<Todo> {
        metrics::counter!("todo_actions_total", "action" => "toggle").increment(1);
        let id = RecordId::new(id);
        let current = self
            .store
            .get(id.as_str())
            .ok_or_else(|| TodoError::NotFound(id.clone()))?;
        let path = todo_path(&id);

        let confirmed = optimistic::run(
            &self.store,
            id.clone(),
            |existing| existing.map(Todo::toggled),
            |applied| async move {
                let completed = applied.map_or(!current.completed, |t| t.completed);
                let request = Request::patch(path).json(&TodoPatch::completed(completed))?;
                let todo = self.confirm(request).await?;
                Ok::<_, TodoError>(Some(todo))
            },
        )
        .await?;

        confirmed.ok_or(TodoError::NotFound(id))
    }

    /// Applies `patch` to the todo under `id`.
    ///
    /// An id with no local record is written from the patch alone when the
    /// patch carries a title; otherwise nothing is written until the server
    /// answers. The server's answer is stored under `id` either way.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, id: &str, patch: TodoPatch) -> Result<Todo> {
        metrics::counter!("todo_actions_total", "action" => "update").increment(1);
        if let Some(title) = &patch.title {
            crate::todo::validate_title(title)?;
        }
        let id = RecordId::new(id);
        let path = todo_path(&id);
        let optimistic_id = id.clone();
        let body = &patch;

        let confirmed = optimistic::run(
            &self.store,
            id.clone(),
            |existing| {
                Some(match existing {
                    Some(todo) => patch.apply_to(todo),
                    None => patch.clone().into_todo(optimistic_id).ok()?,
                })
            },
            |_| async move {
                let request = Request::patch(path).json(body)?;
                let todo = self.confirm(request).await?;
                Ok::<_, TodoError>(Some(todo))
            },
        )
        .await?;

        confirmed.ok_or(TodoError::NotFound(id))
    }

    /// Deletes an existing todo.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<()> {
        metrics::counter!("todo_actions_total", "action" => "remove").increment(1);
        let id = RecordId::new(id);
        if !self.store.read().contains(id.as_str()) {
            return Err(TodoError::NotFound(id));
        }
        let path = todo_path(&id);

        optimistic::run(
            &self.store,
            id.clone(),
            |_| None,
            |_| async move {
                self.transport.send_checked(Request::delete(path)).await?;
                Ok::<_, TodoError>(None)
            },
        )
        .await?;

        if self.selected_id().is_some_and(|selected| selected == id) {
            self.clear_selection();
        }
        Ok(())
    }

    /// Fetches one todo from the server and stores it (non-optimistic).
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, id: &str) -> Result<Todo> {
        let id = RecordId::new(id);
        let todo = self.confirm(Request::get(todo_path(&id))).await?;
        self.store.insert(id, todo.clone());
        Ok(todo)
    }

    /// Drops every local record and the selection. The server is untouched.
    pub fn reset(&self) {
        self.store.replace_all(std::iter::empty::<(RecordId, Todo)>());
        self.clear_selection();
    }

    /// Replaces the local records with the server's list.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<usize> {
        let response = self
            .transport
            .send_checked(Request::get(TODOS_PATH))
            .await?;
        let todos: Vec<Todo> = response.json()?;
        let count = todos.len();

        self.store
            .replace_all(todos.into_iter().map(|todo| (todo.id.clone(), todo)));
        tracing::info!(count, "todos loaded");
        Ok(count)
    }

    async fn confirm(&self, request: Request) -> Result<Todo> {
        let response = self.transport.send_checked(request).await?;
        Ok(response.json()?)
    }
}
