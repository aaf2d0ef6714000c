//! Todo list domain built on the observable record store.
//!
//! This crate provides:
//! - [`Todo`] records with [`NewTodo`] and [`TodoPatch`] inputs
//! - [`selectors`] projecting the record set for subscribers
//! - [`TodoActions`] applying changes optimistically and confirming them
//!   with a server through a [`Transport`](record_store::Transport)

pub mod actions;
pub mod error;
pub mod selectors;
pub mod todo;

pub use actions::{TODOS_PATH, TodoActions};
pub use error::{Result, TodoError};
pub use todo::{Filter, NewTodo, Todo, TodoPatch, TodoStats, validate_title};
