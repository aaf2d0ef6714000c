//! Shared types used across the record store workspace.

pub mod types;

pub use types::{RecordId, Version};
