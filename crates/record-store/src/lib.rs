//! Observable in-memory record store.
//!
//! This crate provides:
//! - [`Store`] holding a versioned [`RecordSet`] with read, update and
//!   subscribe operations
//! - [`optimistic`] updates that write a tentative value and roll it back
//!   when the confirming system rejects it
//! - the [`Transport`] used to reach the confirming system, with in-memory
//!   and HTTP implementations
//! - [`observer`] subscriptions for logging and metrics

pub mod error;
pub mod observer;
pub mod optimistic;
pub mod record_set;
pub mod store;
pub mod subscription;
pub mod transport;

pub use common::{RecordId, Version};
pub use error::{Result, TransportError};
pub use optimistic::PendingOperation;
pub use record_set::RecordSet;
pub use store::Store;
pub use subscription::ReleaseHandle;
pub use transport::{
    HttpTransport, InMemoryTransport, Method, Request, Response, Transport, TransportConfig,
    TransportExt,
};
