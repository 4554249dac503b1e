//! Intake Store - Persistence Ports and Adapters
//!
//! - [`Datastore`]: the remote relational store (memory and PostgREST
//!   adapters)
//! - [`KvStore`]: durable local key/value storage (memory and sled adapters)
//! - [`IdentityProvider`]: who is signed in
//!
//! Errors from every adapter are classified into [`StoreError`] so the
//! executor can tell authorization denials from transient failures.

pub mod datastore;
pub mod entities;
pub mod error;
pub mod identity;
pub mod kv;

pub use datastore::{Datastore, InjectedFailure, MemoryDatastore, RestConfig, RestDatastore};
pub use entities::*;
pub use error::{is_authorization_message, StoreError, StoreResult};
pub use identity::{IdentityProvider, SessionIdentity};
pub use kv::{get_json, put_json, KvStore, MemoryKvStore, SledKvStore};
