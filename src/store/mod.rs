//! Template store
//!
//! Durable key-addressed object storage for seed templates and the per-execution
//! artifact trail. Components never touch a backend directly; they receive a
//! [`ScopedStore`] restricted to their access contract.

pub mod access;
pub mod artifacts;
pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod keys;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests;

pub use access::{CapabilityAccess, ScopedStore};
pub use artifacts::{put_json, write_json_once, write_once, WriteOnce};
pub use backends::{FileStore, MemoryStore};
pub use config::{BackendType, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use factory::StoreFactory;
pub use traits::ObjectStore;
pub use types::{ObjectMeta, PutOutcome, StoreHealth, StoredObject};
