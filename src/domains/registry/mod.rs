//! Registry domain module.
//!
//! Holds the bindings of every registered tool and resource and publishes
//! them as immutable snapshots.
//!
//! ## Architecture
//!
//! - `snapshot.rs` - Registry snapshot, builder and duplicate policy
//! - `store.rs` - Atomically swappable snapshot holder
//! - `error.rs` - Registration errors

mod error;
mod snapshot;
mod store;

pub use error::RegistrationError;
pub use snapshot::{
    Binding, DuplicatePolicy, HandlerBinding, Registered, Registry, RegistryBuilder,
    ResourceBinding, ToolBinding,
};
pub use store::RegistryStore;
