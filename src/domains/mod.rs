//! Domains module containing business logic organized by bounded contexts.
//!
//! The domains form a pipeline, leaf first:
//!
//! - `discovery` - finds function modules and their marked functions
//! - `descriptors` - turns candidates into protocol metadata
//! - `handlers` - binds candidates to invocable handlers
//! - `registry` - stores bindings as swappable snapshots
//! - `dispatch` - validates arguments and runs handlers

pub mod descriptors;
pub mod discovery;
pub mod dispatch;
pub mod handlers;
pub mod registry;
