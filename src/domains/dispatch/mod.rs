//! Dispatch domain module.
//!
//! Routes protocol calls to registered handlers: resolves the selector,
//! validates and coerces arguments, runs the handler under cancellation and
//! a time limit, and reports failures with a stable [`ErrorKind`].
//!
//! ## Architecture
//!
//! - `dispatcher.rs` - Invocation lifecycle and handler execution
//! - `coerce.rs` - Argument validation and type coercion
//! - `error.rs` - Dispatch errors and their kinds

mod coerce;
mod dispatcher;
mod error;

pub use coerce::{ExtraArguments, coerce, validate};
pub use dispatcher::{
    Completion, DispatchOptions, Dispatcher, InvocationRequest, InvocationResult, Selector, Stage,
};
pub use error::{CancelReason, DispatchError, ErrorKind};
