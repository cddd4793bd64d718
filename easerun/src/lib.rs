//! Track the lifecycle of a single async operation.
//!
//! [`AsyncRunner`] wraps an async function and publishes an [`ExecutionState`]
//! that moves `Initial → Working → Done | Failed` on every trigger.
//! [`AbortableAsyncRunner`] additionally hands the function an
//! [`AbortLifecycle`] and can fire its signal with `abort()`.

mod abort;
mod abort_error;
mod abortable_runner;
mod callbacks;
mod execution_state;
mod runner;
mod status;
mod stream_ext;

pub use abort::*;
pub use abort_error::*;
pub use abortable_runner::*;
pub use callbacks::{CallContext, Callback};
pub use execution_state::*;
pub use runner::*;
pub use status::*;
pub use stream_ext::*;
