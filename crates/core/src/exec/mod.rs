//! Process runner: launches commands through the host shell and tracks
//! their completion with boundary markers.
//!
//! Each invocation is wrapped in a shell conditional that echoes a
//! completion marker, a failure marker and the exit status into the same
//! stream as the tool's output. Completion and failure are then detected by
//! scanning the output instead of waiting on the child, which is what lets a
//! backgrounded job be polled from its buffer file alone, even by another
//! process (see [`ExecutionHandle::portable_id`]).
//!
//! A job whose shell dies before echoing any marker leaves a marker-free
//! buffer and is never reported as completed; callers polling such a handle
//! need their own timeout.

mod error;
mod handle;
mod markers;
mod portable;
mod runner;
mod shell;

pub use error::ExecError;
pub use handle::{BufferMode, ExecutionHandle};
pub use markers::BoundaryMarkers;
pub use runner::ProcessRunner;
