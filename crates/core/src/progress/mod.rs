//! Progress observers: turn a running job's output into [`ProgressRecord`]s.
//!
//! Two strategies share one contract ([`ProgressHandler`]):
//! [`StderrProgress`] parses ffmpeg's status lines, [`NativeProgress`] reads
//! the `-progress` sidecar file. [`HandlerRegistry`] maps the configured
//! strategy to one of them.

mod native;
mod registry;
mod stderr;
pub(crate) mod tracker;
mod traits;
mod types;

pub use native::NativeProgress;
pub use registry::{HandlerContext, HandlerFactory, HandlerRegistry};
pub use stderr::StderrProgress;
pub use traits::{ProgressHandler, ProgressSource};
pub use types::{ProgressRecord, ProgressStatus};
