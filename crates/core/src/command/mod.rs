//! Command assembly for ffmpeg invocations.
//!
//! Structured options are mapped through a [`CommandTable`] to command-line
//! flags, merged with caller overrides and rendered into an escaped shell
//! string or an argv list.
//!
//! # Example
//!
//! ```ignore
//! use ffwrap_core::command::{CommandAssembler, CommandTable, OptionValue};
//!
//! let table = CommandTable::default();
//! let mut assembler = CommandAssembler::new(&table);
//! assembler.set("video_codec", "libx264");
//! assembler.set("video_filter", OptionValue::List(vec!["scale=640:-2".into(), "fps=25".into()]));
//! assembler.add_command("-an", None);
//!
//! let line = assembler.assemble()?;
//! assert_eq!(line.to_args(), ["-codec:v", "libx264", "-vf", "scale=640:-2,fps=25", "-an"]);
//! ```

mod assembler;
mod error;
mod escape;
mod invocation;
mod table;

pub use assembler::{CommandArg, CommandAssembler, CommandLine, OptionValue};
pub use error::CommandError;
pub use escape::Platform;
pub use invocation::{Invocation, InvocationBuilder};
pub use table::CommandTable;
