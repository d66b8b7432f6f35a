//! Testing utilities: a scripted progress source and fake ffmpeg binaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use ffwrap_core::testing::{write_fake_ffmpeg, FAKE_FFMPEG_OK};
//!
//! let ffmpeg = write_fake_ffmpeg(dir.path(), FAKE_FFMPEG_OK)?;
//! let mut process = FfmpegProcess::new(runner, &ffmpeg);
//! ```

mod fake_ffmpeg;
mod mock_source;

pub use fake_ffmpeg::{
    FAKE_FFMPEG_EMPTY_OUTPUT, FAKE_FFMPEG_FAIL, FAKE_FFMPEG_INTERRUPTED, FAKE_FFMPEG_OK,
    FAKE_FFMPEG_SLOW,
};
#[cfg(unix)]
pub use fake_ffmpeg::write_fake_ffmpeg;
pub use mock_source::MockSource;
