//! Shell scripts that wrap the real command with boundary markers.

use std::path::Path;

use super::markers::BoundaryMarkers;
use crate::command::Platform;

/// Where the wrapped expression writes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Sink<'a> {
    /// Redirect stdout and stderr into a file.
    File(&'a Path),
    /// Leave stdout on the shell's own pipe.
    Capture,
}

/// Wraps `command` so it reports its own completion, failure and exit code.
///
/// POSIX form:
/// `((cmd) && echo C) || (__rc=$?; echo F; echo C; echo E$__rc)`
///
/// The Windows form reads `!errorlevel!`, which needs `cmd /V:ON`; a literal
/// `!` in the command is consumed by delayed expansion there.
///
/// With `quiet`, the command's own output goes to the null device and only
/// the markers reach the sink.
pub(crate) fn wrap(
    platform: Platform,
    command: &str,
    markers: &BoundaryMarkers,
    quiet: bool,
) -> String {
    let null = platform.null_device();
    let inner = if quiet {
        format!("{} < {} > {} 2>&1", command, null, null)
    } else {
        format!("{} < {}", command, null)
    };

    match platform {
        Platform::Posix => format!(
            "(({}) && echo {}) || (__rc=$?; echo {}; echo {}; echo {}$__rc)",
            inner,
            platform.escape(&markers.completion()),
            platform.escape(&markers.failure()),
            platform.escape(&markers.completion()),
            platform.escape(&markers.error_code()),
        ),
        Platform::Windows => format!(
            "({} && echo {}) || (echo {} & echo {} & echo {}!errorlevel!)",
            inner,
            cmd_echo(&markers.completion()),
            cmd_echo(&markers.failure()),
            cmd_echo(&markers.completion()),
            cmd_echo(&markers.error_code()),
        ),
    }
}

/// Adds output redirection and, for non-blocking runs, backgrounding.
pub(crate) fn script(platform: Platform, wrapped: &str, sink: Sink<'_>, background: bool) -> String {
    let redirect = match sink {
        Sink::File(path) => format!(
            " > {} 2>&1",
            platform.escape(&path.to_string_lossy())
        ),
        Sink::Capture => " 2>&1".to_string(),
    };

    match (platform, background) {
        (Platform::Posix, false) => format!("({}){}", wrapped, redirect),
        (Platform::Posix, true) => format!("({}){} &", wrapped, redirect),
        (Platform::Windows, false) => format!("{}{}", wrapped, redirect),
        (Platform::Windows, true) => {
            format!("start \"\" /B cmd /V:ON /C \"{}{}\"", wrapped, redirect)
        }
    }
}

/// `cmd` treats `<` and `>` as redirections unless caret-escaped.
fn cmd_echo(marker: &str) -> String {
    marker.replace('<', "^<").replace('>', "^>")
}
