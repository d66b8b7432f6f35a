//! Shell quoting per host platform.

const POSIX_SHELL_FLAGS: &[&str] = &["-c"];
const WINDOWS_SHELL_FLAGS: &[&str] = &["/V:ON", "/C"];

/// Host shell dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// `sh -c`, single quote escaping, `&` backgrounding.
    Posix,
    /// `cmd /V:ON /C`, double quote escaping, `start /B` backgrounding.
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Quotes a single argument so the shell passes it through verbatim.
    pub fn escape(&self, arg: &str) -> String {
        match self {
            Self::Posix => {
                if !arg.is_empty() && arg.chars().all(is_posix_safe) {
                    arg.to_string()
                } else {
                    format!("'{}'", arg.replace('\'', r"'\''"))
                }
            }
            Self::Windows => {
                if !arg.is_empty() && arg.chars().all(is_windows_safe) {
                    arg.to_string()
                } else {
                    format!("\"{}\"", arg.replace('"', "\"\""))
                }
            }
        }
    }

    /// The shell binary and the flags that make it run a script argument.
    ///
    /// `cmd` runs with delayed expansion so `!errorlevel!` is read when the
    /// failure branch executes, not when the line is parsed.
    pub fn shell(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Posix => ("sh", POSIX_SHELL_FLAGS),
            Self::Windows => ("cmd", WINDOWS_SHELL_FLAGS),
        }
    }

    /// The null device.
    pub fn null_device(&self) -> &'static str {
        match self {
            Self::Posix => "/dev/null",
            Self::Windows => "NUL",
        }
    }
}

fn is_posix_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-.,/:=@%+".contains(c)
}

fn is_windows_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-.,/:=@+\\".contains(c)
}
