//! Decoding "received signal N" terminations from ffmpeg output.

use regex_lite::Regex;

/// How many trailing lines are inspected.
const TAIL_LINES: usize = 5;

/// Why a process stopped on a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A signal with a known explanation.
    Known { signal: i32, reason: &'static str },
    Unknown { signal: i32 },
}

impl Termination {
    pub fn signal(&self) -> i32 {
        match self {
            Termination::Known { signal, .. } | Termination::Unknown { signal } => *signal,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Termination::Known { reason, .. } => reason.to_string(),
            Termination::Unknown { signal } => {
                format!("Process was terminated by unknown signal {}", signal)
            }
        }
    }
}

fn reason_for(signal: i32) -> Option<&'static str> {
    match signal {
        1 => Some("Process was stopped because its controlling terminal hung up (SIGHUP)"),
        2 => Some("Process was interrupted by the user (SIGINT)"),
        3 => Some("Process was told to quit (SIGQUIT)"),
        9 => Some("Process was killed (SIGKILL)"),
        15 => Some("Process was asked to terminate (SIGTERM)"),
        _ => None,
    }
}

/// Looks for a signal report in the last lines of `buffer`.
pub fn classify(buffer: &str) -> Option<Termination> {
    let re = Regex::new(r"(?i)received signal (\d+)").ok()?;
    let lines: Vec<&str> = buffer
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines.iter().rev().take(TAIL_LINES).find_map(|line| {
        let signal: i32 = re.captures(line)?.get(1)?.as_str().parse().ok()?;
        Some(match reason_for(signal) {
            Some(reason) => Termination::Known { signal, reason },
            None => Termination::Unknown { signal },
        })
    })
}
