//! Boundary markers injected into the shell command.
//!
//! The wrapped command echoes these markers after the real command exits so
//! completion, failure and the exit status can be recovered by scanning the
//! output, without holding on to the child process.

use regex_lite::Regex;
use uuid::Uuid;

/// The three per-invocation markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryMarkers {
    id: String,
}

impl BoundaryMarkers {
    /// Generates markers from a random id and a hash of the buffer identity.
    pub fn generate(identity: &str) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        let digest = format!("{:x}", md5::compute(format!("{}:{}", identity, random)));
        Self {
            id: format!("{}{}", &random[..16], &digest[..16]),
        }
    }

    /// Rebuilds markers from a known id.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Echoed once the command has finished, successfully or not.
    pub fn completion(&self) -> String {
        format!("<c-{}>", self.id)
    }

    /// Echoed when the command exited non-zero.
    pub fn failure(&self) -> String {
        format!("<f-{}>", self.id)
    }

    /// Echoed immediately before the exit status.
    pub fn error_code(&self) -> String {
        format!("<e-{}>", self.id)
    }

    pub fn is_completed(&self, raw: &str) -> bool {
        raw.contains(&self.completion())
    }

    pub fn has_error(&self, raw: &str) -> bool {
        raw.contains(&self.failure())
    }

    /// The exit status following the error code marker.
    pub fn exit_code(&self, raw: &str) -> Option<i32> {
        let marker = self.error_code();
        let start = raw.find(&marker)? + marker.len();
        let digits: String = raw[start..]
            .chars()
            .enumerate()
            .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
            .map(|(_, c)| c)
            .collect();
        digits.parse().ok()
    }

    /// Removes every marker (and the exit status) from the buffer.
    pub fn strip(&self, raw: &str) -> String {
        let pattern = format!(
            r"(?:{}|{}|{}-?[0-9]*)\r?\n?",
            regex_lite::escape(&self.completion()),
            regex_lite::escape(&self.failure()),
            regex_lite::escape(&self.error_code()),
        );
        match Regex::new(&pattern) {
            Ok(re) => re.replace_all(raw, "").into_owned(),
            Err(_) => raw
                .replace(&self.completion(), "")
                .replace(&self.failure(), "")
                .replace(&self.error_code(), ""),
        }
    }
}
