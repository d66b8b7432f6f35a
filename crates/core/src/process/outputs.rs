//! Post-run validation of output files.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What was found on disk for one declared output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputReport {
    pub index: usize,
    /// The declared path, possibly an image sequence pattern.
    pub path: PathBuf,
    /// Files the path resolved to, sorted.
    pub files: Vec<PathBuf>,
    pub size_bytes: u64,
    /// Why the output is unusable, if it is.
    pub problem: Option<OutputProblem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputProblem {
    Missing,
    /// `path` has zero bytes.
    Empty { path: PathBuf },
}

impl OutputReport {
    pub fn is_valid(&self) -> bool {
        self.problem.is_none()
    }

    /// The path to blame when the output is invalid.
    pub fn offending_path(&self) -> &Path {
        match self.problem {
            Some(OutputProblem::Empty { ref path }) => path,
            _ => &self.path,
        }
    }
}

impl std::fmt::Display for OutputProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputProblem::Missing => f.write_str("output was not created"),
            OutputProblem::Empty { .. } => f.write_str("output is empty"),
        }
    }
}

/// Turns `frame_%04d.png` into a pattern matching the files it expands to.
fn sequence_pattern(file_name: &str) -> Option<Regex> {
    let placeholder = Regex::new(r"%(0?)(\d*)d").ok()?;
    if !placeholder.is_match(file_name) {
        return None;
    }

    let mut pattern = String::from("^");
    let mut last = 0;
    for caps in placeholder.captures_iter(file_name) {
        let whole = caps.get(0)?;
        pattern.push_str(&regex_lite::escape(&file_name[last..whole.start()]));
        match caps.get(2).map(|m| m.as_str()).filter(|w| !w.is_empty()) {
            Some(width) => pattern.push_str(&format!(r"\d{{{},}}", width)),
            None => pattern.push_str(r"\d+"),
        }
        last = whole.end();
    }
    pattern.push_str(&regex_lite::escape(&file_name[last..]));
    pattern.push('$');
    Regex::new(&pattern).ok()
}

async fn expand(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(pattern) = sequence_pattern(&file_name) else {
        return Ok(if tokio::fs::try_exists(path).await? {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        });
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if pattern.is_match(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Inspects one declared output.
pub(crate) async fn inspect(index: usize, path: &Path) -> std::io::Result<OutputReport> {
    let files = expand(path).await?;
    let mut size_bytes = 0;
    let mut problem = if files.is_empty() {
        Some(OutputProblem::Missing)
    } else {
        None
    };
    for file in &files {
        let len = tokio::fs::metadata(file).await?.len();
        if len == 0 && problem.is_none() {
            problem = Some(OutputProblem::Empty { path: file.clone() });
        }
        size_bytes += len;
    }

    Ok(OutputReport {
        index,
        path: path.to_path_buf(),
        files,
        size_bytes,
        problem,
    })
}

/// Inspects every declared output in order.
pub(crate) async fn inspect_all(outputs: &[(usize, PathBuf)]) -> std::io::Result<Vec<OutputReport>> {
    let mut reports = Vec::with_capacity(outputs.len());
    for (index, path) in outputs {
        reports.push(inspect(*index, path).await?);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sequence_pattern() {
        let re = sequence_pattern("frame_%04d.png").unwrap();
        assert!(re.is_match("frame_0001.png"));
        assert!(re.is_match("frame_12345.png"));
        assert!(!re.is_match("frame_1.png"));
        assert!(!re.is_match("frame_0001.jpg"));

        let re = sequence_pattern("img%d.jpg").unwrap();
        assert!(re.is_match("img7.jpg"));
        assert!(sequence_pattern("plain.mp4").is_none());
    }

    #[tokio::test]
    async fn test_single_output_states() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.mp4");
        let empty = dir.path().join("empty.mp4");
        std::fs::write(&good, b"data").unwrap();
        std::fs::write(&empty, b"").unwrap();

        let report = inspect(0, &good).await.unwrap();
        assert!(report.is_valid());
        assert_eq!(report.size_bytes, 4);

        let report = inspect(1, &empty).await.unwrap();
        assert_eq!(
            report.problem,
            Some(OutputProblem::Empty {
                path: empty.clone()
            })
        );
        assert_eq!(report.offending_path(), empty.as_path());

        let missing = dir.path().join("missing.mp4");
        let report = inspect(2, &missing).await.unwrap();
        assert_eq!(report.problem, Some(OutputProblem::Missing));
        assert_eq!(report.offending_path(), missing.as_path());
    }

    #[tokio::test]
    async fn test_image_sequence_expansion() {
        let dir = TempDir::new().unwrap();
        for i in 1..=3 {
            std::fs::write(dir.path().join(format!("frame_{:03}.png", i)), b"px").unwrap();
        }
        std::fs::write(dir.path().join("other.png"), b"px").unwrap();

        let report = inspect(0, &dir.path().join("frame_%03d.png")).await.unwrap();
        assert!(report.is_valid());
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.size_bytes, 6);
        assert!(report.files[0].ends_with("frame_001.png"));
    }

    #[tokio::test]
    async fn test_empty_frame_in_sequence_is_named() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f1.png"), b"px").unwrap();
        std::fs::write(dir.path().join("f2.png"), b"").unwrap();

        let report = inspect(0, &dir.path().join("f%d.png")).await.unwrap();
        assert_eq!(
            report.problem,
            Some(OutputProblem::Empty {
                path: dir.path().join("f2.png")
            })
        );
    }
}
