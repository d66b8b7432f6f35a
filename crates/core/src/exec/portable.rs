//! Portable progress ids.
//!
//! A portable id carries everything another process needs to resume polling
//! a background job: the buffer file, the marker id and the start time.
//! It also lists the temp files, so the resuming process can delete them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::ExecError;

const PREFIX: &str = "ffwrap1.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PortableState {
    pub id: String,
    pub buffer: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_file: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    #[serde(default)]
    pub outputs: Vec<(usize, PathBuf)>,
    /// Files removed by an explicit delete of the output.
    #[serde(default)]
    pub temp_files: Vec<PathBuf>,
}

impl PortableState {
    pub fn encode(&self) -> Result<String, ExecError> {
        let json = serde_json::to_string(self)
            .map_err(|e| ExecError::invalid_portable_id(e.to_string()))?;
        Ok(format!("{}{}", PREFIX, urlencoding::encode(&json)))
    }

    pub fn decode(portable_id: &str) -> Result<Self, ExecError> {
        let encoded = portable_id
            .strip_prefix(PREFIX)
            .ok_or_else(|| ExecError::invalid_portable_id("unknown prefix"))?;
        let json = urlencoding::decode(encoded)
            .map_err(|e| ExecError::invalid_portable_id(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| ExecError::invalid_portable_id(e.to_string()))
    }
}
