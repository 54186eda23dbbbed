use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::wire::WireResult;
use super::{ProbeError, ProbeExecutor, ProbeRequest};
use crate::state::{ProbeKey, ProbeResults, TracerouteResult};

const MAX_REPLAY_SIZE: u64 = 10 * 1024 * 1024; // 10MB

#[derive(Debug, Deserialize)]
struct ReplayFile {
    target: String,
    #[serde(default)]
    results: BTreeMap<ProbeKey, WireResult>,
}

/// Answers probe requests from previously recorded executor output.
///
/// File layout: `{"target": "...", "results": {"icmp": {...}, "tcp:443": {...}}}`
/// where each result uses the executor wire format.
#[derive(Debug, Clone, Default)]
pub struct ReplayExecutor {
    target: String,
    results: ProbeResults,
}

impl ReplayExecutor {
    pub fn new(target: impl Into<String>, results: ProbeResults) -> Self {
        Self {
            target: target.into(),
            results,
        }
    }

    /// Parse a replay document from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ProbeError> {
        let file: ReplayFile = serde_json::from_reader(reader)?;
        let results = file
            .results
            .into_iter()
            .map(|(key, wire)| (key, wire.into_result(&file.target)))
            .collect();
        Ok(Self::new(file.target, results))
    }

    /// Load a replay file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProbeError> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // Check file size to avoid reading huge files into memory
        if file.metadata()?.len() > MAX_REPLAY_SIZE {
            return Err(ProbeError::TooLarge(path.display().to_string()));
        }

        Self::from_reader(BufReader::new(file))
    }

    /// Target the recording was made against
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn results(&self) -> &ProbeResults {
        &self.results
    }
}

impl ProbeExecutor for ReplayExecutor {
    async fn trace(&self, request: &ProbeRequest) -> Result<TracerouteResult, ProbeError> {
        self.results
            .get(&request.key)
            .cloned()
            .ok_or(ProbeError::NotRecorded(request.key))
    }
}
