//! Boundary to the external probe executor.
//!
//! This crate never sends packets. A [`ProbeExecutor`] answers one
//! `(target, probe)` request with a [`TracerouteResult`]; everything else
//! works on those results.

pub mod command;
pub mod replay;
pub mod runner;
pub mod wire;

pub use command::*;
pub use replay::*;
pub use runner::*;
pub use wire::*;

use std::future::Future;
use thiserror::Error;

use crate::state::{ProbeKey, TracerouteResult};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to start probe executor '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Probe executor exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("Invalid executor response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No recorded result for probe {0}")]
    NotRecorded(ProbeKey),
    #[error("Replay file too large (max 10MB): {0}")]
    TooLarge(String),
}

/// One probe to run against one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub target: String,
    pub key: ProbeKey,
}

impl ProbeRequest {
    pub fn new(target: impl Into<String>, key: ProbeKey) -> Self {
        Self {
            target: target.into(),
            key,
        }
    }
}

/// Something that can run a traceroute for us
pub trait ProbeExecutor: Send + Sync {
    fn trace(
        &self,
        request: &ProbeRequest,
    ) -> impl Future<Output = Result<TracerouteResult, ProbeError>> + Send;
}
