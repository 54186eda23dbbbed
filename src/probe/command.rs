use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use super::wire::decode_result;
use super::{ProbeError, ProbeExecutor, ProbeRequest};
use crate::state::TracerouteResult;

/// Runs an external traceroute backend once per probe.
///
/// The program is invoked as
/// `<program> [args..] --target <target> --mode <icmp|tcp|udp> [--port <port>]`
/// and must print one JSON result (see [`super::wire`]) on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExecutor {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Full argument list for a request
    pub fn command_args(&self, request: &ProbeRequest) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--target".to_string());
        args.push(request.target.clone());
        args.push("--mode".to_string());
        args.push(request.key.mode().to_string());
        if let Some(port) = request.key.port() {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        args
    }
}

impl ProbeExecutor for CommandExecutor {
    async fn trace(&self, request: &ProbeRequest) -> Result<TracerouteResult, ProbeError> {
        let args = self.command_args(request);
        tracing::debug!(program = %self.program, ?args, "running probe executor");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProbeError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        decode_result(&String::from_utf8_lossy(&output.stdout), &request.target)
    }
}
