use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::policy::{DEFAULT_RTP_PORTS, ScenarioId};
use crate::prefs::Prefs;
use crate::probe::{DEFAULT_TCP_PORT, DEFAULT_UDP_PORT, ScenarioOptions};
use crate::state::ProbeKey;

/// What the run should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    ListScenarios,
    /// One probe, analyzed on its own
    Single(ProbeKey),
    Scenario(ScenarioId),
    /// ICMP/TCP/UDP traced together and merged
    Merge,
    Compare(Vec<ProbeKey>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// Runtime configuration derived from CLI args
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub mode: RunMode,
    pub output: OutputFormat,
    /// Port for the TCP leg of the merged triple
    pub tcp_port: u16,
    /// Port for the UDP leg of the merged triple
    pub udp_port: u16,
    /// UDP ports for the `rtp-range` scenario
    pub rtp_ports: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: RunMode::Single(ProbeKey::Icmp),
            output: OutputFormat::Text,
            tcp_port: DEFAULT_TCP_PORT,
            udp_port: DEFAULT_UDP_PORT,
            rtp_ports: DEFAULT_RTP_PORTS.to_vec(),
        }
    }
}

impl Config {
    /// Fill in values the command line left unset from saved preferences
    pub fn with_prefs(mut self, args: &Args, prefs: &Prefs) -> Self {
        if args.rtp_ports.is_empty()
            && let Some(ref ports) = prefs.rtp_ports
            && !ports.is_empty()
        {
            self.rtp_ports = ports.clone();
        }
        self
    }

    pub fn scenario_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            rtp_ports: self.rtp_ports.clone(),
        }
    }
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        let mode = if args.list_scenarios {
            RunMode::ListScenarios
        } else if let Some(id) = args.scenario {
            RunMode::Scenario(id)
        } else if args.merge {
            RunMode::Merge
        } else if !args.compare.is_empty() {
            RunMode::Compare(args.compare.clone())
        } else {
            RunMode::Single(args.probe.unwrap_or(ProbeKey::Icmp))
        };

        let output = if args.json {
            OutputFormat::Json
        } else if args.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Text
        };

        let rtp_ports = if args.rtp_ports.is_empty() {
            DEFAULT_RTP_PORTS.to_vec()
        } else {
            args.rtp_ports.clone()
        };

        Self {
            mode,
            output,
            tcp_port: args.tcp_port,
            udp_port: args.udp_port,
            rtp_ports,
        }
    }
}
