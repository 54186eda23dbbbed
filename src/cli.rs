use clap::Parser;

use crate::policy::ScenarioId;
use crate::state::ProbeKey;

/// Multi-probe path diagnostics: find where a path goes silent and why
#[derive(Parser, Debug, Clone)]
#[command(name = "pathdiag")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host to trace (IPv4 address or hostname)
    pub target: Option<String>,

    /// Single probe to run and analyze (icmp, tcp:PORT, udp:PORT) [default: icmp]
    #[arg(long = "probe")]
    pub probe: Option<ProbeKey>,

    /// Run a policy scenario (sip-blocked, web-allowed, udp-filtered, rtp-range, asymmetric-filtering)
    #[arg(short = 's', long = "scenario")]
    pub scenario: Option<ScenarioId>,

    /// UDP ports probed by the rtp-range scenario
    #[arg(long = "rtp-ports", value_delimiter = ',')]
    pub rtp_ports: Vec<u16>,

    /// Trace with ICMP, TCP and UDP at once and merge the paths
    #[arg(long = "merge")]
    pub merge: bool,

    /// Destination port for the TCP leg of --merge
    #[arg(long = "tcp-port", default_value = "443")]
    pub tcp_port: u16,

    /// Destination port for the UDP leg of --merge
    #[arg(long = "udp-port", default_value = "33434")]
    pub udp_port: u16,

    /// Compare a list of probes side by side (e.g. icmp,tcp:80,tcp:443)
    #[arg(long = "compare", value_delimiter = ',')]
    pub compare: Vec<ProbeKey>,

    /// Answer probes from a recorded JSON file instead of running the executor
    #[arg(long = "replay")]
    pub replay: Option<String>,

    /// External traceroute executor program
    #[arg(long = "executor")]
    pub executor: Option<String>,

    /// Preferences / ownership registry file (TOML)
    #[arg(long = "registry")]
    pub registry: Option<String>,

    /// Output JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Output CSV (hop matrix, or merged view with --merge)
    #[arg(long = "csv")]
    pub csv: bool,

    /// List the built-in scenarios and exit
    #[arg(long = "list-scenarios")]
    pub list_scenarios: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Number of analysis modes selected on the command line
    fn mode_count(&self) -> usize {
        [self.scenario.is_some(), self.merge, !self.compare.is_empty()]
            .iter()
            .filter(|set| **set)
            .count()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.list_scenarios {
            return Ok(());
        }

        if self.mode_count() > 1 {
            return Err("Choose only one of --scenario, --merge or --compare".into());
        }

        if self.probe.is_some() && self.mode_count() > 0 {
            return Err("--probe cannot be combined with --scenario, --merge or --compare".into());
        }

        if self.json && self.csv {
            return Err("Cannot specify both --json and --csv".into());
        }

        if self.target.is_none() && self.replay.is_none() {
            return Err("A target is required (or --replay with a recorded target)".into());
        }

        if self.tcp_port == 0 || self.udp_port == 0 {
            return Err("Ports must be between 1 and 65535".into());
        }

        if self.rtp_ports.contains(&0) {
            return Err("RTP ports must be between 1 and 65535".into());
        }

        if self.csv && self.scenario.is_none() && !self.merge && self.compare.is_empty() {
            return Err("--csv requires --scenario, --merge or --compare".into());
        }

        if let Some(ref exec) = self.executor
            && exec.trim().is_empty()
        {
            return Err("Executor program cannot be empty".into());
        }

        Ok(())
    }
}
