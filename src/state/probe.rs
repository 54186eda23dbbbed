use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::hop::TracerouteResult;

/// Probe transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    Icmp,
    Tcp,
    Udp,
}

impl ProbeMode {
    /// Fixed preference order used when merging the ICMP/TCP/UDP triple
    pub const ALL: [ProbeMode; 3] = [ProbeMode::Icmp, ProbeMode::Tcp, ProbeMode::Udp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Icmp => "icmp",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    /// Display label ("ICMP", "TCP", "UDP")
    pub fn label(&self) -> &'static str {
        match self {
            Self::Icmp => "ICMP",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join key for correlating probe runs.
///
/// Ordered ICMP first, then TCP, then UDP, each by port. The string form
/// (`icmp`, `tcp:443`, `udp:33434`) is what appears in JSON and on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProbeKey {
    Icmp,
    Tcp(u16),
    Udp(u16),
}

impl ProbeKey {
    pub fn mode(&self) -> ProbeMode {
        match self {
            Self::Icmp => ProbeMode::Icmp,
            Self::Tcp(_) => ProbeMode::Tcp,
            Self::Udp(_) => ProbeMode::Udp,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Icmp => None,
            Self::Tcp(port) | Self::Udp(port) => Some(*port),
        }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp(_))
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, Self::Udp(_))
    }

    /// Human label ("ICMP", "TCP/443", "UDP/33434")
    pub fn label(&self) -> String {
        match self {
            Self::Icmp => "ICMP".to_string(),
            Self::Tcp(port) => format!("TCP/{}", port),
            Self::Udp(port) => format!("UDP/{}", port),
        }
    }
}

impl fmt::Display for ProbeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icmp => f.write_str("icmp"),
            Self::Tcp(port) => write!(f, "tcp:{}", port),
            Self::Udp(port) => write!(f, "udp:{}", port),
        }
    }
}

impl FromStr for ProbeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "icmp" {
            return Ok(Self::Icmp);
        }

        let (mode, port) = s
            .split_once(':')
            .ok_or_else(|| format!("Invalid probe key '{}': expected icmp, tcp:<port> or udp:<port>", s))?;
        let port: u16 = port
            .parse()
            .map_err(|_| format!("Invalid port in probe key '{}'", s))?;
        if port == 0 {
            return Err(format!("Port must be non-zero in probe key '{}'", s));
        }

        match mode {
            "tcp" => Ok(Self::Tcp(port)),
            "udp" => Ok(Self::Udp(port)),
            _ => Err(format!("Unknown probe mode '{}' in key '{}'", mode, s)),
        }
    }
}

impl TryFrom<String> for ProbeKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProbeKey> for String {
    fn from(key: ProbeKey) -> Self {
        key.to_string()
    }
}

/// A probe configuration within a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub key: ProbeKey,
    pub label: String,
}

impl ProbeSpec {
    pub fn new(key: ProbeKey, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }

    pub fn mode(&self) -> ProbeMode {
        self.key.mode()
    }

    pub fn port(&self) -> Option<u16> {
        self.key.port()
    }
}

/// Results of several probe runs against one target
pub type ProbeResults = BTreeMap<ProbeKey, TracerouteResult>;
