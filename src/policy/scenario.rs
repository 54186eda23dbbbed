use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PolicyError;
use crate::state::{ProbeKey, ProbeSpec};

/// RTP ports probed by `rtp-range` when the caller supplies none
pub const DEFAULT_RTP_PORTS: [u16; 3] = [10000, 12000, 20000];

/// Named diagnostic scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioId {
    SipBlocked,
    WebAllowed,
    UdpFiltered,
    RtpRange,
    AsymmetricFiltering,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 5] = [
        ScenarioId::SipBlocked,
        ScenarioId::WebAllowed,
        ScenarioId::UdpFiltered,
        ScenarioId::RtpRange,
        ScenarioId::AsymmetricFiltering,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SipBlocked => "sip-blocked",
            Self::WebAllowed => "web-allowed",
            Self::UdpFiltered => "udp-filtered",
            Self::RtpRange => "rtp-range",
            Self::AsymmetricFiltering => "asymmetric-filtering",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioId {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PolicyError::UnknownScenario(s.to_string()))
    }
}

/// A fixed set of probes run together, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub id: ScenarioId,
    pub title: String,
    pub description: String,
    pub probes: Vec<ProbeSpec>,
}

fn icmp() -> ProbeSpec {
    ProbeSpec::new(ProbeKey::Icmp, "ICMP")
}

fn tcp(port: u16, service: &str) -> ProbeSpec {
    ProbeSpec::new(ProbeKey::Tcp(port), format!("TCP {} ({})", port, service))
}

fn udp(port: u16, service: &str) -> ProbeSpec {
    ProbeSpec::new(ProbeKey::Udp(port), format!("UDP {} ({})", port, service))
}

/// Build a scenario definition.
///
/// `rtp_ports` only affects `rtp-range`; an empty list falls back to
/// [`DEFAULT_RTP_PORTS`]. Duplicate and zero ports are dropped, order is kept.
pub fn scenario(id: ScenarioId, rtp_ports: &[u16]) -> ScenarioDefinition {
    let (title, description, probes) = match id {
        ScenarioId::SipBlocked => (
            "SIP blocked?",
            "Compares SIP signaling (TCP/5060) against HTTPS to spot SIP-specific filtering.",
            vec![tcp(5060, "SIP"), tcp(443, "HTTPS"), icmp()],
        ),
        ScenarioId::WebAllowed => (
            "Web allowed?",
            "Checks whether plain HTTP and HTTPS both get through.",
            vec![tcp(80, "HTTP"), tcp(443, "HTTPS"), icmp()],
        ),
        ScenarioId::UdpFiltered => (
            "UDP filtered?",
            "Compares classic UDP traceroute against a TCP/443 baseline.",
            vec![udp(33434, "traceroute"), tcp(443, "HTTPS"), icmp()],
        ),
        ScenarioId::RtpRange => {
            let mut ports: Vec<u16> = Vec::new();
            for port in rtp_ports.iter().copied().filter(|p| *p != 0) {
                if !ports.contains(&port) {
                    ports.push(port);
                }
            }
            if ports.is_empty() {
                ports = DEFAULT_RTP_PORTS.to_vec();
            }

            let mut probes: Vec<ProbeSpec> = ports.into_iter().map(|p| udp(p, "RTP")).collect();
            probes.push(tcp(443, "HTTPS"));
            (
                "RTP range reachable?",
                "Probes sample UDP ports from the RTP media range with a TCP/443 baseline.",
                probes,
            )
        }
        ScenarioId::AsymmetricFiltering => (
            "Asymmetric filtering?",
            "Runs ICMP, TCP and UDP side by side to see which protocols are treated differently.",
            vec![icmp(), tcp(443, "HTTPS"), udp(33434, "traceroute")],
        ),
    };

    ScenarioDefinition {
        id,
        title: title.to_string(),
        description: description.to_string(),
        probes,
    }
}

/// Every scenario, in catalog order
pub fn catalog(rtp_ports: &[u16]) -> Vec<ScenarioDefinition> {
    ScenarioId::ALL
        .into_iter()
        .map(|id| scenario(id, rtp_ports))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(def: &ScenarioDefinition) -> Vec<ProbeKey> {
        def.probes.iter().map(|p| p.key).collect()
    }

    #[test]
    fn test_fixed_scenarios() {
        assert_eq!(
            keys(&scenario(ScenarioId::SipBlocked, &[])),
            vec![ProbeKey::Tcp(5060), ProbeKey::Tcp(443), ProbeKey::Icmp]
        );
        assert_eq!(
            keys(&scenario(ScenarioId::WebAllowed, &[])),
            vec![ProbeKey::Tcp(80), ProbeKey::Tcp(443), ProbeKey::Icmp]
        );
        assert_eq!(
            keys(&scenario(ScenarioId::UdpFiltered, &[])),
            vec![ProbeKey::Udp(33434), ProbeKey::Tcp(443), ProbeKey::Icmp]
        );
        assert_eq!(
            keys(&scenario(ScenarioId::AsymmetricFiltering, &[])),
            vec![ProbeKey::Icmp, ProbeKey::Tcp(443), ProbeKey::Udp(33434)]
        );
    }

    #[test]
    fn test_rtp_range_ports() {
        assert_eq!(
            keys(&scenario(ScenarioId::RtpRange, &[])),
            vec![
                ProbeKey::Udp(10000),
                ProbeKey::Udp(12000),
                ProbeKey::Udp(20000),
                ProbeKey::Tcp(443),
            ]
        );
        assert_eq!(
            keys(&scenario(ScenarioId::RtpRange, &[16384, 0, 16384, 32767])),
            vec![ProbeKey::Udp(16384), ProbeKey::Udp(32767), ProbeKey::Tcp(443)]
        );
    }

    #[test]
    fn test_scenario_id_parse() {
        assert_eq!("sip-blocked".parse::<ScenarioId>().unwrap(), ScenarioId::SipBlocked);
        assert_eq!("RTP-Range".parse::<ScenarioId>().unwrap(), ScenarioId::RtpRange);
        assert!(matches!(
            "voip".parse::<ScenarioId>(),
            Err(PolicyError::UnknownScenario(s)) if s == "voip"
        ));
    }

    #[test]
    fn test_catalog_order_and_labels() {
        let all = catalog(&[]);
        let ids: Vec<&str> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["sip-blocked", "web-allowed", "udp-filtered", "rtp-range", "asymmetric-filtering"]
        );
        assert_eq!(all[0].probes[0].label, "TCP 5060 (SIP)");
        assert_eq!(all[0].probes[0].port(), Some(5060));
    }
}
