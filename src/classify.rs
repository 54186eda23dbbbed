//! Per-hop classification.
//!
//! Turns one raw [`Hop`] into flags (responded, private/public, destination),
//! registry ownership and a one-line explanation. Pure: the same hop, target
//! and registry always produce the same classification.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::cidr::{ip_to_int, is_private};
use crate::lookup::{Owner, Ownership, OwnershipRegistry};
use crate::state::Hop;

/// Literal tokens executors use for a missing reply
const NO_RESPONSE_TOKENS: [&str; 3] = ["no response", "---", "*"];

/// First signed decimal number in a latency string ("12.3 ms", "<1ms", "-0.2")
static LATENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("latency pattern is valid"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopFlags {
    pub responded: bool,
    pub no_response: bool,
    pub private_ip: bool,
    pub public_ip: bool,
    pub destination: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopClassification {
    pub flags: HopFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
    pub explanation: String,
}

impl HopClassification {
    /// Ownership that names a registry entry (not `unknown`)
    pub fn known_ownership(&self) -> Option<&Ownership> {
        self.ownership.as_ref().filter(|o| o.owner != Owner::Unknown)
    }
}

fn is_no_response_token(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    NO_RESPONSE_TOKENS.contains(&value.as_str()) || value.contains('*')
}

/// Extract the first numeric value from a latency string, in milliseconds
pub fn parse_latency_ms(text: &str) -> Option<f64> {
    LATENCY_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Classify a hop against the trace target and ownership registry
pub fn classify_hop(hop: &Hop, target: &str, registry: &OwnershipRegistry) -> HopClassification {
    let no_response = is_no_response_token(&hop.ip) || is_no_response_token(&hop.latency_text);

    let ip = hop.ip.trim();
    let valid_ip = ip_to_int(ip).is_some();
    let has_latency = parse_latency_ms(&hop.latency_text).is_some();

    let responded = valid_ip && has_latency && !no_response;
    let private_ip = valid_ip && is_private(ip);
    let public_ip = valid_ip && !private_ip;

    let target = target.trim().to_lowercase();
    let destination = valid_ip
        && !target.is_empty()
        && (ip.to_lowercase() == target || hop.hostname.trim().to_lowercase() == target);

    let ownership = registry.lookup(ip);

    let flags = HopFlags {
        responded,
        no_response,
        private_ip,
        public_ip,
        destination,
    };
    let explanation = explain(&flags, ownership.as_ref());

    HopClassification {
        flags,
        ownership,
        explanation,
    }
}

fn explain(flags: &HopFlags, ownership: Option<&Ownership>) -> String {
    let mut parts: Vec<String> = Vec::new();

    if flags.responded {
        parts.push("Responded to the probe".to_string());
    } else {
        parts.push("No response (probe timed out or reply was filtered)".to_string());
        match ownership.map(|o| o.owner) {
            Some(Owner::CustomerLan) => {
                parts.push("Likely the local router or firewall dropping probe replies".to_string())
            }
            Some(Owner::Core) => {
                parts.push("Core network devices often filter or rate-limit probe replies".to_string())
            }
            _ => {}
        }
    }

    if flags.private_ip {
        parts.push("Private (RFC1918) address".to_string());
    } else if flags.public_ip {
        parts.push("Public address".to_string());
    }

    if flags.destination {
        parts.push("This is the destination".to_string());
    }

    if let Some(o) = ownership.filter(|o| o.owner != Owner::Unknown) {
        match &o.city {
            Some(city) => parts.push(format!("Network: {} ({})", o.label, city)),
            None => parts.push(format!("Network: {}", o.label)),
        }
    }

    format!("{}.", parts.join(". "))
}
