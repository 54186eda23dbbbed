//! Policy findings
//!
//! Turns per-probe summaries into confidence-scored findings. Rules run in a
//! fixed order and several may fire together:
//!
//! 1. TCP/443 reaches the destination but TCP/5060 does not (SIP blocked)
//! 2. ICMP fails while some TCP probe succeeds (ICMP policy)
//! 3. Some UDP probe fails while some TCP probe succeeds (UDP filtered)
//! 4. Two or more probes first go silent at the same hop
//! 5. Two or more probes only ever hear back from hop 1
//!
//! When nothing fires, a single "all clear" finding is returned.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::analysis::{ProbeSummary, summarize_result};
use crate::lookup::OwnershipRegistry;
use crate::state::{ProbeKey, ProbeResults};

/// Per-probe summary as used by the policy engine
pub type PolicyProbeSummary = ProbeSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Good,
    Warn,
    Bad,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "good",
            Self::Warn => "warn",
            Self::Bad => "bad",
        })
    }
}

/// Ranked low < medium < high
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFinding {
    pub title: String,
    pub detail: String,
    pub severity: Severity,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyFindingsResult {
    pub findings: Vec<PolicyFinding>,
    pub confidence: Confidence,
    pub suggested_next_steps: Vec<String>,
}

/// Summarize every probe in a result set
pub fn summarize_results(
    results: &ProbeResults,
    registry: &OwnershipRegistry,
) -> BTreeMap<ProbeKey, PolicyProbeSummary> {
    results
        .iter()
        .map(|(key, result)| (*key, summarize_result(result, registry)))
        .collect()
}

/// Accumulates findings and de-duplicated next steps
#[derive(Default)]
struct FindingsBuilder {
    findings: Vec<PolicyFinding>,
    steps: Vec<String>,
}

impl FindingsBuilder {
    fn push(
        &mut self,
        title: impl Into<String>,
        detail: impl Into<String>,
        severity: Severity,
        confidence: Confidence,
        steps: &[String],
    ) {
        self.findings.push(PolicyFinding {
            title: title.into(),
            detail: detail.into(),
            severity,
            confidence,
        });
        for step in steps {
            if !self.steps.contains(step) {
                self.steps.push(step.clone());
            }
        }
    }

    fn finish(self) -> PolicyFindingsResult {
        let confidence = self
            .findings
            .iter()
            .map(|f| f.confidence)
            .max()
            .unwrap_or(Confidence::Low);
        PolicyFindingsResult {
            findings: self.findings,
            confidence,
            suggested_next_steps: self.steps,
        }
    }
}

/// Derive policy findings from per-probe summaries.
///
/// Probes that failed outright (summary carries an `error`) are left out; they
/// say nothing about the path.
pub fn derive_findings(summaries: &BTreeMap<ProbeKey, PolicyProbeSummary>) -> PolicyFindingsResult {
    let summaries: BTreeMap<ProbeKey, &PolicyProbeSummary> = summaries
        .iter()
        .filter(|(_, s)| s.error.is_none())
        .map(|(key, s)| (*key, s))
        .collect();

    let reached = |key: ProbeKey| summaries.get(&key).map(|s| s.reached_destination);
    let tcp_reached: Vec<String> = summaries
        .iter()
        .filter(|(key, s)| key.is_tcp() && s.reached_destination)
        .map(|(key, _)| key.label())
        .collect();

    let mut out = FindingsBuilder::default();

    if reached(ProbeKey::Tcp(443)) == Some(true) && reached(ProbeKey::Tcp(5060)) == Some(false) {
        out.push(
            "SIP port likely blocked upstream",
            "TCP/443 reaches the destination but TCP/5060 does not. A firewall rule or SIP ALG \
             between the client and the provider is likely interfering with SIP signaling.",
            Severity::Bad,
            Confidence::Medium,
            &[
                "Allow outbound TCP/5060 to the SIP provider on the edge firewall".to_string(),
                "Disable SIP ALG on the edge router/firewall".to_string(),
            ],
        );
    }

    if reached(ProbeKey::Icmp) == Some(false) && !tcp_reached.is_empty() {
        out.push(
            "ICMP likely blocked (policy)",
            format!(
                "ICMP did not reach the destination while {} did. Routing works; ICMP is being \
                 filtered by policy somewhere on the path.",
                tcp_reached.join(", ")
            ),
            Severity::Warn,
            Confidence::Medium,
            &["Document ICMP filtering so it is not mistaken for an outage".to_string()],
        );
    }

    let udp_failed: Vec<String> = summaries
        .iter()
        .filter(|(key, s)| key.is_udp() && !s.reached_destination)
        .map(|(key, _)| key.label())
        .collect();
    if !udp_failed.is_empty() && !tcp_reached.is_empty() {
        out.push(
            "UDP probes likely filtered",
            format!(
                "{} did not reach the destination while {} did. UDP traffic (voice/video media) \
                 may be dropped or rate-limited.",
                udp_failed.join(", "),
                tcp_reached.join(", ")
            ),
            Severity::Warn,
            Confidence::Medium,
            &[
                "Validate UDP reachability with STUN/ICE or a UDP pinger".to_string(),
                "Review NAT/firewall UDP session timeouts".to_string(),
            ],
        );
    }

    if let Some((hop, count)) = consistent_silent_hop(summaries.values().copied()) {
        out.push(
            format!("Filtering likely begins at/after hop {}", hop),
            format!("{} probes went silent first at hop {}.", count, hop),
            Severity::Warn,
            Confidence::Medium,
            &[format!(
                "Share hop {} evidence (address, latency, probe results) with the network team",
                hop
            )],
        );
    }

    let edge_only = summaries
        .values()
        .filter(|s| s.responded_count == 1 && s.last_responding_hop == Some(1))
        .count();
    if edge_only >= 2 {
        out.push(
            "Edge firewall may drop TTL-expired replies",
            format!(
                "{} probes only heard back from hop 1. The edge device may be dropping TTL-expired \
                 replies from upstream routers.",
                edge_only
            ),
            Severity::Warn,
            Confidence::Low,
            &["Check edge ACLs for rules dropping ICMP TTL-expired replies".to_string()],
        );
    }

    if out.findings.is_empty() {
        out.push(
            "No strong policy blocks detected",
            "The probe pattern does not point to port- or protocol-specific filtering.",
            Severity::Good,
            Confidence::Low,
            &["Run endpoint tests from the same source host".to_string()],
        );
    }

    out.finish()
}

/// Hop where the most probes first went silent, if at least two agree.
///
/// Hops are tallied in the order the summaries arrive (probe key order); on
/// equal counts the hop seen first wins.
fn consistent_silent_hop<'a>(
    summaries: impl Iterator<Item = &'a PolicyProbeSummary>,
) -> Option<(u32, usize)> {
    let mut tally: Vec<(u32, usize)> = Vec::new();
    for hop in summaries.filter_map(|s| s.first_silent_hop) {
        match tally.iter_mut().find(|(seen, _)| *seen == hop) {
            Some((_, count)) => *count += 1,
            None => tally.push((hop, 1)),
        }
    }

    let mut best: Option<(u32, usize)> = None;
    for (hop, count) in tally {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((hop, count));
        }
    }
    best.filter(|(_, count)| *count >= 2)
}
