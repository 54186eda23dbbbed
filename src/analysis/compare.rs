//! Side-by-side comparison of an open-ended set of probes
//!
//! Produces a per-probe summary, a hop matrix aligning every probe by hop
//! number, and pairwise insights that only fire when both named probes are
//! present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::insight::Insight;
use super::trace::summarize_hops;
use crate::lookup::OwnershipRegistry;
use crate::state::{Hop, ProbeKey, ProbeResults, TracerouteResult};

/// Aggregate view of one probe run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSummary {
    pub reached_destination: bool,
    pub last_responding_hop: Option<u32>,
    pub first_silent_hop: Option<u32>,
    pub responded_count: usize,
    pub total_hops: usize,
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of the alignment table; `None` where a probe has no record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopMatrixRow {
    pub hop_number: u32,
    pub cells: BTreeMap<ProbeKey, Option<Hop>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeComparison {
    pub per_probe_summary: BTreeMap<ProbeKey, ProbeSummary>,
    pub insights: Vec<Insight>,
    pub hop_matrix: Vec<HopMatrixRow>,
}

/// Summarize one probe run against its own target
pub fn summarize_result(result: &TracerouteResult, registry: &OwnershipRegistry) -> ProbeSummary {
    let trace = summarize_hops(&result.hops, &result.target, registry);
    ProbeSummary {
        reached_destination: trace.reached_destination,
        last_responding_hop: trace.last_responding_hop,
        first_silent_hop: trace.first_silent_hop,
        responded_count: trace.responded_count,
        total_hops: result.hops.len(),
        timed_out: result.timed_out.unwrap_or(false),
        elapsed_sec: result.elapsed_sec,
        error: result.error.clone(),
    }
}

/// Align every probe by hop number, 1 through the highest valid hop any probe saw
pub fn build_hop_matrix(results: &ProbeResults) -> Vec<HopMatrixRow> {
    let max_hop = results.values().map(|r| r.max_hop_number()).max().unwrap_or(0);

    (1..=max_hop)
        .map(|hop_number| HopMatrixRow {
            hop_number,
            cells: results
                .iter()
                .map(|(key, result)| (*key, result.hop(hop_number).cloned()))
                .collect(),
        })
        .collect()
}

/// Compare all probes run against one target
pub fn compare_probes(results: &ProbeResults, registry: &OwnershipRegistry) -> ProbeComparison {
    let per_probe_summary: BTreeMap<ProbeKey, ProbeSummary> = results
        .iter()
        .map(|(key, result)| (*key, summarize_result(result, registry)))
        .collect();

    let insights = pairwise_insights(&per_probe_summary);
    let hop_matrix = build_hop_matrix(results);

    ProbeComparison {
        per_probe_summary,
        insights,
        hop_matrix,
    }
}

fn pairwise_insights(summaries: &BTreeMap<ProbeKey, ProbeSummary>) -> Vec<Insight> {
    // Probes that errored out say nothing about the path
    let reached = |key: ProbeKey| {
        summaries
            .get(&key)
            .filter(|s| s.error.is_none())
            .map(|s| s.reached_destination)
    };
    let any_tcp_reached = summaries
        .iter()
        .any(|(key, s)| key.is_tcp() && s.reached_destination);

    let mut insights = Vec::new();

    if reached(ProbeKey::Icmp) == Some(false) && any_tcp_reached {
        insights.push(Insight::warn(
            "ICMP likely blocked (policy), routing likely OK",
            "ICMP did not reach the destination but at least one TCP probe did. The route works; \
             ICMP is probably filtered along the way or at the destination.",
        ));
    }

    if reached(ProbeKey::Tcp(80)) == Some(false) && reached(ProbeKey::Tcp(443)) == Some(true) {
        insights.push(Insight::warn(
            "Egress filtering / proxy rules",
            "TCP/443 reaches the destination but TCP/80 does not. Port 80 is likely blocked or \
             intercepted by a proxy while 443 is allowed.",
        ));
    }

    if reached(ProbeKey::Tcp(5060)) == Some(false) && reached(ProbeKey::Tcp(443)) == Some(true) {
        insights.push(Insight::warn(
            "SIP signaling may be filtered",
            "TCP/443 reaches the destination but TCP/5060 does not. A firewall or SIP ALG is \
             likely interfering with SIP signaling.",
        ));
    }

    if reached(ProbeKey::Udp(33434)) == Some(false) && any_tcp_reached {
        insights.push(Insight::warn(
            "UDP probes likely filtered",
            "UDP/33434 did not reach the destination while TCP did. UDP is probably filtered \
             somewhere on the path.",
        ));
    }

    insights
}
