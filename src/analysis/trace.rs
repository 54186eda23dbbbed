//! Single-probe trace analysis
//!
//! Four independent rules run over one probe's hops:
//!
//! 1. **Edge filter**: hop 1 answers but most hops after it stay silent
//! 2. **ISP boundary filter**: replies stop at or just past the first public hop
//! 3. **Latency spike**: the largest jump between consecutive responding hops
//! 4. **Destination reached**: silent middle hops are then mostly cosmetic

use serde::{Deserialize, Serialize};

use super::insight::Insight;
use crate::classify::{HopClassification, classify_hop, parse_latency_ms};
use crate::lookup::OwnershipRegistry;
use crate::state::{Hop, ProbeMode};

/// Share of silent hops after a responding edge that counts as filtering
const EDGE_SILENCE_RATIO: f64 = 0.70;
/// Absolute latency jump that always counts as a spike
const SPIKE_ABS_MS: f64 = 50.0;
/// Minimum latency for a doubling to count as a spike
const SPIKE_DOUBLING_FLOOR_MS: f64 = 30.0;

/// Aggregate view of one probe's hops
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub reached_destination: bool,
    pub last_responding_hop: Option<u32>,
    pub first_silent_hop: Option<u32>,
    pub responded_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAnalysis {
    pub insights: Vec<Insight>,
    pub summary: TraceSummary,
}

/// Valid hops in hop-number order, each with its classification
pub(crate) fn classify_all<'a>(
    hops: &'a [Hop],
    target: &str,
    registry: &OwnershipRegistry,
) -> Vec<(&'a Hop, HopClassification)> {
    let mut sorted: Vec<&Hop> = hops.iter().filter(|h| h.has_valid_number()).collect();
    sorted.sort_by_key(|h| h.hop_number);
    sorted
        .into_iter()
        .map(|hop| (hop, classify_hop(hop, target, registry)))
        .collect()
}

fn summarize_classified(classified: &[(&Hop, HopClassification)]) -> TraceSummary {
    let mut summary = TraceSummary::default();

    for (hop, c) in classified {
        if c.flags.destination {
            summary.reached_destination = true;
        }
        if c.flags.responded {
            summary.responded_count += 1;
            summary.last_responding_hop = Some(hop.hop_number);
        } else if summary.first_silent_hop.is_none() {
            summary.first_silent_hop = Some(hop.hop_number);
        }
    }

    summary
}

/// Summarize one probe's hops
pub fn summarize_hops(hops: &[Hop], target: &str, registry: &OwnershipRegistry) -> TraceSummary {
    summarize_classified(&classify_all(hops, target, registry))
}

/// Run the single-probe rules over one probe's hops
pub fn analyze_trace(
    hops: &[Hop],
    target: &str,
    mode: ProbeMode,
    registry: &OwnershipRegistry,
) -> TraceAnalysis {
    let classified = classify_all(hops, target, registry);
    let summary = summarize_classified(&classified);

    let mut insights = Vec::new();
    insights.extend(edge_filter(&classified, mode));
    insights.extend(upstream_filter(&classified, &summary));
    insights.extend(latency_spike(&classified));
    if summary.reached_destination {
        insights.push(Insight::info(
            "Destination reached",
            format!(
                "The {} probe reached the destination. Silent intermediate hops are most likely \
                 routers that deprioritize replies; the path itself is probably fine.",
                mode.label()
            ),
        ));
    }

    TraceAnalysis { insights, summary }
}

fn edge_filter(classified: &[(&Hop, HopClassification)], mode: ProbeMode) -> Option<Insight> {
    let ((first, first_class), rest) = classified.split_first()?;
    if first.hop_number != 1 || !first_class.flags.responded || rest.is_empty() {
        return None;
    }

    let silent = rest.iter().filter(|(_, c)| c.flags.no_response).count();
    let ratio = silent as f64 / rest.len() as f64;
    if ratio < EDGE_SILENCE_RATIO {
        return None;
    }

    let mut detail = format!(
        "Hop 1 responded but {}/{} later hops ({:.0}%) were silent. Devices past the edge are \
         likely filtering or rate-limiting {} probe replies.",
        silent,
        rest.len(),
        ratio * 100.0,
        mode.label()
    );
    if mode == ProbeMode::Tcp {
        detail.push_str(" TCP probing is typically quieter than ICMP, so some silence is expected.");
    }

    Some(Insight::warn("Likely filtered after the edge", detail))
}

fn upstream_filter(classified: &[(&Hop, HopClassification)], summary: &TraceSummary) -> Option<Insight> {
    if summary.reached_destination {
        return None;
    }

    let boundary = classified
        .iter()
        .position(|(_, c)| c.flags.public_ip && c.flags.responded)?;
    let last = classified.iter().rposition(|(_, c)| c.flags.responded)?;

    let near_boundary = last == boundary || last == boundary + 1;
    let remaining = classified.len() - last - 1;
    if !near_boundary || remaining == 0 {
        return None;
    }

    let boundary_hop = classified[boundary].0.hop_number;
    Some(Insight::warn(
        "Upstream filtering near ISP boundary",
        format!(
            "Replies stop at or just past hop {} (the first public hop) and {} later hop(s) stayed \
             silent. Filtering likely starts at the ISP boundary.",
            boundary_hop, remaining
        ),
    ))
}

fn latency_spike(classified: &[(&Hop, HopClassification)]) -> Option<Insight> {
    let samples: Vec<(u32, f64)> = classified
        .iter()
        .filter(|(_, c)| c.flags.responded)
        .filter_map(|(hop, _)| parse_latency_ms(&hop.latency_text).map(|ms| (hop.hop_number, ms)))
        .collect();

    let mut worst: Option<((u32, f64), (u32, f64), f64)> = None;
    for pair in samples.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        let delta = next.1 - prev.1;
        let doubled = prev.1 > 0.0 && next.1 >= 2.0 * prev.1 && next.1 >= SPIKE_DOUBLING_FLOOR_MS;
        if delta < SPIKE_ABS_MS && !doubled {
            continue;
        }
        if worst.is_none_or(|(_, _, best)| delta > best) {
            worst = Some((prev, next, delta));
        }
    }

    let ((prev_hop, prev_ms), (next_hop, next_ms), delta) = worst?;
    Some(Insight::warn(
        "Latency spike",
        format!(
            "Latency jumps from {:.1} ms at hop {} to {:.1} ms at hop {} (+{:.1} ms).",
            prev_ms, prev_hop, next_ms, next_hop, delta
        ),
    ))
}
