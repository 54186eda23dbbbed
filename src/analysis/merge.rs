//! Merging the ICMP/TCP/UDP triple into one path narrative
//!
//! Each hop number gets one of three states:
//!
//! - **responsive**: at least one probe got a usable reply there
//! - **filtered**: silent, but something further along replied (or the
//!   destination was reached), so the path clearly continues
//! - **unreachable**: silent, and nothing beyond it ever replied
//!
//! States are computed independently per hop from two boolean arrays, so a
//! hop is never re-labelled by a later pass.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::classify::{HopClassification, classify_hop};
use crate::lookup::OwnershipRegistry;
use crate::state::{Hop, ProbeMode, ReplyKind, TracerouteResult};

/// Results of the parallel ICMP/TCP/UDP fan-out; a missing probe is `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeTriple {
    pub icmp: Option<TracerouteResult>,
    pub tcp: Option<TracerouteResult>,
    pub udp: Option<TracerouteResult>,
}

impl ProbeTriple {
    pub fn get(&self, mode: ProbeMode) -> Option<&TracerouteResult> {
        match mode {
            ProbeMode::Icmp => self.icmp.as_ref(),
            ProbeMode::Tcp => self.tcp.as_ref(),
            ProbeMode::Udp => self.udp.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopState {
    Responsive,
    Filtered,
    Unreachable,
}

impl fmt::Display for HopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Responsive => "responsive",
            Self::Filtered => "filtered",
            Self::Unreachable => "unreachable",
        })
    }
}

/// Why a probe is considered to have replied at a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySummary {
    TtlExpired,
    DestUnreachable,
    Timeout,
    /// Reply seen but the executor did not say what kind
    Responded,
}

impl fmt::Display for ReplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TtlExpired => "Responded (TTL-expired reply)",
            Self::DestUnreachable => "Responded (destination-unreachable reply)",
            Self::Timeout => "No reply (timeout)",
            Self::Responded => "Responded",
        })
    }
}

/// Combine the executor's reply tag with the classifier's verdict.
///
/// An explicit tag wins; without one the `responded` flag decides.
pub fn infer_reply_summary(hop: &Hop, classification: &HopClassification) -> ReplySummary {
    match hop.reply {
        Some(ReplyKind::TtlExpired) => ReplySummary::TtlExpired,
        Some(ReplyKind::DestUnreachable) => ReplySummary::DestUnreachable,
        Some(ReplyKind::Timeout) => ReplySummary::Timeout,
        Some(ReplyKind::Unknown) | None if classification.flags.responded => ReplySummary::Responded,
        Some(ReplyKind::Unknown) | None => ReplySummary::Timeout,
    }
}

/// One probe's view of a hop number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeHopView {
    pub hop: Hop,
    pub classification: HopClassification,
    pub reply: ReplySummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedHopView {
    pub hop_number: u32,
    pub best_hop: Option<Hop>,
    pub per_probe: BTreeMap<ProbeMode, ProbeHopView>,
    pub state: HopState,
    pub reason_parts: Vec<String>,
}

impl MergedHopView {
    /// Classification of the best hop, if any probe had a record here
    pub fn best(&self) -> Option<&ProbeHopView> {
        let best = self.best_hop.as_ref()?;
        self.per_probe.values().find(|view| &view.hop == best)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BottomLine {
    DestinationReached,
    SilentButProgressing,
    Unreachable,
}

impl fmt::Display for BottomLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DestinationReached => "Destination reached",
            Self::SilentButProgressing => "Silent-but-progressing",
            Self::Unreachable => "Unreachable / no progression",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedPath {
    pub merged_hops: Vec<MergedHopView>,
    pub reached_destination: bool,
    pub bottom_line: BottomLine,
}

/// For each hop (index 0 = hop 1), whether any strictly later hop was responsive
pub fn has_later_response(responsive: &[bool]) -> Vec<bool> {
    let mut later: Vec<bool> = responsive
        .iter()
        .rev()
        .scan(false, |seen, &is_responsive| {
            let before = *seen;
            *seen |= is_responsive;
            Some(before)
        })
        .collect();
    later.reverse();
    later
}

fn hop_state(responsive: bool, later_response: bool, reached_destination: bool) -> HopState {
    if responsive {
        HopState::Responsive
    } else if later_response || reached_destination {
        HopState::Filtered
    } else {
        HopState::Unreachable
    }
}

/// Merge the ICMP/TCP/UDP triple hop by hop
pub fn build_merged_hop_views(
    results: &ProbeTriple,
    target: &str,
    registry: &OwnershipRegistry,
) -> MergedPath {
    // hop number -> hop, first record wins; out-of-range numbers are skipped
    let maps: BTreeMap<ProbeMode, BTreeMap<u32, &Hop>> = ProbeMode::ALL
        .iter()
        .filter_map(|mode| results.get(*mode).map(|r| (*mode, r)))
        .map(|(mode, result)| {
            let mut by_number = BTreeMap::new();
            for hop in result.hops.iter().filter(|h| h.has_valid_number()) {
                by_number.entry(hop.hop_number).or_insert(hop);
            }
            (mode, by_number)
        })
        .collect();

    let max_hop = maps
        .values()
        .filter_map(|m| m.keys().next_back().copied())
        .max()
        .unwrap_or(0);

    let mut per_hop: Vec<BTreeMap<ProbeMode, ProbeHopView>> = Vec::with_capacity(max_hop as usize);
    let mut reached_destination = false;

    for hop_number in 1..=max_hop {
        let mut views = BTreeMap::new();
        for (mode, by_number) in &maps {
            let Some(hop) = by_number.get(&hop_number) else { continue };
            let classification = classify_hop(hop, target, registry);
            if classification.flags.destination {
                reached_destination = true;
            }
            let reply = infer_reply_summary(hop, &classification);
            views.insert(
                *mode,
                ProbeHopView {
                    hop: (*hop).clone(),
                    classification,
                    reply,
                },
            );
        }
        per_hop.push(views);
    }

    let responsive: Vec<bool> = per_hop
        .iter()
        .map(|views| views.values().any(|v| v.classification.flags.responded))
        .collect();
    let later = has_later_response(&responsive);

    let merged_hops: Vec<MergedHopView> = per_hop
        .into_iter()
        .enumerate()
        .map(|(idx, per_probe)| {
            let hop_number = idx as u32 + 1;
            let state = hop_state(responsive[idx], later[idx], reached_destination);
            let best_mode = best_probe(&per_probe);
            let best_hop = best_mode.and_then(|m| per_probe.get(&m)).map(|v| v.hop.clone());
            let reason_parts = reason_parts(state, &per_probe, best_mode);

            MergedHopView {
                hop_number,
                best_hop,
                per_probe,
                state,
                reason_parts,
            }
        })
        .collect();

    let bottom_line = if reached_destination {
        BottomLine::DestinationReached
    } else if merged_hops.iter().any(|h| h.state == HopState::Filtered)
        && merged_hops.iter().any(|h| h.state == HopState::Responsive)
    {
        BottomLine::SilentButProgressing
    } else {
        BottomLine::Unreachable
    };

    MergedPath {
        merged_hops,
        reached_destination,
        bottom_line,
    }
}

/// First responding probe in ICMP, TCP, UDP order; else the first with any record
fn best_probe(per_probe: &BTreeMap<ProbeMode, ProbeHopView>) -> Option<ProbeMode> {
    ProbeMode::ALL
        .iter()
        .copied()
        .find(|mode| {
            per_probe
                .get(mode)
                .is_some_and(|v| v.classification.flags.responded)
        })
        .or_else(|| ProbeMode::ALL.iter().copied().find(|mode| per_probe.contains_key(mode)))
}

fn reason_parts(
    state: HopState,
    per_probe: &BTreeMap<ProbeMode, ProbeHopView>,
    best_mode: Option<ProbeMode>,
) -> Vec<String> {
    let mut parts = vec![
        match state {
            HopState::Responsive => "At least one probe got a reply at this hop.",
            HopState::Filtered => {
                "No probe got a reply here, but the path continues past it (likely filtered or rate-limited)."
            }
            HopState::Unreachable => "No probe got a reply here and nothing beyond it responded.",
        }
        .to_string(),
    ];

    for mode in ProbeMode::ALL {
        let reply = per_probe
            .get(&mode)
            .map(|v| v.reply)
            .unwrap_or(ReplySummary::Timeout);
        parts.push(format!("{}: {}", mode.label(), reply));
    }

    if let Some(best) = best_mode.and_then(|m| per_probe.get(&m)) {
        let flags = &best.classification.flags;
        if flags.private_ip {
            parts.push("Private (RFC1918) address".to_string());
        } else if flags.public_ip {
            parts.push("Public address".to_string());
        }
        if flags.destination {
            parts.push("Destination".to_string());
        }
        if let Some(o) = best.classification.known_ownership() {
            match &o.city {
                Some(city) => parts.push(format!("Network: {} ({})", o.label, city)),
                None => parts.push(format!("Network: {}", o.label)),
            }
        }
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{Owner, OwnershipEntry};

    const TARGET: &str = "203.0.113.50";

    fn states(path: &MergedPath) -> Vec<HopState> {
        path.merged_hops.iter().map(|h| h.state).collect()
    }

    #[test]
    fn test_has_later_response() {
        assert_eq!(
            has_later_response(&[false, true, false, false, true]),
            vec![true, true, true, true, false]
        );
        assert_eq!(has_later_response(&[true, false, false]), vec![false, false, false]);
        assert!(has_later_response(&[]).is_empty());
    }

    #[test]
    fn test_merge_state_progression() {
        // Only hop 2 (ICMP) and hop 5 (TCP, the destination) respond
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(
                TARGET,
                vec![
                    Hop::silent(1),
                    Hop::new(2, "10.1.1.1", "3 ms"),
                    Hop::silent(3),
                    Hop::silent(4),
                ],
            )),
            tcp: Some(TracerouteResult::new(
                TARGET,
                vec![
                    Hop::silent(1),
                    Hop::silent(2),
                    Hop::silent(3),
                    Hop::silent(4),
                    Hop::new(5, TARGET, "18 ms"),
                ],
            )),
            udp: None,
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        assert_eq!(
            states(&path),
            vec![
                HopState::Filtered,
                HopState::Responsive,
                HopState::Filtered,
                HopState::Filtered,
                HopState::Responsive,
            ]
        );
        assert!(path.reached_destination);
        assert_eq!(path.bottom_line, BottomLine::DestinationReached);
        assert_eq!(path.bottom_line.to_string(), "Destination reached");
    }

    #[test]
    fn test_best_hop_prefers_responding_probe() {
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(TARGET, vec![Hop::silent(3)])),
            tcp: Some(TracerouteResult::new(TARGET, vec![Hop::new(3, "100.64.3.3", "9 ms")])),
            udp: Some(TracerouteResult::new(TARGET, vec![Hop::new(3, "100.64.3.4", "9 ms")])),
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        let hop3 = &path.merged_hops[2];
        assert_eq!(hop3.best_hop.as_ref().unwrap().ip, "100.64.3.3");
        assert!(hop3.best().unwrap().classification.flags.public_ip);
    }

    #[test]
    fn test_best_hop_falls_back_to_silent_record() {
        let triple = ProbeTriple {
            icmp: None,
            tcp: Some(TracerouteResult::new(TARGET, vec![Hop::silent(1)])),
            udp: Some(TracerouteResult::new(TARGET, vec![Hop::silent(1)])),
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        let hop1 = &path.merged_hops[0];
        assert_eq!(hop1.best_hop, Some(Hop::silent(1)));
        assert_eq!(hop1.state, HopState::Unreachable);
        assert_eq!(path.bottom_line, BottomLine::Unreachable);
    }

    #[test]
    fn test_silent_but_progressing() {
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(
                TARGET,
                vec![Hop::silent(1), Hop::new(2, "10.0.0.2", "2 ms"), Hop::silent(3)],
            )),
            tcp: None,
            udp: None,
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        assert_eq!(
            states(&path),
            vec![HopState::Filtered, HopState::Responsive, HopState::Unreachable]
        );
        assert_eq!(path.bottom_line, BottomLine::SilentButProgressing);
        assert_eq!(path.bottom_line.to_string(), "Silent-but-progressing");
    }

    #[test]
    fn test_empty_triple() {
        let path = build_merged_hop_views(&ProbeTriple::default(), TARGET, &OwnershipRegistry::default());
        assert!(path.merged_hops.is_empty());
        assert!(!path.reached_destination);
        assert_eq!(path.bottom_line, BottomLine::Unreachable);
    }

    #[test]
    fn test_gap_hop_has_no_best_hop() {
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(TARGET, vec![Hop::new(2, "10.0.0.2", "2 ms")])),
            tcp: None,
            udp: None,
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        let hop1 = &path.merged_hops[0];
        assert!(hop1.best_hop.is_none());
        assert!(hop1.per_probe.is_empty());
        assert_eq!(hop1.state, HopState::Filtered);
    }

    #[test]
    fn test_out_of_range_hop_numbers_skipped() {
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(
                TARGET,
                vec![Hop::new(0, "10.0.0.9", "1 ms"), Hop::new(1, "10.0.0.1", "1 ms")],
            )),
            tcp: Some(TracerouteResult::new(TARGET, vec![Hop::new(u32::MAX, TARGET, "9 ms")])),
            udp: None,
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        assert_eq!(path.merged_hops.len(), 1);
        assert_eq!(path.merged_hops[0].best_hop.as_ref().unwrap().ip, "10.0.0.1");
        assert!(!path.reached_destination);
    }

    #[test]
    fn test_reply_summary_from_tags() {
        let registry = OwnershipRegistry::default();
        let responded = Hop::new(1, "10.0.0.1", "1 ms");
        let c = classify_hop(&responded, TARGET, &registry);

        assert_eq!(infer_reply_summary(&responded, &c), ReplySummary::Responded);
        assert_eq!(
            infer_reply_summary(&responded.clone().with_reply(ReplyKind::TtlExpired), &c),
            ReplySummary::TtlExpired
        );
        assert_eq!(
            infer_reply_summary(&responded.clone().with_reply(ReplyKind::DestUnreachable), &c),
            ReplySummary::DestUnreachable
        );
        assert_eq!(
            infer_reply_summary(&responded.clone().with_reply(ReplyKind::Timeout), &c),
            ReplySummary::Timeout
        );

        let silent = Hop::silent(2).with_reply(ReplyKind::Unknown);
        let c = classify_hop(&silent, TARGET, &registry);
        assert_eq!(infer_reply_summary(&silent, &c), ReplySummary::Timeout);
    }

    #[test]
    fn test_reason_parts() {
        let registry = OwnershipRegistry::new(vec![
            OwnershipEntry::new("203.0.113.0/24", Owner::Pop, "Edge POP").with_city("Austin"),
        ]);
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(
                TARGET,
                vec![Hop::new(1, TARGET, "7 ms").with_reply(ReplyKind::DestUnreachable)],
            )),
            tcp: Some(TracerouteResult::new(TARGET, vec![Hop::silent(1)])),
            udp: None,
        };

        let path = build_merged_hop_views(&triple, TARGET, &registry);
        assert_eq!(
            path.merged_hops[0].reason_parts,
            vec![
                "At least one probe got a reply at this hop.",
                "ICMP: Responded (destination-unreachable reply)",
                "TCP: No reply (timeout)",
                "UDP: No reply (timeout)",
                "Public address",
                "Destination",
                "Network: Edge POP (Austin)",
            ]
        );
    }
}
