use std::collections::BTreeMap;
use std::io::Write;

use crate::analysis::{Insight, InsightLevel, MergedPath, ProbeComparison, TraceAnalysis};
use crate::classify::classify_hop;
use crate::lookup::{OwnershipRegistry, sanitize_display};
use crate::policy::ScenarioDefinition;
use crate::state::{Hop, ProbeKey, ProbeMode, TracerouteResult};

fn host(hop: &Hop) -> String {
    let ip = sanitize_display(&hop.ip);
    let hostname = sanitize_display(hop.hostname.trim());
    if hostname.is_empty() || hostname == ip {
        ip
    } else {
        format!("{} ({})", hostname, ip)
    }
}

fn write_insights<W: Write>(insights: &[Insight], writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "Insights:")?;
    if insights.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for insight in insights {
        let tag = match insight.level {
            InsightLevel::Info => "info",
            InsightLevel::Warn => "warn",
        };
        writeln!(writer, "  [{}] {}: {}", tag, insight.title, insight.detail)?;
    }
    Ok(())
}

/// Hop table plus insights for one probe
pub fn write_trace_report<W: Write>(
    key: ProbeKey,
    result: &TracerouteResult,
    analysis: &TraceAnalysis,
    registry: &OwnershipRegistry,
    mut writer: W,
) -> std::io::Result<()> {
    writeln!(writer, "pathdiag {} trace to {}", key.label(), sanitize_display(&result.target))?;
    if let Some(ref error) = result.error {
        writeln!(writer, "Error: {}", sanitize_display(error))?;
    }
    writeln!(writer)?;

    writeln!(writer, "{:>3}  {:<40} {:>10}  Notes", "#", "Host", "Latency")?;
    writeln!(writer, "{}", "-".repeat(100))?;
    for hop in result.sorted_hops() {
        let c = classify_hop(hop, &result.target, registry);
        writeln!(
            writer,
            "{:>3}  {:<40} {:>10}  {}",
            hop.hop_number,
            host(hop),
            sanitize_display(&hop.latency_text),
            c.explanation
        )?;
    }
    writeln!(writer)?;

    write_insights(&analysis.insights, &mut writer)
}

/// Per-probe summaries, the hop matrix and pairwise insights
pub fn write_comparison<W: Write>(target: &str, comparison: &ProbeComparison, mut writer: W) -> std::io::Result<()> {
    writeln!(writer, "pathdiag probe comparison for {}", sanitize_display(target))?;
    writeln!(writer)?;

    for (key, summary) in &comparison.per_probe_summary {
        if let Some(ref error) = summary.error {
            writeln!(writer, "{:<10} error: {}", key.label(), sanitize_display(error))?;
            continue;
        }
        let reached = if summary.reached_destination { "reached" } else { "not reached" };
        let silent = summary
            .first_silent_hop
            .map(|h| format!("silent from hop {}", h))
            .unwrap_or_else(|| "no silent hops".to_string());
        writeln!(
            writer,
            "{:<10} {}, {}/{} hops responded, {}",
            key.label(),
            reached,
            summary.responded_count,
            summary.total_hops,
            silent
        )?;
    }
    writeln!(writer)?;

    let keys: Vec<ProbeKey> = comparison.per_probe_summary.keys().copied().collect();
    write!(writer, "{:>3}", "#")?;
    for key in &keys {
        write!(writer, "  {:<24}", key.label())?;
    }
    writeln!(writer)?;
    for row in &comparison.hop_matrix {
        write!(writer, "{:>3}", row.hop_number)?;
        for key in &keys {
            let cell = match row.cells.get(key).and_then(Option::as_ref) {
                Some(hop) => sanitize_display(&hop.ip),
                None => "-".to_string(),
            };
            write!(writer, "  {:<24}", cell)?;
        }
        writeln!(writer)?;
    }
    writeln!(writer)?;

    write_insights(&comparison.insights, &mut writer)
}

/// Merged ICMP/TCP/UDP view with each hop's reasoning
pub fn write_merged_report<W: Write>(
    target: &str,
    path: &MergedPath,
    analyses: &BTreeMap<ProbeMode, TraceAnalysis>,
    mut writer: W,
) -> std::io::Result<()> {
    writeln!(writer, "pathdiag merged path to {}", sanitize_display(target))?;
    writeln!(writer, "Bottom line: {}", path.bottom_line)?;
    writeln!(writer)?;

    for view in &path.merged_hops {
        let best = view.best_hop.as_ref().map(host).unwrap_or_else(|| "*".to_string());
        writeln!(writer, "{:>3}  {:<12} {}", view.hop_number, view.state.to_string(), best)?;
        for part in &view.reason_parts {
            writeln!(writer, "       {}", part)?;
        }
    }

    for (mode, analysis) in analyses {
        if analysis.insights.is_empty() {
            continue;
        }
        writeln!(writer)?;
        writeln!(writer, "{}:", mode.label())?;
        write_insights(&analysis.insights, &mut writer)?;
    }

    Ok(())
}

/// Built-in scenarios and the probes each one runs
pub fn write_catalog<W: Write>(catalog: &[ScenarioDefinition], mut writer: W) -> std::io::Result<()> {
    for definition in catalog {
        writeln!(writer, "{:<22} {}", definition.id.as_str(), definition.title)?;
        writeln!(writer, "{:<22} {}", "", definition.description)?;
        let probes: Vec<&str> = definition.probes.iter().map(|p| p.label.as_str()).collect();
        writeln!(writer, "{:<22} probes: {}", "", probes.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ProbeTriple, analyze_trace, build_merged_hop_views, compare_probes};
    use crate::policy::catalog;
    use crate::state::ProbeResults;

    const TARGET: &str = "198.51.100.10";

    fn render<F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>>(f: F) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn reaching() -> TracerouteResult {
        TracerouteResult::new(
            TARGET,
            vec![
                Hop::new(1, "192.168.1.1", "1 ms").with_hostname("gw\x1b[2J.lan"),
                Hop::silent(2),
                Hop::new(3, TARGET, "20 ms"),
            ],
        )
    }

    #[test]
    fn test_trace_report() {
        let registry = OwnershipRegistry::default();
        let result = reaching();
        let analysis = analyze_trace(&result.hops, TARGET, ProbeMode::Icmp, &registry);

        let text = render(|w| write_trace_report(ProbeKey::Icmp, &result, &analysis, &registry, w));
        assert!(text.starts_with("pathdiag ICMP trace to 198.51.100.10\n"));
        assert!(text.contains("gw[2J.lan (192.168.1.1)"));
        assert!(!text.contains('\x1b'));
        assert!(text.contains("This is the destination"));
        assert!(text.contains("[info] Destination reached"));
    }

    #[test]
    fn test_comparison_report() {
        let mut results = ProbeResults::new();
        results.insert(ProbeKey::Icmp, TracerouteResult::failed(TARGET, "no executor"));
        results.insert(ProbeKey::Tcp(443), reaching());
        let comparison = compare_probes(&results, &OwnershipRegistry::default());

        let text = render(|w| write_comparison(TARGET, &comparison, w));
        assert!(text.contains("ICMP       error: no executor"));
        assert!(text.contains("TCP/443    reached, 2/3 hops responded, silent from hop 2"));
        assert!(text.contains("Insights:\n  (none)"));
    }

    #[test]
    fn test_merged_report() {
        let registry = OwnershipRegistry::default();
        let triple = ProbeTriple {
            icmp: Some(reaching()),
            tcp: None,
            udp: None,
        };
        let path = build_merged_hop_views(&triple, TARGET, &registry);
        let mut analyses = BTreeMap::new();
        analyses.insert(
            ProbeMode::Icmp,
            analyze_trace(&reaching().hops, TARGET, ProbeMode::Icmp, &registry),
        );

        let text = render(|w| write_merged_report(TARGET, &path, &analyses, w));
        assert!(text.contains("Bottom line: Destination reached"));
        assert!(text.contains("  2  filtered     *"));
        assert!(text.contains("ICMP:\nInsights:"));
    }

    #[test]
    fn test_catalog_lists_every_scenario() {
        let text = render(|w| write_catalog(&catalog(&[]), w));
        assert!(text.contains("sip-blocked"));
        assert!(text.contains("asymmetric-filtering"));
        assert!(text.contains("probes: UDP 10000 (RTP), UDP 12000 (RTP), UDP 20000 (RTP), TCP 443 (HTTPS)"));
    }
}
