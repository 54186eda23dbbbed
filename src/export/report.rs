use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use crate::analysis::ProbeSummary;
use crate::lookup::sanitize_display;
use crate::policy::{PolicyFindingsResult, ScenarioDefinition};
use crate::state::ProbeKey;

/// Source of the "Generated" timestamp
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// What the ticket is about
#[derive(Debug, Clone, Copy)]
pub struct TicketContext<'a> {
    pub target: &'a str,
    pub scenario: Option<&'a ScenarioDefinition>,
}

/// Probe keys in scenario order first, then any extras in key order
fn probe_order(ctx: &TicketContext<'_>, summaries: &BTreeMap<ProbeKey, ProbeSummary>) -> Vec<(ProbeKey, String)> {
    let mut order: Vec<(ProbeKey, String)> = Vec::new();
    if let Some(scenario) = ctx.scenario {
        for probe in &scenario.probes {
            if summaries.contains_key(&probe.key) {
                order.push((probe.key, probe.label.clone()));
            }
        }
    }
    for key in summaries.keys() {
        if !order.iter().any(|(k, _)| k == key) {
            order.push((*key, key.label()));
        }
    }
    order
}

fn probe_line(label: &str, summary: &ProbeSummary) -> String {
    if let Some(ref error) = summary.error {
        return format!("{}: error: {}", label, sanitize_display(error));
    }

    let mark = if summary.reached_destination { "✅" } else { "❌" };
    let silence = match summary.first_silent_hop {
        Some(hop) => format!("silent begins hop {}", hop),
        None => "no silence".to_string(),
    };
    format!("{}: reached dest {} ({})", label, mark, silence)
}

fn render(
    out: &mut String,
    ctx: &TicketContext<'_>,
    findings: &PolicyFindingsResult,
    summaries: &BTreeMap<ProbeKey, ProbeSummary>,
    clock: &dyn Clock,
) -> std::fmt::Result {
    match ctx.scenario {
        Some(scenario) => writeln!(out, "Network policy check: {} ({})", scenario.title, scenario.id)?,
        None => writeln!(out, "Network policy check")?,
    }
    writeln!(out, "Target: {}", sanitize_display(ctx.target))?;
    writeln!(out, "Generated: {}", clock.now().format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;

    writeln!(out, "Probes:")?;
    for (key, label) in probe_order(ctx, summaries) {
        if let Some(summary) = summaries.get(&key) {
            writeln!(out, "{}", probe_line(&label, summary))?;
        }
    }
    writeln!(out)?;

    writeln!(out, "Findings (overall confidence: {}):", findings.confidence)?;
    for finding in &findings.findings {
        writeln!(out, "- {}: {}", finding.title, finding.detail)?;
    }
    writeln!(out)?;

    writeln!(out, "Suggested next steps:")?;
    for step in &findings.suggested_next_steps {
        writeln!(out, "- {}", step)?;
    }

    Ok(())
}

/// Render the ticket-ready plain text summary
pub fn format_ticket_summary(
    ctx: &TicketContext<'_>,
    findings: &PolicyFindingsResult,
    summaries: &BTreeMap<ProbeKey, ProbeSummary>,
    clock: &dyn Clock,
) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = render(&mut out, ctx, findings, summaries, clock);
    out
}

/// Write the ticket summary to any writer
pub fn write_ticket_summary<W: Write>(
    mut writer: W,
    ctx: &TicketContext<'_>,
    findings: &PolicyFindingsResult,
    summaries: &BTreeMap<ProbeKey, ProbeSummary>,
    clock: &dyn Clock,
) -> std::io::Result<()> {
    writer.write_all(format_ticket_summary(ctx, findings, summaries, clock).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ScenarioId, derive_findings, scenario};
    use chrono::TimeZone;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap())
    }

    fn summaries() -> BTreeMap<ProbeKey, ProbeSummary> {
        let mut summaries = BTreeMap::new();
        summaries.insert(
            ProbeKey::Tcp(5060),
            ProbeSummary {
                reached_destination: false,
                last_responding_hop: Some(3),
                first_silent_hop: Some(4),
                responded_count: 3,
                total_hops: 10,
                ..ProbeSummary::default()
            },
        );
        summaries.insert(
            ProbeKey::Tcp(443),
            ProbeSummary {
                reached_destination: true,
                last_responding_hop: Some(9),
                responded_count: 9,
                total_hops: 9,
                ..ProbeSummary::default()
            },
        );
        summaries.insert(
            ProbeKey::Icmp,
            ProbeSummary {
                error: Some("executor\x1b[31m unavailable".to_string()),
                ..ProbeSummary::default()
            },
        );
        summaries
    }

    #[test]
    fn test_ticket_summary_snapshot() {
        let summaries = summaries();
        let findings = derive_findings(&summaries);
        let sip = scenario(ScenarioId::SipBlocked, &[]);
        let ctx = TicketContext {
            target: "sip.example.net",
            scenario: Some(&sip),
        };

        let ticket = format_ticket_summary(&ctx, &findings, &summaries, &clock());
        let expected = "\
Network policy check: SIP blocked? (sip-blocked)
Target: sip.example.net
Generated: 2026-03-14 09:26:53 UTC

Probes:
TCP 5060 (SIP): reached dest ❌ (silent begins hop 4)
TCP 443 (HTTPS): reached dest ✅ (no silence)
ICMP: error: executor[31m unavailable

Findings (overall confidence: medium):
- SIP port likely blocked upstream: TCP/443 reaches the destination but TCP/5060 does not. A firewall rule or SIP ALG between the client and the provider is likely interfering with SIP signaling.

Suggested next steps:
- Allow outbound TCP/5060 to the SIP provider on the edge firewall
- Disable SIP ALG on the edge router/firewall
";
        assert_eq!(ticket, expected);
    }

    #[test]
    fn test_ticket_without_scenario_uses_key_labels() {
        let summaries = summaries();
        let findings = derive_findings(&summaries);
        let ctx = TicketContext {
            target: "sip.example.net",
            scenario: None,
        };

        let ticket = format_ticket_summary(&ctx, &findings, &summaries, &clock());
        let lines: Vec<&str> = ticket.lines().collect();
        assert_eq!(lines[0], "Network policy check");
        assert_eq!(lines[5], "ICMP: error: executor[31m unavailable");
        assert_eq!(lines[6], "TCP/443: reached dest ✅ (no silence)");
        assert_eq!(lines[7], "TCP/5060: reached dest ❌ (silent begins hop 4)");
    }

    #[test]
    fn test_ticket_is_stable_apart_from_clock() {
        let summaries = summaries();
        let findings = derive_findings(&summaries);
        let ctx = TicketContext {
            target: "sip.example.net",
            scenario: None,
        };

        let a = format_ticket_summary(&ctx, &findings, &summaries, &clock());
        let b = format_ticket_summary(&ctx, &findings, &summaries, &clock());
        assert_eq!(a, b);

        let mut buf = Vec::new();
        write_ticket_summary(&mut buf, &ctx, &findings, &summaries, &clock()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), a);
    }
}
