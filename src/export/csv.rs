use anyhow::Result;
use std::io::Write;

use crate::analysis::{HopMatrixRow, MergedPath};
use crate::state::{Hop, ProbeMode};

/// Export the hop alignment table to CSV format
///
/// One `<key>_ip` / `<key>_latency` column pair per probe, in key order.
pub fn export_hop_matrix_csv<W: Write>(rows: &[HopMatrixRow], mut writer: W) -> Result<()> {
    let keys: Vec<_> = rows
        .first()
        .map(|row| row.cells.keys().copied().collect())
        .unwrap_or_default();

    // Write header
    let mut header = vec!["hop".to_string()];
    for key in &keys {
        header.push(escape_csv(&format!("{}_ip", key)));
        header.push(escape_csv(&format!("{}_latency", key)));
    }
    writeln!(writer, "{}", header.join(","))?;

    for row in rows {
        let mut fields = vec![row.hop_number.to_string()];
        for key in &keys {
            match row.cells.get(key).and_then(Option::as_ref) {
                Some(hop) => {
                    fields.push(escape_csv(&hop.ip));
                    fields.push(escape_csv(&hop.latency_text));
                }
                None => {
                    fields.push(String::new());
                    fields.push(String::new());
                }
            }
        }
        writeln!(writer, "{}", fields.join(","))?;
    }

    Ok(())
}

/// Export the merged ICMP/TCP/UDP view to CSV format
pub fn export_merged_csv<W: Write>(path: &MergedPath, mut writer: W) -> Result<()> {
    writeln!(
        writer,
        "hop,state,best_ip,best_hostname,best_latency,icmp_reply,tcp_reply,udp_reply"
    )?;

    for view in &path.merged_hops {
        let (ip, hostname, latency) = match view.best_hop {
            Some(Hop {
                ref ip,
                ref hostname,
                ref latency_text,
                ..
            }) => (ip.as_str(), hostname.as_str(), latency_text.as_str()),
            None => ("*", "", ""),
        };

        let reply = |mode: ProbeMode| {
            view.per_probe
                .get(&mode)
                .map(|p| escape_csv(&p.reply.to_string()))
                .unwrap_or_default()
        };

        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            view.hop_number,
            view.state,
            escape_csv(ip),
            escape_csv(hostname),
            escape_csv(latency),
            reply(ProbeMode::Icmp),
            reply(ProbeMode::Tcp),
            reply(ProbeMode::Udp),
        )?;
    }

    Ok(())
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ProbeTriple, build_hop_matrix, build_merged_hop_views};
    use crate::lookup::OwnershipRegistry;
    use crate::state::{ProbeKey, ProbeResults, TracerouteResult};

    const TARGET: &str = "198.51.100.10";

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_hop_matrix_csv() {
        let mut results = ProbeResults::new();
        results.insert(
            ProbeKey::Icmp,
            TracerouteResult::new(TARGET, vec![Hop::new(1, "192.168.1.1", "1.2 ms"), Hop::silent(2)]),
        );
        results.insert(
            ProbeKey::Tcp(443),
            TracerouteResult::new(TARGET, vec![Hop::new(1, "192.168.1.1", "0.9 ms")]),
        );

        let mut buf = Vec::new();
        export_hop_matrix_csv(&build_hop_matrix(&results), &mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();

        assert_eq!(
            csv,
            "hop,icmp_ip,icmp_latency,tcp:443_ip,tcp:443_latency\n\
             1,192.168.1.1,1.2 ms,192.168.1.1,0.9 ms\n\
             2,*,*,,\n"
        );
    }

    #[test]
    fn test_empty_hop_matrix_csv() {
        let mut buf = Vec::new();
        export_hop_matrix_csv(&[], &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "hop\n");
    }

    #[test]
    fn test_merged_csv() {
        let triple = ProbeTriple {
            icmp: Some(TracerouteResult::new(TARGET, vec![Hop::silent(1), Hop::silent(2)])),
            tcp: Some(TracerouteResult::new(
                TARGET,
                vec![
                    Hop::new(1, "192.168.1.1", "1 ms").with_hostname("gw, home"),
                    Hop::new(2, TARGET, "12 ms"),
                ],
            )),
            udp: None,
        };

        let path = build_merged_hop_views(&triple, TARGET, &OwnershipRegistry::default());
        let mut buf = Vec::new();
        export_merged_csv(&path, &mut buf).unwrap();
        let csv = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "1,responsive,192.168.1.1,\"gw, home\",1 ms,No reply (timeout),Responded,"
        );
        assert!(lines[2].starts_with(&format!("2,responsive,{},,12 ms,", TARGET)));
    }
}
