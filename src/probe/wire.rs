//! Executor JSON format.
//!
//! Executors are loosely typed: hop numbers arrive as `hop`/`ttl`/`hopNumber`,
//! latency as a number or a string, and the kind of reply only as free text in
//! `reply`/`type`/`icmpType`/`message`/`status`. This is the only place that
//! text is inspected; it becomes a [`ReplyKind`] tag on each [`Hop`].

use serde::Deserialize;
use serde_json::Value;

use super::ProbeError;
use crate::state::{GeoInfo, Hop, MAX_HOPS, ReplyKind, TracerouteResult};

/// ICMP type codes some executors report numerically
const ICMP_DEST_UNREACHABLE: u64 = 3;
const ICMP_TIME_EXCEEDED: u64 = 11;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHop {
    #[serde(alias = "hop", alias = "ttl")]
    pub hop_number: u32,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, alias = "latency", alias = "rtt")]
    pub latency_text: Option<Value>,
    #[serde(default)]
    pub geo: Option<GeoInfo>,
    #[serde(default)]
    pub reply: Option<Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
    #[serde(default)]
    pub icmp_type: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResult {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub hops: Vec<WireHop>,
    #[serde(default)]
    pub timed_out: Option<bool>,
    #[serde(default)]
    pub elapsed_sec: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Classify free-text reply hints into a reply tag.
///
/// `None` when there is no hint at all.
pub fn reply_kind_from_hints<S: AsRef<str>>(hints: &[S]) -> Option<ReplyKind> {
    let text = hints
        .iter()
        .map(|h| h.as_ref().trim())
        .filter(|h| !h.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if text.is_empty() {
        return None;
    }

    let kind = if text.contains("time exceeded") || text.contains("ttl") {
        ReplyKind::TtlExpired
    } else if text.contains("unreachable") {
        ReplyKind::DestUnreachable
    } else if text.contains("timeout") || text.contains("no reply") {
        ReplyKind::Timeout
    } else {
        ReplyKind::Unknown
    };
    Some(kind)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn icmp_type_hint(value: &Value) -> Option<String> {
    match value.as_u64() {
        Some(ICMP_TIME_EXCEEDED) => Some("time exceeded".to_string()),
        Some(ICMP_DEST_UNREACHABLE) => Some("unreachable".to_string()),
        _ => value_text(value),
    }
}

impl From<WireHop> for Hop {
    fn from(wire: WireHop) -> Self {
        let hints: Vec<String> = [
            wire.reply.as_ref().and_then(value_text),
            wire.kind.as_ref().and_then(value_text),
            wire.icmp_type.as_ref().and_then(icmp_type_hint),
            wire.message.as_ref().and_then(value_text),
            wire.status.as_ref().and_then(value_text),
        ]
        .into_iter()
        .flatten()
        .collect();

        Hop {
            hop_number: wire.hop_number,
            ip: wire.ip.unwrap_or_else(|| "*".to_string()),
            hostname: wire.hostname.unwrap_or_default(),
            latency_text: wire.latency_text.as_ref().and_then(value_text).unwrap_or_default(),
            geo: wire.geo.unwrap_or_default(),
            reply: reply_kind_from_hints(&hints),
        }
    }
}

impl WireResult {
    /// Convert to a result; `target` fills in when the executor omitted it.
    ///
    /// Hop records numbered 0 or above [`MAX_HOPS`] are dropped with a warning.
    pub fn into_result(self, target: &str) -> TracerouteResult {
        let target = self.target.unwrap_or_else(|| target.to_string());
        let (hops, dropped): (Vec<Hop>, Vec<Hop>) =
            self.hops.into_iter().map(Hop::from).partition(Hop::has_valid_number);
        for hop in &dropped {
            tracing::warn!(
                %target,
                hop = hop.hop_number,
                max = MAX_HOPS,
                "dropping hop record with out-of-range number"
            );
        }

        TracerouteResult {
            target,
            hops,
            timed_out: self.timed_out,
            elapsed_sec: self.elapsed_sec,
            error: self.error,
        }
    }
}

/// Decode one executor response
pub fn decode_result(json: &str, target: &str) -> Result<TracerouteResult, ProbeError> {
    let wire: WireResult = serde_json::from_str(json)?;
    Ok(wire.into_result(target))
}
