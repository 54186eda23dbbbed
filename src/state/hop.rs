use serde::{Deserialize, Serialize};

/// Highest hop number accepted from an executor (TTL is a single byte)
pub const MAX_HOPS: u32 = 255;

/// Geolocation attached to a hop by the probe executor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

/// What kind of reply the executor saw for a hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// ICMP time exceeded (TTL expired in transit)
    TtlExpired,
    /// ICMP destination/port unreachable
    DestUnreachable,
    /// Probe timed out
    Timeout,
    /// Executor gave no usable hint
    Unknown,
}

/// A single hop record as produced by one probe run
///
/// `ip` and `latency_text` may hold the sentinels `"*"`, `"---"` or
/// `"no response"` instead of real values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    pub hop_number: u32,
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub latency_text: String,
    #[serde(default)]
    pub geo: GeoInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyKind>,
}

impl Hop {
    pub fn new(hop_number: u32, ip: impl Into<String>, latency_text: impl Into<String>) -> Self {
        Self {
            hop_number,
            ip: ip.into(),
            hostname: String::new(),
            latency_text: latency_text.into(),
            geo: GeoInfo::default(),
            reply: None,
        }
    }

    /// A `* * *` hop
    pub fn silent(hop_number: u32) -> Self {
        Self::new(hop_number, "*", "*")
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_reply(mut self, reply: ReplyKind) -> Self {
        self.reply = Some(reply);
        self
    }

    /// Hop numbers start at 1 and never exceed [`MAX_HOPS`]
    pub fn has_valid_number(&self) -> bool {
        (1..=MAX_HOPS).contains(&self.hop_number)
    }
}

/// Outcome of one probe run against a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracerouteResult {
    pub target: String,
    #[serde(default)]
    pub hops: Vec<Hop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TracerouteResult {
    pub fn new(target: impl Into<String>, hops: Vec<Hop>) -> Self {
        Self {
            target: target.into(),
            hops,
            timed_out: None,
            elapsed_sec: None,
            error: None,
        }
    }

    /// A probe that never produced hops; the error travels as data
    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(target, Vec::new())
        }
    }

    /// Hops ordered by hop number (stable for duplicate numbers)
    pub fn sorted_hops(&self) -> Vec<&Hop> {
        let mut hops: Vec<&Hop> = self.hops.iter().collect();
        hops.sort_by_key(|h| h.hop_number);
        hops
    }

    /// First record for a given hop number
    pub fn hop(&self, hop_number: u32) -> Option<&Hop> {
        self.hops.iter().find(|h| h.hop_number == hop_number)
    }

    /// Highest valid hop number seen (0 when empty)
    pub fn max_hop_number(&self) -> u32 {
        self.hops
            .iter()
            .filter(|h| h.has_valid_number())
            .map(|h| h.hop_number)
            .max()
            .unwrap_or(0)
    }
}
