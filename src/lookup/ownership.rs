//! Static IP ownership registry.
//!
//! Maps CIDR blocks to who operates them (customer LAN, POP, core, transit).
//! The registry is configuration data supplied by the operator; lookups use
//! first-match semantics in list order.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cidr::{cidr_contains, ip_to_int};

/// Who operates a block of addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    CustomerLan,
    Pop,
    Core,
    Transit,
    /// Valid address not covered by any registry entry
    Unknown,
}

impl Owner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerLan => "customer_lan",
            Self::Pop => "pop",
            Self::Core => "core",
            Self::Transit => "transit",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registry record as written in the preferences file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipEntry {
    pub cidr: String,
    pub owner: Owner,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl OwnershipEntry {
    pub fn new(cidr: impl Into<String>, owner: Owner, label: impl Into<String>) -> Self {
        Self {
            cidr: cidr.into(),
            owner,
            label: label.into(),
            city: None,
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}

/// Ownership resolved for a single address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub owner: Owner,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Ownership {
    fn unknown() -> Self {
        Self {
            owner: Owner::Unknown,
            label: "Unknown network".to_string(),
            city: None,
        }
    }
}

/// Ordered list of ownership entries; the first containing entry wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipRegistry {
    entries: Vec<OwnershipEntry>,
}

impl OwnershipRegistry {
    pub fn new(entries: Vec<OwnershipEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[OwnershipEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve ownership for an address.
    ///
    /// Returns `None` for strings that are not valid IPv4 addresses, and an
    /// `unknown` ownership for valid addresses no entry covers.
    pub fn lookup(&self, ip: &str) -> Option<Ownership> {
        ip_to_int(ip)?;

        let ownership = self
            .entries
            .iter()
            .find(|entry| cidr_contains(&entry.cidr, ip))
            .map(|entry| Ownership {
                owner: entry.owner,
                label: entry.label.clone(),
                city: entry.city.clone(),
            })
            .unwrap_or_else(Ownership::unknown);

        Some(ownership)
    }

    /// Entries whose CIDR does not parse (they can never match)
    pub fn invalid_entries(&self) -> Vec<&OwnershipEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.cidr.trim().parse::<Ipv4Network>().is_err())
            .collect()
    }

    /// Index pairs `(earlier, later)` of entries whose blocks overlap.
    ///
    /// With first-match lookup the later entry is shadowed for the shared
    /// addresses, which may not be what the operator intended.
    pub fn overlapping_pairs(&self) -> Vec<(usize, usize)> {
        let networks: Vec<Option<Ipv4Network>> = self
            .entries
            .iter()
            .map(|entry| entry.cidr.trim().parse::<Ipv4Network>().ok())
            .collect();

        let mut pairs = Vec::new();
        for (i, a) in networks.iter().enumerate() {
            let Some(a) = a else { continue };
            for (j, b) in networks.iter().enumerate().skip(i + 1) {
                let Some(b) = b else { continue };
                if a.contains(b.network()) || b.contains(a.network()) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Log configuration problems without rejecting the registry
    pub fn warn_on_conflicts(&self) {
        for entry in self.invalid_entries() {
            tracing::warn!(cidr = %entry.cidr, label = %entry.label, "ownership entry has an invalid CIDR and will never match");
        }
        for (earlier, later) in self.overlapping_pairs() {
            tracing::warn!(
                earlier = %self.entries[earlier].cidr,
                later = %self.entries[later].cidr,
                "overlapping ownership entries; the earlier entry wins for shared addresses"
            );
        }
    }
}
