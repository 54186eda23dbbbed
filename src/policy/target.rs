use regex::Regex;
use std::sync::LazyLock;

use super::PolicyError;
use crate::cidr::ip_to_int;

const MAX_HOSTNAME_LEN: usize = 253;

/// 1-63 alphanumerics or hyphens, not starting or ending with a hyphen
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("label pattern is valid")
});

fn is_valid_hostname(target: &str) -> bool {
    let name = target.strip_suffix('.').unwrap_or(target);
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    name.split('.').all(|label| LABEL_RE.is_match(label))
}

/// Why a target cannot be probed, or `None` when it is acceptable.
///
/// Accepts a dotted-quad IPv4 address or a syntactically valid hostname.
pub fn target_validation_error(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return Some("Enter a target IP address or hostname".to_string());
    }
    if ip_to_int(target).is_some() || is_valid_hostname(target) {
        return None;
    }
    Some(format!(
        "'{}' is not a valid IPv4 address or hostname",
        target
    ))
}

/// Validate a target, returning the trimmed form
pub fn validate_target(target: &str) -> Result<String, PolicyError> {
    match target_validation_error(target) {
        Some(reason) => Err(PolicyError::InvalidTarget(reason)),
        None => Ok(target.trim().to_string()),
    }
}
