pub mod ownership;

pub use ownership::*;

/// Sanitize a string for safe terminal display by removing control characters.
///
/// Hostnames and error strings come from the probe executor verbatim; this strips
/// anything that could inject terminal escape sequences into a report.
pub(crate) fn sanitize_display(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control())
        .collect()
}
