pub mod findings;
pub mod scenario;
pub mod target;

pub use findings::*;
pub use scenario::*;
pub use target::*;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Unknown scenario '{0}' (expected sip-blocked, web-allowed, udp-filtered, rtp-range or asymmetric-filtering)")]
    UnknownScenario(String),
}
