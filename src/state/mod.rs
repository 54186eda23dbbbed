pub mod hop;
pub mod probe;

pub use hop::*;
pub use probe::*;
