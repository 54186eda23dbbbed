pub mod compare;
pub mod insight;
pub mod merge;
pub mod trace;

pub use compare::*;
pub use insight::*;
pub use merge::*;
pub use trace::*;
