pub mod csv;
pub mod json;
pub mod report;
pub mod text;

pub use csv::*;
pub use json::*;
pub use report::*;
pub use text::*;
