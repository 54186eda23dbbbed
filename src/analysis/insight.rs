use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightLevel {
    Info,
    Warn,
}

/// A human-readable observation about one or more probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub level: InsightLevel,
    pub title: String,
    pub detail: String,
}

impl Insight {
    pub fn info(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: InsightLevel::Info,
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub fn warn(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            level: InsightLevel::Warn,
            title: title.into(),
            detail: detail.into(),
        }
    }
}
