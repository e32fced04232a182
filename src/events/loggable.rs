use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for activity logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Account, audit and claim changes
    Critical,
    #[default]
    Important,
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "important" => Ok(Severity::Important),
            "noise" => Ok(Severity::Noise),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Entities that can be written to the activity log.
pub trait Loggable: Serialize + Send + Sync {
    /// Prefix of event names, e.g. "report" in "report.created"
    fn entity_type() -> &'static str;

    fn subject_id(&self) -> Uuid;

    fn severity(&self) -> Severity {
        Severity::Important
    }

    fn severity_for_action(&self, action: &str) -> Severity {
        match action {
            "deleted" => Severity::Critical,
            "created" | "updated" => self.severity(),
            _ => Severity::Important,
        }
    }
}
