use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Draft,
    Signed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::Signed => "signed",
        }
    }

    /// Lenient parse used at storage and network boundaries; unknown values read as draft.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "signed" => RecordStatus::Signed,
            _ => RecordStatus::Draft,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, RecordStatus::Signed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(RecordStatus::Draft),
            "signed" => Ok(RecordStatus::Signed),
            other => Err(format!("Unknown record status: {other}")),
        }
    }
}
