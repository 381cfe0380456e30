use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the consigner is new to the shop or already holds a consigner number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsignerType {
    New,
    Existing,
}

impl ConsignerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsignerType::New => "new",
            ConsignerType::Existing => "existing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(ConsignerType::New),
            "existing" => Some(ConsignerType::Existing),
            _ => None,
        }
    }
}

impl fmt::Display for ConsignerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
