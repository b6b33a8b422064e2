use serde::{Deserialize, Serialize};

/// Source table of a realtime row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeTable {
    Messages,
    Reactions,
}

impl RealtimeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeTable::Messages => "messages",
            RealtimeTable::Reactions => "reactions",
        }
    }
}

impl std::str::FromStr for RealtimeTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "messages" => Ok(RealtimeTable::Messages),
            "reactions" => Ok(RealtimeTable::Reactions),
            _ => Err(format!("Unknown realtime table: {}", s)),
        }
    }
}

impl std::fmt::Display for RealtimeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
