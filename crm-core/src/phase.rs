use serde::{Deserialize, Serialize};
use std::fmt;

/// Experiment phases. A session runs an optional practice deck, then the main table.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Practice,
    Main,
}

impl SessionPhase {
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Practice => Some(Self::Main),
            Self::Main => None,
        }
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, Self::Practice)
    }

    /// Only practice trials tell the listener whether they were right.
    pub fn gives_feedback(&self) -> bool {
        self.is_practice()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Practice => "practice",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
