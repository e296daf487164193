use crate::constraint::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scheduling policy of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "ASAP")]
    Asap,
    #[serde(rename = "ALAP")]
    Alap,
}

const ALAP_TRIGGERS: [&str; 8] = [
    "alap",
    "as late as possible",
    "backward schedul",
    "just in time",
    "jit",
    "minimize inventory",
    "reduce wip",
    "latest",
];

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Asap => "ASAP",
            Algorithm::Alap => "ALAP",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Algorithm::Asap => Direction::Forward,
            Algorithm::Alap => Direction::Backward,
        }
    }

    /// Map a free-text request ("run alap", "schedule just in time") to a
    /// policy. ALAP phrasing wins; anything else means ASAP.
    pub fn from_intent(message: &str) -> Self {
        let message = message.to_lowercase();
        let alap = ALAP_TRIGGERS.iter().any(|trigger| {
            if *trigger == "jit" {
                message
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|word| word == "jit")
            } else {
                message.contains(trigger)
            }
        });
        if alap { Algorithm::Alap } else { Algorithm::Asap }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asap" | "forward" | "forward-scheduling" => Ok(Algorithm::Asap),
            "alap" | "backward" | "backward-scheduling" | "jit" => Ok(Algorithm::Alap),
            other => Err(format!("unknown scheduling algorithm '{other}'")),
        }
    }
}
