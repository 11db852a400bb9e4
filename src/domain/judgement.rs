//! `Judgement`: the win/lose/unknown outcome of a battle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judgement {
    Win,
    Lose,
    Unknown,
}

impl Judgement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgement::Win => "win",
            Judgement::Lose => "lose",
            Judgement::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Judgement {
        match s {
            "win" => Judgement::Win,
            "lose" => Judgement::Lose,
            _ => Judgement::Unknown,
        }
    }
}

impl std::fmt::Display for Judgement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
