//! `GameMode`: the top-level split between battle and salmon run sessions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Battle,
    Salmon,
}

impl Default for GameMode {
    fn default() -> Self {
        GameMode::Battle
    }
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Battle => "battle",
            GameMode::Salmon => "salmon",
        }
    }

    pub fn parse(s: &str) -> Option<GameMode> {
        match s {
            "battle" => Some(GameMode::Battle),
            "salmon" => Some(GameMode::Salmon),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
