//! `Rule`: the objective ruleset for a ranked/casual battle.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    TurfWar,
    SplatZones,
    TowerControl,
    Rainmaker,
    ClamBlitz,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::TurfWar,
        Rule::SplatZones,
        Rule::TowerControl,
        Rule::Rainmaker,
        Rule::ClamBlitz,
    ];

    pub fn value(&self) -> &'static str {
        match self {
            Rule::TurfWar => "turf_war",
            Rule::SplatZones => "splat_zones",
            Rule::TowerControl => "tower_control",
            Rule::Rainmaker => "rainmaker",
            Rule::ClamBlitz => "clam_blitz",
        }
    }

    pub fn parse(s: &str) -> Option<Rule> {
        Self::ALL.into_iter().find(|r| r.value() == s)
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}
