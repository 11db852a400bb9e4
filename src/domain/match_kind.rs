//! `Match`: the battle match category (ranked/casual/festival).

use serde::{Deserialize, Serialize};

/// Renamed from the domain's `Match` to avoid shadowing `std::matches!`/regex
/// "Match" naming collisions elsewhere in the crate; the wire value (`value()`)
/// is still the bare match name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Regular,
    BankaraChallenge,
    BankaraOpen,
    XMatch,
    League,
    Splatfest,
}

impl MatchKind {
    pub const ALL: [MatchKind; 6] = [
        MatchKind::Regular,
        MatchKind::BankaraChallenge,
        MatchKind::BankaraOpen,
        MatchKind::XMatch,
        MatchKind::League,
        MatchKind::Splatfest,
    ];

    pub fn value(&self) -> &'static str {
        match self {
            MatchKind::Regular => "regular",
            MatchKind::BankaraChallenge => "bankara_challenge",
            MatchKind::BankaraOpen => "bankara_open",
            MatchKind::XMatch => "x_match",
            MatchKind::League => "league",
            MatchKind::Splatfest => "splatfest",
        }
    }

    pub fn parse(s: &str) -> Option<MatchKind> {
        Self::ALL.into_iter().find(|m| m.value() == s)
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}
