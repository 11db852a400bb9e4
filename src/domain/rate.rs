//! `Rate`: a player's skill rating, either XP (a continuous number) or
//! Udemae (an ordered rank). Grounded on the source's `RateBase`/`XP`/`Udemae`
//! value objects: same-variant rates have a total order, cross-variant
//! comparison is an error rather than a silent fallback.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const MIN_XP: f64 = 500.0;
const MAX_XP: f64 = 5500.0;

/// Ranks ordered from lowest to highest; index is the rank's order key.
const UDEMAE_ORDER: [&str; 11] = [
    "C-", "C", "C+", "B-", "B", "B+", "A-", "A", "A+", "S", "S+",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Rate {
    #[serde(rename = "XP")]
    Xp(f64),
    #[serde(rename = "Udemae")]
    Udemae(String),
}

impl Rate {
    pub fn xp(value: f64) -> Result<Rate, AppError> {
        if !(MIN_XP..=MAX_XP).contains(&value) {
            return Err(AppError::Validation(format!(
                "XP must be between {MIN_XP} and {MAX_XP}, got {value}"
            )));
        }
        Ok(Rate::Xp(value))
    }

    pub fn udemae(rank: impl Into<String>) -> Result<Rate, AppError> {
        let rank = rank.into();
        if !UDEMAE_ORDER.contains(&rank.as_str()) {
            return Err(AppError::Validation(format!("invalid Udemae rank: {rank}")));
        }
        Ok(Rate::Udemae(rank))
    }

    /// Best-effort construction from a loosely-typed value: numeric-looking
    /// strings become XP, everything else is parsed as an Udemae rank.
    pub fn create(value: &str) -> Result<Rate, AppError> {
        match value.parse::<f64>() {
            Ok(xp) => Rate::xp(xp),
            Err(_) => Rate::udemae(value),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rate::Xp(_) => "XP",
            Rate::Udemae(_) => "Udemae",
        }
    }

    fn udemae_rank_index(rank: &str) -> Option<usize> {
        UDEMAE_ORDER.iter().position(|r| *r == rank)
    }

    /// Compares two rates of the *same* variant. Cross-variant comparison is
    /// a validation error, mirroring `compare_rate`'s `TypeError`.
    pub fn compare(&self, other: &Rate) -> Result<Ordering, AppError> {
        match (self, other) {
            (Rate::Xp(a), Rate::Xp(b)) => {
                Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal))
            }
            (Rate::Udemae(a), Rate::Udemae(b)) => {
                let (ia, ib) = (
                    Self::udemae_rank_index(a)
                        .ok_or_else(|| AppError::Validation(format!("invalid Udemae rank: {a}")))?,
                    Self::udemae_rank_index(b)
                        .ok_or_else(|| AppError::Validation(format!("invalid Udemae rank: {b}")))?,
                );
                Ok(ia.cmp(&ib))
            }
            _ => Err(AppError::Validation(
                "cannot compare XP and Udemae rates".to_string(),
            )),
        }
    }

    pub fn short_str(&self) -> String {
        match self {
            Rate::Xp(xp) => ((*xp as i64) / 100).to_string(),
            Rate::Udemae(rank) => rank.clone(),
        }
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rate::Xp(xp) => write!(f, "{xp}"),
            Rate::Udemae(rank) => write!(f, "{rank}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xp_out_of_range_is_validation_error() {
        assert!(matches!(Rate::xp(100.0), Err(AppError::Validation(_))));
        assert!(matches!(Rate::xp(6000.0), Err(AppError::Validation(_))));
    }

    #[test]
    fn same_variant_total_order() {
        let low = Rate::xp(1000.0).unwrap();
        let high = Rate::xp(2000.0).unwrap();
        assert_eq!(low.compare(&high).unwrap(), Ordering::Less);

        let b = Rate::udemae("B").unwrap();
        let s_plus = Rate::udemae("S+").unwrap();
        assert_eq!(b.compare(&s_plus).unwrap(), Ordering::Less);
    }

    #[test]
    fn cross_variant_compare_is_error() {
        let xp = Rate::xp(1000.0).unwrap();
        let udemae = Rate::udemae("A").unwrap();
        assert!(xp.compare(&udemae).is_err());
    }

    #[test]
    fn create_prefers_numeric_as_xp() {
        assert_eq!(Rate::create("2200").unwrap(), Rate::Xp(2200.0));
        assert_eq!(Rate::create("A+").unwrap(), Rate::Udemae("A+".to_string()));
    }
}
