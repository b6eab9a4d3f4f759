// Fantasy scoring rules: stat multipliers plus threshold bonuses.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::LineupError;
use crate::roster::Player;

/// A bonus awarded when a projected stat reaches a threshold, e.g.
/// +3 points for 100+ rushing yards.
///
/// Bonuses that share a `tier` name are mutually exclusive: only the
/// satisfied bonus with the highest threshold in that tier applies. Untiered
/// bonuses are additive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBonus {
    pub stat: String,
    pub threshold: f64,
    pub points: f64,
    #[serde(default)]
    pub tier: Option<String>,
}

impl ThresholdBonus {
    fn satisfied_by(&self, player: &Player) -> bool {
        player.stat(&self.stat).is_some_and(|v| v >= self.threshold)
    }
}

/// A league's scoring system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub name: String,
    /// Points per unit of each stat. Negative values penalize (interceptions).
    #[serde(default)]
    pub multipliers: BTreeMap<String, f64>,
    #[serde(default)]
    pub bonuses: Vec<ThresholdBonus>,
}

impl ScoringRule {
    pub fn new(name: &str) -> Self {
        ScoringRule {
            name: name.to_string(),
            multipliers: BTreeMap::new(),
            bonuses: Vec::new(),
        }
    }

    pub fn with_multiplier(mut self, stat: &str, points: f64) -> Self {
        self.multipliers.insert(stat.to_string(), points);
        self
    }

    pub fn with_bonus(mut self, stat: &str, threshold: f64, points: f64) -> Self {
        self.bonuses.push(ThresholdBonus {
            stat: stat.to_string(),
            threshold,
            points,
            tier: None,
        });
        self
    }

    pub fn with_tier_bonus(mut self, tier: &str, stat: &str, threshold: f64, points: f64) -> Self {
        self.bonuses.push(ThresholdBonus {
            stat: stat.to_string(),
            threshold,
            points,
            tier: Some(tier.to_string()),
        });
        self
    }

    /// Standard PPR scoring (points per reception).
    pub fn ppr() -> Self {
        ScoringRule::new("ppr")
            .with_multiplier("pass_yds", 0.04)
            .with_multiplier("pass_td", 4.0)
            .with_multiplier("pass_int", -2.0)
            .with_multiplier("rush_yds", 0.1)
            .with_multiplier("rush_td", 6.0)
            .with_multiplier("rec", 1.0)
            .with_multiplier("rec_yds", 0.1)
            .with_multiplier("rec_td", 6.0)
    }

    /// Every stat name the rule reads, from multipliers and bonuses.
    pub fn referenced_stats(&self) -> BTreeSet<&str> {
        self.multipliers
            .keys()
            .map(String::as_str)
            .chain(self.bonuses.iter().map(|b| b.stat.as_str()))
            .collect()
    }

    /// Structural validation: the rule must reference at least one stat and
    /// every number in it must be finite.
    pub fn validate(&self) -> Result<(), LineupError> {
        if self.multipliers.is_empty() && self.bonuses.is_empty() {
            return Err(self.invalid("rule has no multipliers and no bonuses"));
        }
        if let Some((stat, v)) = self.multipliers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(self.invalid(&format!("multiplier for `{stat}` is not finite ({v})")));
        }
        if let Some(b) = self
            .bonuses
            .iter()
            .find(|b| !b.threshold.is_finite() || !b.points.is_finite())
        {
            return Err(self.invalid(&format!("bonus on `{}` has a non-finite value", b.stat)));
        }
        Ok(())
    }

    /// Validate the rule against the pool it is about to score. A rule whose
    /// stats appear in no player's projection would score everyone at zero,
    /// which is almost always a misconfigured stat vocabulary.
    pub fn validate_against(&self, pool: &[Player]) -> Result<(), LineupError> {
        self.validate()?;
        if pool.is_empty() {
            return Ok(());
        }
        let known = self
            .referenced_stats()
            .into_iter()
            .any(|stat| pool.iter().any(|p| p.projection.contains_key(stat)));
        if !known {
            return Err(self.invalid("rule references no stat present in any player projection"));
        }
        Ok(())
    }

    /// Fantasy points for one player under this rule.
    pub fn score(&self, player: &Player) -> Result<f64, LineupError> {
        self.validate()?;
        Ok(self.evaluate(player))
    }

    /// Points without validation. Callers must have validated the rule.
    pub(crate) fn evaluate(&self, player: &Player) -> f64 {
        let base: f64 = self
            .multipliers
            .iter()
            .filter_map(|(stat, mult)| player.stat(stat).map(|v| v * mult))
            .sum();

        let mut additive = 0.0;
        let mut tiers: BTreeMap<&str, &ThresholdBonus> = BTreeMap::new();
        for bonus in self.bonuses.iter().filter(|b| b.satisfied_by(player)) {
            match bonus.tier.as_deref() {
                None => additive += bonus.points,
                Some(tier) => {
                    let replace = tiers.get(tier).map_or(true, |best| {
                        bonus.threshold > best.threshold
                            || (bonus.threshold == best.threshold && bonus.points > best.points)
                    });
                    if replace {
                        tiers.insert(tier, bonus);
                    }
                }
            }
        }
        let tiered: f64 = tiers.values().map(|b| b.points).sum();

        base + additive + tiered
    }

    /// Identity of the rule's content, used to key memoized scores.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        for (stat, mult) in &self.multipliers {
            stat.hash(&mut hasher);
            mult.to_bits().hash(&mut hasher);
        }
        for b in &self.bonuses {
            b.stat.hash(&mut hasher);
            b.threshold.to_bits().hash(&mut hasher);
            b.points.to_bits().hash(&mut hasher);
            b.tier.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn invalid(&self, message: &str) -> LineupError {
        LineupError::InvalidScoringRule {
            rule: self.name.clone(),
            message: message.to_string(),
        }
    }
}
