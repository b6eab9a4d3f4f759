// Per-request memoization of player scores.
//
// Projections must not change while a cache is alive: a player's stats are
// not part of the key.
// Entries are written at most once per (rule fingerprint, player id). Two
// solvers racing on the same missing key may both compute it; the first
// insert wins and both read the same value back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::roster::Player;

use super::rule::ScoringRule;

#[derive(Debug, Default)]
pub struct ScoreCache {
    /// rule fingerprint -> player id -> score
    entries: RwLock<HashMap<u64, HashMap<String, f64>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score `player` under `rule`, reusing a previously published value when
    /// one exists. `fingerprint` must be `rule.fingerprint()`; it is passed in
    /// so callers hash the rule once per solve instead of once per player.
    pub fn score(&self, player: &Player, rule: &ScoringRule, fingerprint: u64) -> f64 {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let cached = entries
                .get(&fingerprint)
                .and_then(|scores| scores.get(player.id.as_str()));
            if let Some(&v) = cached {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return v;
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = rule.evaluate(player);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        *entries
            .entry(fingerprint)
            .or_default()
            .entry(player.id.clone())
            .or_insert(computed)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (hits, misses) since the cache was created.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Position;
    use std::sync::Arc;

    fn back(id: &str, yards: f64) -> Player {
        Player::new(id, id, Position::RunningBack, "DAL").with_stat("rush_yds", yards)
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = ScoreCache::new();
        let rule = ScoringRule::ppr();
        let fp = rule.fingerprint();
        let p = back("rb1", 100.0);

        let a = cache.score(&p, &rule, fp);
        let b = cache.score(&p, &rule, fp);
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_rules_are_cached_separately() {
        let cache = ScoreCache::new();
        let ppr = ScoringRule::ppr();
        let doubled = ScoringRule::new("double").with_multiplier("rush_yds", 0.2);
        let p = back("rb1", 100.0);

        let a = cache.score(&p, &ppr, ppr.fingerprint());
        let b = cache.score(&p, &doubled, doubled.fingerprint());
        assert!((a - 10.0).abs() < 1e-9);
        assert!((b - 20.0).abs() < 1e-9);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_readers_agree() {
        let cache = Arc::new(ScoreCache::new());
        let rule = Arc::new(ScoringRule::ppr());
        let fp = rule.fingerprint();
        let players: Arc<Vec<Player>> =
            Arc::new((0..20).map(|i| back(&format!("rb{i}"), i as f64 * 10.0)).collect());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let rule = Arc::clone(&rule);
                let players = Arc::clone(&players);
                std::thread::spawn(move || {
                    players
                        .iter()
                        .map(|p| cache.score(p, &rule, fp))
                        .collect::<Vec<f64>>()
                })
            })
            .collect();

        let results: Vec<Vec<f64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(cache.len(), 20);
    }
}
