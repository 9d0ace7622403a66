use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

enum RngSource {
    Seeded(StdRng),
    Scripted { outcomes: Vec<u8>, index: usize },
}

/// The battle's only source of randomness, passed explicitly to every
/// function that rolls.
///
/// Seeded sources are reproducible: the same seed yields the same sequence
/// of rolls. Scripted sources replay a fixed list of 1..=100 outcomes and
/// are meant for tests.
pub struct TurnRng {
    source: RngSource,
}

impl fmt::Debug for TurnRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            RngSource::Seeded(_) => write!(f, "TurnRng::Seeded"),
            RngSource::Scripted { outcomes, index } => {
                write!(f, "TurnRng::Scripted({}/{})", index, outcomes.len())
            }
        }
    }
}

impl TurnRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: RngSource::Seeded(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn new_random() -> Self {
        let seed = rand::rng().random::<u64>();
        Self::from_seed(seed)
    }

    /// Scripted outcomes, each in 1..=100, consumed in order.
    pub fn new_for_test(outcomes: Vec<u8>) -> Self {
        Self {
            source: RngSource::Scripted { outcomes, index: 0 },
        }
    }

    fn next_scripted(outcomes: &[u8], index: &mut usize, reason: &str) -> u8 {
        if *index >= outcomes.len() {
            panic!(
                "TurnRng exhausted! Tried to get a value for: '{}'. Need more random values.",
                reason
            );
        }
        let outcome = outcomes[*index];

        #[cfg(test)]
        println!("[RNG] Consumed {} for: {}", outcome, reason);

        *index += 1;
        outcome
    }

    /// Uniform roll in 1..=100. Percent checks succeed when the roll is at
    /// or below the chance.
    pub fn next_outcome(&mut self, reason: &str) -> u8 {
        match &mut self.source {
            RngSource::Seeded(rng) => {
                let roll = rng.random_range(1..=100u8);
                tracing::trace!(roll, reason, "rng");
                roll
            }
            RngSource::Scripted { outcomes, index } => {
                Self::next_scripted(outcomes, index, reason).clamp(1, 100)
            }
        }
    }

    /// True with `chance` percent probability. Chances of 100 or more still
    /// consume a roll so the sequence stays aligned.
    pub fn chance(&mut self, chance: u8, reason: &str) -> bool {
        self.next_outcome(reason) <= chance
    }

    /// Uniform integer in `low..=high`.
    pub fn range_inclusive(&mut self, low: u8, high: u8, reason: &str) -> u8 {
        if high <= low {
            return low;
        }
        match &mut self.source {
            RngSource::Seeded(rng) => rng.random_range(low..=high),
            RngSource::Scripted { outcomes, index } => {
                let outcome = Self::next_scripted(outcomes, index, reason);
                if (low..=high).contains(&outcome) {
                    outcome
                } else {
                    low + (outcome.saturating_sub(1) % (high - low + 1))
                }
            }
        }
    }

    /// Uniform float in `[0, 100)`. A scripted outcome `n` reads as `n - 0.5`.
    pub fn percent_float(&mut self, reason: &str) -> f64 {
        match &mut self.source {
            RngSource::Seeded(rng) => rng.random::<f64>() * 100.0,
            RngSource::Scripted { outcomes, index } => {
                let outcome = Self::next_scripted(outcomes, index, reason).clamp(1, 100);
                f64::from(outcome) - 0.5
            }
        }
    }

    /// Fair coin. Scripted outcomes at or below 50 come up heads.
    pub fn coin_flip(&mut self, reason: &str) -> bool {
        match &mut self.source {
            RngSource::Seeded(rng) => rng.random_bool(0.5),
            RngSource::Scripted { outcomes, index } => Self::next_scripted(outcomes, index, reason) <= 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = TurnRng::from_seed(42);
        let mut b = TurnRng::from_seed(42);
        for _ in 0..50 {
            assert_eq!(a.next_outcome("a"), b.next_outcome("b"));
            assert_eq!(a.range_inclusive(85, 100, "a"), b.range_inclusive(85, 100, "b"));
            assert_eq!(a.coin_flip("a"), b.coin_flip("b"));
        }
    }

    #[test]
    fn test_seeded_values_stay_in_range() {
        let mut rng = TurnRng::from_seed(7);
        for _ in 0..500 {
            let roll = rng.next_outcome("roll");
            assert!((1..=100).contains(&roll));
            let dmg = rng.range_inclusive(85, 100, "damage");
            assert!((85..=100).contains(&dmg));
            let f = rng.percent_float("crit");
            assert!((0.0..100.0).contains(&f));
        }
    }

    #[test]
    fn test_scripted_outcomes_replay_in_order() {
        let mut rng = TurnRng::new_for_test(vec![10, 90, 2, 51, 50]);
        assert!(rng.chance(10, "first"));
        assert!(!rng.chance(89, "second"));
        assert_eq!(rng.range_inclusive(1, 3, "sleep"), 2);
        assert!(!rng.coin_flip("tie"));
        assert!(rng.coin_flip("tie"));
    }

    #[test]
    fn test_scripted_range_wraps_out_of_range_values() {
        let mut rng = TurnRng::new_for_test(vec![50, 100]);
        // 1 + (49 % 3)
        assert_eq!(rng.range_inclusive(1, 3, "sleep"), 2);
        assert_eq!(rng.range_inclusive(85, 100, "damage"), 100);
    }

    #[test]
    #[should_panic(expected = "TurnRng exhausted")]
    fn test_scripted_exhaustion_panics() {
        let mut rng = TurnRng::new_for_test(vec![]);
        rng.next_outcome("nothing left");
    }
}
