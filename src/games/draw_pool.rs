//! Draw-without-replacement over 1..=75

use crate::errors::{RoundError, RoundResult};
use crate::games::types::{BingoLetter, MAX_NUMBER};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// One entry of the draw history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnNumber {
    pub number: u8,
    /// 1-based position in the history
    pub sequence: usize,
    pub drawn_at: DateTime<Utc>,
}

impl DrawnNumber {
    pub fn label(&self) -> String {
        BingoLetter::label(self.number).unwrap_or_default()
    }
}

/// Append-only history of distinct draws for one round
pub struct DrawPool {
    history: Vec<DrawnNumber>,
    /// Bit `n` set once `n` has been drawn
    called: u128,
    rng: StdRng,
}

impl DrawPool {
    /// Pool drawing from OS entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Pool with a reproducible draw order
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            history: Vec::with_capacity(MAX_NUMBER as usize),
            called: 0,
            rng,
        }
    }

    pub fn is_drawn(&self, number: u8) -> bool {
        number <= MAX_NUMBER && self.called & (1u128 << number) != 0
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn remaining(&self) -> usize {
        MAX_NUMBER as usize - self.history.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn history(&self) -> &[DrawnNumber] {
        &self.history
    }

    pub fn numbers(&self) -> Vec<u8> {
        self.history.iter().map(|d| d.number).collect()
    }

    pub fn last(&self) -> Option<&DrawnNumber> {
        self.history.last()
    }

    /// Draw uniformly from the numbers not yet called. `None` once exhausted.
    pub fn draw_next(&mut self) -> Option<DrawnNumber> {
        let available: Vec<u8> = (1..=MAX_NUMBER).filter(|n| !self.is_drawn(*n)).collect();
        let number = *available.choose(&mut self.rng)?;
        Some(self.append(number))
    }

    /// Record a specific number called by an operator
    pub fn draw_specific(&mut self, number: u8) -> RoundResult<DrawnNumber> {
        if number == 0 || number > MAX_NUMBER {
            return Err(RoundError::NumberOutOfRange(number));
        }
        if self.is_drawn(number) {
            return Err(RoundError::NumberAlreadyDrawn(number));
        }
        Ok(self.append(number))
    }

    fn append(&mut self, number: u8) -> DrawnNumber {
        self.called |= 1u128 << number;
        let drawn = DrawnNumber {
            number,
            sequence: self.history.len() + 1,
            drawn_at: Utc::now(),
        };
        self.history.push(drawn);
        drawn
    }
}

impl Default for DrawPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_draws_every_number_once() {
        let mut pool = DrawPool::new();
        let mut seen = HashSet::new();

        while let Some(drawn) = pool.draw_next() {
            assert!(seen.insert(drawn.number), "duplicate draw {}", drawn.number);
            assert_eq!(drawn.sequence, seen.len());
        }

        assert_eq!(seen.len(), 75);
        assert!(pool.is_exhausted());
        assert_eq!(pool.draw_next(), None);
        assert_eq!(pool.len(), 75);
    }

    #[test]
    fn test_specific_draws() {
        let mut pool = DrawPool::new();
        let drawn = pool.draw_specific(7).unwrap();
        assert_eq!(drawn.label(), "B-7");
        assert!(pool.is_drawn(7));
        assert!(!pool.is_drawn(8));

        assert_eq!(pool.draw_specific(7), Err(RoundError::NumberAlreadyDrawn(7)));
        assert_eq!(pool.draw_specific(0), Err(RoundError::NumberOutOfRange(0)));
        assert_eq!(pool.draw_specific(76), Err(RoundError::NumberOutOfRange(76)));
        assert_eq!(pool.numbers(), vec![7]);
        assert_eq!(pool.remaining(), 74);
    }

    #[test]
    fn test_random_draw_skips_called_numbers() {
        let mut pool = DrawPool::with_seed(3);
        for n in 1..=74 {
            pool.draw_specific(n).unwrap();
        }
        assert_eq!(pool.draw_next().map(|d| d.number), Some(75));
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_seeded_pools_repeat() {
        let mut a = DrawPool::with_seed(99);
        let mut b = DrawPool::with_seed(99);
        for _ in 0..20 {
            assert_eq!(
                a.draw_next().map(|d| d.number),
                b.draw_next().map(|d| d.number)
            );
        }
    }

    proptest! {
        #[test]
        fn prop_history_never_duplicates(seed in any::<u64>(), manual in proptest::collection::vec(1u8..=75, 0..40)) {
            let mut pool = DrawPool::with_seed(seed);
            for n in manual {
                let _ = pool.draw_specific(n);
                let _ = pool.draw_next();
            }
            let numbers = pool.numbers();
            let distinct: HashSet<u8> = numbers.iter().copied().collect();
            prop_assert_eq!(distinct.len(), numbers.len());
            prop_assert!(numbers.len() <= 75);
        }
    }
}
