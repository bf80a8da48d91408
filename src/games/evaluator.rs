//! Win pattern detection
//!
//! Patterns are checked in a fixed priority: rows top to bottom, columns
//! left to right, main diagonal, anti-diagonal, then the four corners. Each
//! check is an independent subset test against the card's coverage mask.

use crate::games::card::{Card, FREE_CELL, GRID};
use crate::games::types::{Diagonal, WinPattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const fn row_mask(row: usize) -> u32 {
    0b11111 << (row * GRID)
}

const fn column_mask(col: usize) -> u32 {
    let mut mask = 0;
    let mut row = 0;
    while row < GRID {
        mask |= 1 << (row * GRID + col);
        row += 1;
    }
    mask
}

const fn cells_mask(cells: &[usize]) -> u32 {
    let mut mask = 0;
    let mut i = 0;
    while i < cells.len() {
        mask |= 1 << cells[i];
        i += 1;
    }
    mask
}

const MAIN_DIAGONAL: u32 = cells_mask(&[0, 6, 12, 18, 24]);
const ANTI_DIAGONAL: u32 = cells_mask(&[4, 8, 12, 16, 20]);
const CORNERS: u32 = cells_mask(&[0, 4, 20, 24]);

/// Every pattern with its cell mask, in evaluation order
fn patterns() -> impl Iterator<Item = (WinPattern, u32)> {
    let rows = (0..GRID).map(|r| (WinPattern::Row(r as u8), row_mask(r)));
    let columns = (0..GRID).map(|c| (WinPattern::Column(c as u8), column_mask(c)));
    let rest = [
        (WinPattern::Diagonal(Diagonal::Main), MAIN_DIAGONAL),
        (WinPattern::Diagonal(Diagonal::Anti), ANTI_DIAGONAL),
        (WinPattern::FourCorners, CORNERS),
    ];
    rows.chain(columns).chain(rest)
}

/// Numbers a player has confirmed on one card. The free space is implied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcknowledgedSet(BTreeSet<u8>);

impl AcknowledgedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the number was newly added
    pub fn insert(&mut self, number: u8) -> bool {
        self.0.insert(number)
    }

    pub fn contains(&self, number: u8) -> bool {
        self.0.contains(&number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.iter().copied().collect()
    }
}

impl FromIterator<u8> for AcknowledgedSet {
    fn from_iter<T: IntoIterator<Item = u8>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of evaluating one card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinCheck {
    pub won: bool,
    pub pattern: Option<WinPattern>,
}

impl WinCheck {
    fn miss() -> Self {
        Self {
            won: false,
            pattern: None,
        }
    }

    fn hit(pattern: WinPattern) -> Self {
        Self {
            won: true,
            pattern: Some(pattern),
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        self.pattern.map(|p| p.label())
    }
}

/// Bitmask of covered cells: acknowledged numbers on the card plus the free space
pub fn coverage(card: &Card, acknowledged: &AcknowledgedSet) -> u32 {
    let mut mask = 1 << FREE_CELL;
    for (idx, &number) in card.cells().iter().enumerate() {
        if acknowledged.contains(number) {
            mask |= 1 << idx;
        }
    }
    mask
}

/// Check `card` against `acknowledged` and report the first pattern satisfied
pub fn evaluate(card: &Card, acknowledged: &AcknowledgedSet) -> WinCheck {
    let covered = coverage(card, acknowledged);
    patterns()
        .find(|(_, mask)| covered & mask == *mask)
        .map(|(pattern, _)| WinCheck::hit(pattern))
        .unwrap_or_else(WinCheck::miss)
}
