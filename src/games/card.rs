//! Deterministic card layouts
//!
//! A card's 25 cells are a pure function of its card number. Each call seeds
//! its own ChaCha20 stream from a SHA-256 digest of the number, so no shared
//! RNG state is touched and the same number yields the same layout in every
//! process.

use crate::errors::{RoundError, RoundResult};
use crate::games::types::{BingoLetter, BAND_SIZE};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const CARD_SEED_DOMAIN: &[u8] = b"bingo-engine:card:v1";

/// Cards are 5x5
pub const GRID: usize = 5;

/// Total cells per card
pub const CELLS: usize = GRID * GRID;

/// Index of the free space (row 2, column 2)
pub const FREE_CELL: usize = 12;

/// A player's 5x5 card, stored row-major
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    number: u32,
    cells: [u8; CELLS],
}

impl Card {
    /// Build a card from an explicit layout (e.g. one restored from storage).
    ///
    /// Every cell must fall in its column's band and no number may repeat.
    pub fn from_cells(number: u32, cells: [u8; CELLS]) -> RoundResult<Self> {
        if number == 0 {
            return Err(RoundError::InvalidCardLayout(
                "card number must be positive".to_string(),
            ));
        }

        let mut seen = 0u128;
        for (idx, &value) in cells.iter().enumerate() {
            let column = idx % GRID;
            match BingoLetter::for_number(value) {
                Some(letter) if letter.column() == column => {}
                _ => {
                    return Err(RoundError::InvalidCardLayout(format!(
                        "cell {} holds {} which is not in column {}",
                        idx, value, column
                    )))
                }
            }
            let bit = 1u128 << value;
            if seen & bit != 0 {
                return Err(RoundError::InvalidCardLayout(format!(
                    "number {} appears twice",
                    value
                )));
            }
            seen |= bit;
        }

        Ok(Self { number, cells })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn cells(&self) -> &[u8; CELLS] {
        &self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> u8 {
        self.cells[row * GRID + col]
    }

    /// Number printed under the free space
    pub fn free_number(&self) -> u8 {
        self.cells[FREE_CELL]
    }

    /// Cell index holding `number`, if it is on this card
    pub fn position(&self, number: u8) -> Option<usize> {
        self.cells.iter().position(|&n| n == number)
    }

    pub fn contains(&self, number: u8) -> bool {
        self.position(number).is_some()
    }

    /// Rows of the card, top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.cells.chunks(GRID)
    }
}

/// Generates cards for numbers in `1..=max_card_number`
#[derive(Debug, Clone, Copy)]
pub struct CardGenerator {
    max_card_number: u32,
}

impl CardGenerator {
    pub fn new(max_card_number: u32) -> Self {
        Self { max_card_number }
    }

    pub fn max_card_number(&self) -> u32 {
        self.max_card_number
    }

    /// Derive the layout for `card_number`
    pub fn generate(&self, card_number: u32) -> RoundResult<Card> {
        if card_number == 0 || card_number > self.max_card_number {
            return Err(RoundError::InvalidCardNumber {
                number: card_number,
                max: self.max_card_number,
            });
        }

        Ok(Card {
            number: card_number,
            cells: layout_for(card_number),
        })
    }
}

fn card_seed(card_number: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(CARD_SEED_DOMAIN);
    hasher.update(card_number.to_be_bytes());
    hasher.finalize().into()
}

fn layout_for(card_number: u32) -> [u8; CELLS] {
    let mut rng = ChaCha20Rng::from_seed(card_seed(card_number));

    // Five distinct picks per band, one band per column
    let mut columns = [[0u8; GRID]; GRID];
    for (col, column) in columns.iter_mut().enumerate() {
        let base = col as u8 * BAND_SIZE + 1;
        let picks = index::sample(&mut rng, BAND_SIZE as usize, GRID);
        for (row, offset) in picks.into_iter().enumerate() {
            column[row] = base + offset as u8;
        }
    }

    let mut cells = [0u8; CELLS];
    for row in 0..GRID {
        for col in 0..GRID {
            cells[row * GRID + col] = columns[col][row];
        }
    }
    cells
}
