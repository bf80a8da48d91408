use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Highest number that can be drawn in a round
pub const MAX_NUMBER: u8 = 75;

/// Numbers per column band (B, I, N, G, O)
pub const BAND_SIZE: u8 = 15;

/// Player identifier as handed to us by the collaborator (chat or wallet id)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(id: u64) -> Self {
        PlayerId(id)
    }
}

/// Round identifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RoundId(pub Uuid);

impl RoundId {
    pub fn new() -> Self {
        RoundId(Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Round lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Waiting,
    Active,
    Finished,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Waiting => write!(f, "waiting"),
            RoundStatus::Active => write!(f, "active"),
            RoundStatus::Finished => write!(f, "finished"),
        }
    }
}

/// How draws advance once a round is active. Fixed at round creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DrawMode {
    /// Draws only happen on explicit calls
    Manual,
    /// A timer draws the next number every `interval_ms`
    Automatic { interval_ms: u64 },
}

impl DrawMode {
    pub fn automatic(interval: Duration) -> Self {
        DrawMode::Automatic {
            interval_ms: interval.as_millis() as u64,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            DrawMode::Manual => None,
            DrawMode::Automatic { interval_ms } => Some(Duration::from_millis(*interval_ms)),
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, DrawMode::Manual)
    }
}

/// Column letter for a drawn number
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BingoLetter {
    B,
    I,
    N,
    G,
    O,
}

impl BingoLetter {
    /// Letter of the band containing `number`, if it is in 1..=75
    pub fn for_number(number: u8) -> Option<Self> {
        match number {
            1..=15 => Some(BingoLetter::B),
            16..=30 => Some(BingoLetter::I),
            31..=45 => Some(BingoLetter::N),
            46..=60 => Some(BingoLetter::G),
            61..=75 => Some(BingoLetter::O),
            _ => None,
        }
    }

    /// Column index (0 for B through 4 for O)
    pub fn column(&self) -> usize {
        *self as usize
    }

    /// Call label such as `B-7` or `N-41`
    pub fn label(number: u8) -> Option<String> {
        Self::for_number(number).map(|letter| format!("{}-{}", letter, number))
    }
}

impl fmt::Display for BingoLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            BingoLetter::B => "B",
            BingoLetter::I => "I",
            BingoLetter::N => "N",
            BingoLetter::G => "G",
            BingoLetter::O => "O",
        };
        write!(f, "{}", letter)
    }
}

/// Which diagonal completed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Diagonal {
    /// Top-left to bottom-right
    Main,
    /// Top-right to bottom-left
    Anti,
}

/// Winning pattern on a card
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "pattern", content = "index", rename_all = "snake_case")]
pub enum WinPattern {
    Row(u8),
    Column(u8),
    Diagonal(Diagonal),
    FourCorners,
}

impl WinPattern {
    /// Short label used by events and collaborators
    pub fn label(&self) -> &'static str {
        match self {
            WinPattern::Row(_) => "row",
            WinPattern::Column(_) => "column",
            WinPattern::Diagonal(_) => "diagonal",
            WinPattern::FourCorners => "corners",
        }
    }
}

impl fmt::Display for WinPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinPattern::Row(row) => write!(f, "row {} complete", row + 1),
            WinPattern::Column(col) => write!(f, "column {} complete", col + 1),
            WinPattern::Diagonal(Diagonal::Main) => write!(f, "diagonal complete"),
            WinPattern::Diagonal(Diagonal::Anti) => write!(f, "anti-diagonal complete"),
            WinPattern::FourCorners => write!(f, "four corners complete"),
        }
    }
}

/// Winning card reported by a win check
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinResult {
    pub card_number: u32,
    pub pattern: WinPattern,
}

/// Why a round reached `finished`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// A winner was confirmed and the pool settled
    Won,
    /// All 75 numbers were drawn without a winner
    Exhausted,
    /// Operator closed the round
    Closed,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Won => write!(f, "won"),
            FinishReason::Exhausted => write!(f, "exhausted"),
            FinishReason::Closed => write!(f, "closed"),
        }
    }
}
