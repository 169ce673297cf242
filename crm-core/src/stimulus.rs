use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseValueError {
    #[error("unknown CRM colour {0:?}")]
    Colour(String),
    #[error("CRM number {0:?} is not in 1..=10")]
    Number(String),
    #[error("expected \"<colour> <number>\", got {0:?}")]
    Button(String),
}

/// Colours spoken in CRM phrases.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colour {
    White,
    Green,
    Red,
    Blue,
}

impl Colour {
    /// Response-grid row order.
    pub const ALL: [Colour; 4] = [Colour::White, Colour::Green, Colour::Red, Colour::Blue];

    pub fn as_str(&self) -> &'static str {
        match self {
            Colour::White => "white",
            Colour::Green => "green",
            Colour::Red => "red",
            Colour::Blue => "blue",
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts surrounding whitespace and any letter case, so a stored value and a
/// freshly typed one always compare as the same scalar.
impl FromStr for Colour {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Colour::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseValueError::Colour(s.to_string()))
    }
}

/// A spoken CRM number, 1 through 10 (the corpus uses 1..=7 by default).
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CrmNumber(u8);

impl CrmNumber {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    const WORDS: [&'static str; 10] = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    ];

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// The word used in stimulus file names ("one", "two", ...).
    pub fn word(&self) -> &'static str {
        Self::WORDS[usize::from(self.0 - 1)]
    }
}

impl TryFrom<u8> for CrmNumber {
    type Error = ParseValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        CrmNumber::new(value).ok_or_else(|| ParseValueError::Number(value.to_string()))
    }
}

impl From<CrmNumber> for u8 {
    fn from(n: CrmNumber) -> u8 {
        n.0
    }
}

impl FromStr for CrmNumber {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(CrmNumber::new)
            .ok_or_else(|| ParseValueError::Number(s.to_string()))
    }
}

impl fmt::Display for CrmNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a recorded CRM talker (the corpus directory is `Talker<n>`).
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Talker(pub u8);

impl fmt::Display for Talker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Talkers are split by gender; a trial never mixes groups.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TalkerGroup {
    Male,
    Female,
}

impl TalkerGroup {
    pub const ALL: [TalkerGroup; 2] = [TalkerGroup::Male, TalkerGroup::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            TalkerGroup::Male => "M",
            TalkerGroup::Female => "F",
        }
    }
}

/// Opaque identifier of a stimulus asset, as handed back by a resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StimulusId(String);

impl StimulusId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StimulusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cell of the colour × number response grid.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponseButton {
    pub colour: Colour,
    pub number: CrmNumber,
}

impl ResponseButton {
    pub fn new(colour: Colour, number: CrmNumber) -> Self {
        Self { colour, number }
    }

    /// Every button, row by colour then column by number.
    pub fn grid(colours: &[Colour], numbers: &[CrmNumber]) -> Vec<ResponseButton> {
        colours
            .iter()
            .flat_map(|&colour| numbers.iter().map(move |&number| Self::new(colour, number)))
            .collect()
    }
}

impl fmt::Display for ResponseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.colour, self.number)
    }
}

impl FromStr for ResponseButton {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(colour), Some(number), None) => Ok(Self {
                colour: colour.parse()?,
                number: number.parse()?,
            }),
            _ => Err(ParseValueError::Button(s.to_string())),
        }
    }
}
