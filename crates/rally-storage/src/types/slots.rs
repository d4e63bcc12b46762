//! Recurring weekly slots and vote list placement.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the club's recurring weekly play slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKey {
    Wednesday,
    Thursday,
    Saturday,
    Sunday,
}

impl SlotKey {
    pub const ALL: [SlotKey; 4] = [
        SlotKey::Wednesday,
        SlotKey::Thursday,
        SlotKey::Saturday,
        SlotKey::Sunday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKey::Wednesday => "wednesday",
            SlotKey::Thursday => "thursday",
            SlotKey::Saturday => "saturday",
            SlotKey::Sunday => "sunday",
        }
    }

    /// Days between the Monday that opens voting and the slot's play day.
    pub fn days_from_monday(&self) -> u32 {
        match self {
            SlotKey::Wednesday => 2,
            SlotKey::Thursday => 3,
            SlotKey::Saturday => 5,
            SlotKey::Sunday => 6,
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing SlotKey from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSlotKeyError(pub String);

impl std::fmt::Display for ParseSlotKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid slot key: {}", self.0)
    }
}

impl std::error::Error for ParseSlotKeyError {}

impl FromStr for SlotKey {
    type Err = ParseSlotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wednesday" => Ok(SlotKey::Wednesday),
            "thursday" => Ok(SlotKey::Thursday),
            "saturday" => Ok(SlotKey::Saturday),
            "sunday" => Ok(SlotKey::Sunday),
            _ => Err(ParseSlotKeyError(s.to_string())),
        }
    }
}

/// Which list of a session a vote is counted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Main,
    Waitlist,
}

impl ListKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Main => "main",
            ListKind::Waitlist => "waitlist",
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing ListKind from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseListKindError(pub String);

impl std::fmt::Display for ParseListKindError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid list kind: {}", self.0)
    }
}

impl std::error::Error for ParseListKindError {}

impl FromStr for ListKind {
    type Err = ParseListKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(ListKind::Main),
            "waitlist" => Ok(ListKind::Waitlist),
            _ => Err(ParseListKindError(s.to_string())),
        }
    }
}
