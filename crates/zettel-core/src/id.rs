//! Note identifiers
//!
//! A note is named by exactly 14 decimal digits, conventionally the local
//! timestamp `YYYYMMDDHHMMSS` of its creation. The textual form sorts in
//! creation order, and every identifier that parses renders back to the
//! identical string.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of digits in a rendered identifier
pub const ID_LEN: usize = 14;

const MAX_ID: u64 = 99_999_999_999_999;

/// Error returned when text is not a valid note identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid note id '{0}': expected 14 digits, not all zero")]
pub struct IdError(pub String);

/// Identifier of a note
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(u64);

impl NoteId {
    /// Sentinel carried by entries that do not exist
    pub const INVALID: NoteId = NoteId(0);

    /// Parse a 14-digit identifier
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.len() != ID_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError(s.to_string()));
        }
        let value: u64 = s.parse().map_err(|_| IdError(s.to_string()))?;
        if value == 0 {
            return Err(IdError(s.to_string()));
        }
        Ok(NoteId(value))
    }

    /// Build an identifier from a timestamp.
    ///
    /// With `with_seconds == false` the seconds field is rendered as `00`.
    pub fn from_datetime(dt: &NaiveDateTime, with_seconds: bool) -> Self {
        let year = u64::try_from(dt.year()).unwrap_or(0);
        let seconds = if with_seconds { u64::from(dt.second()) } else { 0 };
        let value = year * 10_000_000_000
            + u64::from(dt.month()) * 100_000_000
            + u64::from(dt.day()) * 1_000_000
            + u64::from(dt.hour()) * 10_000
            + u64::from(dt.minute()) * 100
            + seconds;
        NoteId(value)
    }

    /// Identifier for the current local time
    pub fn now(with_seconds: bool) -> Self {
        Self::from_datetime(&Local::now().naive_local(), with_seconds)
    }

    /// True unless this is the sentinel or out of the 14-digit range
    pub fn is_valid(&self) -> bool {
        self.0 > 0 && self.0 <= MAX_ID
    }

    /// Numeric value of the identifier
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:014}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NoteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NoteId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Produces candidate identifiers for newly allocated notes
///
/// The directory asks for a primary candidate first and for forced
/// candidates after a collision.
pub trait IdSource: Send + Sync {
    /// Next candidate identifier
    fn candidate(&self, forced: bool) -> NoteId;
}

/// Candidate source backed by the local clock
///
/// Primary candidates have minute resolution (seconds rendered as `00`).
/// Forced candidates carry the current second and never repeat: within one
/// second they continue from the last forced value, so concurrent callers
/// never wait for the clock.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_forced: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next forced candidate given the current time as an id value
    fn next_forced(&self, now: u64) -> NoteId {
        let mut last = self.last_forced.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1).min(MAX_ID);
            match self.last_forced.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return NoteId(next),
                Err(current) => last = current,
            }
        }
    }
}

impl IdSource for SystemClock {
    fn candidate(&self, forced: bool) -> NoteId {
        if forced {
            self.next_forced(NoteId::now(true).value())
        } else {
            NoteId::now(false)
        }
    }
}
