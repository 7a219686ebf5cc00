use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timer::PhaseKind;

/// Self-reported focus for a Work session, 0 (not rated) through 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FocusRating(u8);

impl FocusRating {
    pub const MAX: u8 = 5;
    pub const UNRATED: FocusRating = FocusRating(0);

    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value > Self::MAX {
            return Err(ValidationError::RatingOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_rated(self) -> bool {
        self.0 > 0
    }
}

impl TryFrom<u8> for FocusRating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FocusRating> for u8 {
    fn from(rating: FocusRating) -> Self {
        rating.0
    }
}

/// One completed or partial phase.
///
/// Immutable once it has been appended to a [`SessionLog`](super::SessionLog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub elapsed_minutes: f64,
    pub phase_kind: PhaseKind,
    #[serde(default)]
    pub focus_rating: FocusRating,
    #[serde(default)]
    pub category: String,
}

impl SessionRecord {
    /// Check the record invariants: non-negative elapsed time and
    /// `end_time >= start_time`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.elapsed_minutes >= 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "elapsed_minutes".into(),
                message: format!("{} is negative", self.elapsed_minutes),
            });
        }
        if self.end_time < self.start_time {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }

    pub fn is_work(&self) -> bool {
        self.phase_kind == PhaseKind::Work
    }

    /// Change the elapsed time, keeping `end_time` and moving `start_time`.
    ///
    /// Rejects negative, non-finite and unrepresentable lengths without
    /// touching the record.
    pub fn set_elapsed_minutes(&mut self, minutes: f64) -> Result<(), ValidationError> {
        let invalid = |message: &str| ValidationError::InvalidValue {
            field: "elapsed_minutes".into(),
            message: format!("{minutes}: {message}"),
        };
        if !minutes.is_finite() || minutes < 0.0 {
            return Err(invalid("must be a finite, non-negative number"));
        }
        let start_time = TimeDelta::try_milliseconds((minutes * 60_000.0).round() as i64)
            .and_then(|elapsed| self.end_time.checked_sub_signed(elapsed))
            .ok_or_else(|| invalid("out of range"))?;
        self.elapsed_minutes = minutes;
        self.start_time = start_time;
        Ok(())
    }
}

/// A record as it sits in a store, with its row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: i64,
    #[serde(flatten)]
    pub record: SessionRecord,
}
