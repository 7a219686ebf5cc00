use serde::{Deserialize, Serialize};

/// Default Work phase length in minutes.
pub const DEFAULT_WORK_MINUTES: u32 = 30;
/// Default Rest phase length in minutes.
pub const DEFAULT_REST_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    Work,
    Rest,
}

impl PhaseKind {
    /// The phase that follows this one when it completes naturally.
    pub fn flipped(self) -> Self {
        match self {
            PhaseKind::Work => PhaseKind::Rest,
            PhaseKind::Rest => PhaseKind::Work,
        }
    }

    /// Label shown next to the countdown.
    pub fn label(self) -> &'static str {
        match self {
            PhaseKind::Work => "Work Session",
            PhaseKind::Rest => "Break Session",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Work => "Work",
            PhaseKind::Rest => "Rest",
        }
    }

    /// Case-insensitive parse of the stored name.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("work") {
            Some(PhaseKind::Work)
        } else if s.eq_ignore_ascii_case("rest") {
            Some(PhaseKind::Rest)
        } else {
            None
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured Work/Rest lengths in whole minutes.
///
/// Both values are always positive. Anything else supplied by the user
/// (zero, negative, non-numeric) is replaced by the default for that phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    work_minutes: u32,
    rest_minutes: u32,
}

impl PhaseDurations {
    pub fn new(work_minutes: i64, rest_minutes: i64) -> Self {
        Self {
            work_minutes: positive_or(work_minutes, DEFAULT_WORK_MINUTES),
            rest_minutes: positive_or(rest_minutes, DEFAULT_REST_MINUTES),
        }
    }

    /// Build from raw text input, e.g. form fields or CLI flags.
    pub fn from_inputs(work: &str, rest: &str) -> Self {
        Self {
            work_minutes: parse_minutes(work).unwrap_or(DEFAULT_WORK_MINUTES),
            rest_minutes: parse_minutes(rest).unwrap_or(DEFAULT_REST_MINUTES),
        }
    }

    pub fn work_minutes(&self) -> u32 {
        self.work_minutes
    }

    pub fn rest_minutes(&self) -> u32 {
        self.rest_minutes
    }

    pub fn minutes_for(&self, phase: PhaseKind) -> u32 {
        match phase {
            PhaseKind::Work => self.work_minutes,
            PhaseKind::Rest => self.rest_minutes,
        }
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            rest_minutes: DEFAULT_REST_MINUTES,
        }
    }
}

/// Parse a positive whole number of minutes.
///
/// Leading digits are honoured ("25min" -> 25) the way a browser's
/// `parseInt` treats form input; a value with no leading digits, or one
/// that is not positive, yields `None`.
pub fn parse_minutes(input: &str) -> Option<u32> {
    let trimmed = input.trim();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value: i64 = digits[..end].parse().ok()?;
    let value = value.checked_mul(sign)?;
    u32::try_from(value).ok().filter(|v| *v > 0)
}

fn positive_or(value: i64, fallback: u32) -> u32 {
    u32::try_from(value).ok().filter(|v| *v > 0).unwrap_or(fallback)
}
