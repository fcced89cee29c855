//! Shared value types for the Insightflow domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. confidence is in `[0.0, 1.0]`, token
//! counts are non-negative integers) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Confidence
// ---------------------------------------------------------------------------

/// A confidence score in the range `[0.0, 1.0]`.
///
/// Every insight carries one. Quality penalties only ever multiply it by
/// factors in `(0, 1]`, so a validated confidence never leaves the range.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Full confidence.
    pub const MAX: Confidence = Confidence(1.0);

    /// Creates a [`Confidence`], returning `None` if `value` is outside
    /// the valid range `[0.0, 1.0]` or not finite.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Creates a [`Confidence`], clamping `value` into `[0.0, 1.0]`.
    ///
    /// NaN maps to `0.0`.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Returns this confidence multiplied by `factor`, clamped into range.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self::clamped(self.0 * factor)
    }

    /// Returns the score as an `f64` in `[0.0, 1.0]`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("confidence {value} is outside [0, 1]"))
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Token usage
// ---------------------------------------------------------------------------

/// Number of tokens consumed by a reasoning call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for TokenCount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Calendar month label in `YYYY-MM` form, used to name monthly epochs.
    pub fn month_label(self) -> String {
        self.0.format("%Y-%m").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rejects_out_of_range_values() {
        assert!(Confidence::new(1.01).is_none());
        assert!(Confidence::new(-0.1).is_none());
        assert!(Confidence::new(f64::NAN).is_none());
        assert_eq!(Confidence::new(0.0).unwrap().as_f64(), 0.0);
    }

    #[test]
    fn scaling_stays_in_range() {
        let c = Confidence::new(0.9).unwrap();
        assert!((c.scaled(0.5).as_f64() - 0.45).abs() < 1e-12);
        assert_eq!(c.scaled(3.0), Confidence::MAX);
    }

    #[test]
    fn confidence_deserialisation_is_checked() {
        assert!(serde_json::from_str::<Confidence>("0.4").is_ok());
        assert!(serde_json::from_str::<Confidence>("4.0").is_err());
    }
}
