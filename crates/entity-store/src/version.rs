use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when an integer cannot be a version stamp, either because it is
/// negative or because the stamp has no next revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid version stamp {value}: must be non-negative and below i64::MAX")]
pub struct InvalidValueError {
    pub value: i64,
}

/// Revision counter of an entity, used for optimistic concurrency control.
///
/// A freshly persisted entity is at version 1. Every successful write
/// advances the stamp by exactly one; the stamp never goes backwards.
/// Stamps are values: `increment` returns a new stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct VersionStamp(i64);

impl VersionStamp {
    /// Returns the version of a freshly persisted entity (1).
    pub fn initial() -> Self {
        Self(1)
    }

    /// Builds a stamp from a stored integer.
    pub fn from_int(value: i64) -> Result<Self, InvalidValueError> {
        if value < 0 {
            return Err(InvalidValueError { value });
        }
        Ok(Self(value))
    }

    /// Returns true if both stamps carry the same revision.
    pub fn equals(&self, other: &VersionStamp) -> bool {
        self.0 == other.0
    }

    /// Returns the next revision, failing once the counter is exhausted.
    pub fn increment(&self) -> Result<Self, InvalidValueError> {
        self.0
            .checked_add(1)
            .map(Self)
            .ok_or(InvalidValueError { value: self.0 })
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Default for VersionStamp {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for VersionStamp {
    type Error = InvalidValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_int(value)
    }
}

impl From<VersionStamp> for i64 {
    fn from(version: VersionStamp) -> Self {
        version.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_is_one() {
        assert_eq!(VersionStamp::initial().as_i64(), 1);
        assert_eq!(VersionStamp::default(), VersionStamp::initial());
    }

    #[test]
    fn from_int_rejects_negative() {
        assert_eq!(
            VersionStamp::from_int(-1),
            Err(InvalidValueError { value: -1 })
        );
        assert_eq!(VersionStamp::from_int(0).unwrap().as_i64(), 0);
    }

    #[test]
    fn increment_returns_new_stamp() {
        let v1 = VersionStamp::initial();
        let v2 = v1.increment().unwrap();
        assert_eq!(v1.as_i64(), 1);
        assert_eq!(v2.as_i64(), 2);
        assert!(v1 < v2);
        assert!(!v1.equals(&v2));
        assert!(v2.equals(&VersionStamp::from_int(2).unwrap()));
    }

    #[test]
    fn increment_refuses_to_overflow() {
        let last = VersionStamp::from_int(i64::MAX).unwrap();
        assert_eq!(last.increment(), Err(InvalidValueError { value: i64::MAX }));
    }

    #[test]
    fn deserialization_rejects_negative() {
        let result: Result<VersionStamp, _> = serde_json::from_str("-3");
        assert!(result.is_err());

        let stamp: VersionStamp = serde_json::from_str("4").unwrap();
        assert_eq!(stamp.as_i64(), 4);
    }
}
