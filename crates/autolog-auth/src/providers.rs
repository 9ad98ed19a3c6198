//! Side-effect providers consumed by the issuer and verifiers
//!
//! Time, randomness and credential checks are injected through these traits
//! so token lifetimes can be tested against a fixed clock and issuance can be
//! exercised without a user database.

use std::fmt::Debug;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{AuthError, Result};

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    /// Current instant in UTC
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant, for deterministic expiry tests
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move the clock forward by `delta`
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Source of unique identifiers (token ids)
pub trait IdGenerator: Send + Sync + Debug {
    /// A fresh random UUID rendered as a string
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::IdGeneration`] if the entropy source fails.
    fn random_uuid(&self) -> Result<String>;
}

/// UUID v4 generator backed by the OS RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn random_uuid(&self) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

/// Generator that hands out a fixed sequence, then fails
#[derive(Debug)]
pub struct SequenceIdGenerator {
    ids: Mutex<std::collections::VecDeque<String>>,
}

impl SequenceIdGenerator {
    /// Create a generator yielding `ids` in order
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn random_uuid(&self) -> Result<String> {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| AuthError::IdGeneration("id sequence exhausted".to_string()))
    }
}

/// Checks login credentials against the user store
///
/// Implemented by the user service; the issuer only calls it once per login,
/// before any token is minted.
#[async_trait]
pub trait CredentialValidator: Send + Sync + Debug {
    /// Validate `identifier` (username or email) and `password`
    ///
    /// Returns `Some(user_id)` when the credentials match, `None` when they
    /// do not.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidArgument`] for blank input,
    /// [`AuthError::MissingConfiguration`] when the store is not wired, and
    /// [`AuthError::Credentials`] when the store itself fails.
    async fn validate_credentials(&self, identifier: &str, password: &str)
    -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_fixed_clock_set_and_advance() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now_utc(), start);

        clock.advance(Duration::minutes(31));
        assert_eq!(clock.now_utc(), start + Duration::minutes(31));

        clock.set(start);
        assert_eq!(clock.now_utc(), start);
    }

    #[test]
    fn test_uuid_generator_unique() {
        let ids = UuidGenerator;
        let a = ids.random_uuid().unwrap();
        let b = ids.random_uuid().unwrap();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_sequence_generator_exhausts() {
        let ids = SequenceIdGenerator::new(["one", "two"]);
        assert_eq!(ids.random_uuid().unwrap(), "one");
        assert_eq!(ids.random_uuid().unwrap(), "two");
        assert!(matches!(ids.random_uuid(), Err(AuthError::IdGeneration(_))));
    }

    #[test]
    fn test_system_clock_is_utc_now() {
        let before = Utc::now();
        let now = SystemClock.now_utc();
        assert!(now >= before);
    }
}
