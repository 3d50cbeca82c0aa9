use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;

use crate::error::{KeyError, Result};
use crate::key_type::KeyType;

/// Minimum number of scheduler ticks per rotation period.
pub const MIN_TICKS_PER_PERIOD: u32 = 20;

/// Settings for a [`DiskKeyManager`](crate::manager::DiskKeyManager).
#[derive(Debug, Clone)]
pub struct KeyManagerConfig {
    /// Algorithm of every generated key pair.
    pub key_type: KeyType,
    /// Path to the key ring file.
    pub path: PathBuf,
    /// Lifetime assigned to each newly generated key pair.
    pub rotation_period: Duration,
    /// How often the rotation scheduler evaluates the ring.
    pub check_interval: Duration,
}

impl KeyManagerConfig {
    pub fn new(
        key_type: KeyType,
        path: impl Into<PathBuf>,
        rotation_period: Duration,
        check_interval: Duration,
    ) -> Self {
        Self {
            key_type,
            path: path.into(),
            rotation_period,
            check_interval,
        }
    }

    /// Reject settings under which the scheduler could step over a rotation
    /// threshold between two ticks.
    pub fn validate(&self) -> Result<()> {
        if self.key_type == KeyType::Unspecified {
            return Err(KeyError::UnsupportedKeyType(
                "key type must be specified".to_string(),
            ));
        }
        if self.rotation_period.is_zero() {
            return Err(KeyError::Config("rotation period must be positive".into()));
        }
        if self.check_interval.is_zero() {
            return Err(KeyError::Config("check interval must be positive".into()));
        }
        let fits = chrono::Duration::from_std(self.rotation_period)
            .ok()
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .is_some();
        if !fits {
            return Err(KeyError::Config(format!(
                "rotation period {:?} is too large",
                self.rotation_period
            )));
        }
        let max_interval = self.rotation_period / MIN_TICKS_PER_PERIOD;
        if self.check_interval > max_interval {
            return Err(KeyError::Config(format!(
                "check interval {:?} exceeds rotation period / {MIN_TICKS_PER_PERIOD} ({:?})",
                self.check_interval, max_interval
            )));
        }
        Ok(())
    }

    /// Rotation period as a chrono duration. Call after [`validate`](Self::validate).
    pub(crate) fn lifetime(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.rotation_period).unwrap_or(chrono::Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(period: Duration, interval: Duration) -> KeyManagerConfig {
        KeyManagerConfig::new(KeyType::EcP384, "keys.json", period, interval)
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = config(Duration::from_secs(720 * 3600), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_durations_rejected() {
        assert!(config(Duration::ZERO, Duration::from_secs(5)).validate().is_err());
        assert!(config(Duration::from_secs(3600), Duration::ZERO).validate().is_err());
    }

    #[test]
    fn interval_must_be_small_relative_to_period() {
        let period = Duration::from_secs(2000);
        assert!(config(period, Duration::from_secs(100)).validate().is_ok());
        assert!(matches!(
            config(period, Duration::from_secs(101)).validate(),
            Err(KeyError::Config(_))
        ));
    }

    #[test]
    fn period_beyond_representable_time_rejected() {
        let cfg = config(
            Duration::from_secs(2_500_000_000 * 3600),
            Duration::from_secs(5),
        );
        assert!(matches!(cfg.validate(), Err(KeyError::Config(_))));
    }

    #[test]
    fn unspecified_key_type_rejected() {
        let mut cfg = config(Duration::from_secs(3600), Duration::from_secs(1));
        cfg.key_type = KeyType::Unspecified;
        assert!(matches!(
            cfg.validate(),
            Err(KeyError::UnsupportedKeyType(_))
        ));
    }
}
