//! Queue-wide scheduling settings persisted in the store.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use queuectl_db::ConfigRow;
use serde::{Deserialize, Serialize};

use crate::error::JobQueueError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: u32 = 2;
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 300;

/// Snapshot of the settings that drive retry and lease decisions.
///
/// Never cached by the engine: each decision takes a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    pub max_retries: u32,
    pub backoff_base: u32,
    /// Seconds; both the per-attempt execution deadline and the lease length.
    pub worker_timeout: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            worker_timeout: DEFAULT_WORKER_TIMEOUT_SECS,
        }
    }
}

impl QueueSettings {
    /// Overlay persisted rows on the defaults. Rows with unknown keys or
    /// out-of-range values are ignored.
    pub fn from_rows(rows: &[ConfigRow]) -> Self {
        let mut settings = Self::default();
        for row in rows {
            let Ok(key) = row.key.parse::<SettingKey>() else {
                tracing::warn!(key = %row.key, "ignoring unknown queue setting");
                continue;
            };
            match u64::try_from(row.value) {
                Ok(value) if key.accepts(value) => settings.apply(key, value),
                _ => tracing::warn!(key = %row.key, value = row.value, "ignoring invalid queue setting"),
            }
        }
        settings
    }

    pub fn get(&self, key: SettingKey) -> u64 {
        match key {
            SettingKey::MaxRetries => u64::from(self.max_retries),
            SettingKey::BackoffBase => u64::from(self.backoff_base),
            SettingKey::WorkerTimeout => self.worker_timeout,
        }
    }

    /// Set `key` to an already validated value.
    fn apply(&mut self, key: SettingKey, value: u64) {
        match key {
            SettingKey::MaxRetries => self.max_retries = clamp_u32(value),
            SettingKey::BackoffBase => self.backoff_base = clamp_u32(value),
            SettingKey::WorkerTimeout => self.worker_timeout = value,
        }
    }

    #[inline]
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingKey, u64)> + '_ {
        SettingKey::ALL.iter().map(move |key| (*key, self.get(*key)))
    }
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// One of the three tunable queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    MaxRetries,
    BackoffBase,
    WorkerTimeout,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [Self::MaxRetries, Self::BackoffBase, Self::WorkerTimeout];

    /// Storage key (snake case).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaxRetries => "max_retries",
            Self::BackoffBase => "backoff_base",
            Self::WorkerTimeout => "worker_timeout",
        }
    }

    /// Name shown to operators (kebab case).
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::MaxRetries => "max-retries",
            Self::BackoffBase => "backoff-base",
            Self::WorkerTimeout => "worker-timeout",
        }
    }

    fn accepts(self, value: u64) -> bool {
        match self {
            Self::MaxRetries | Self::BackoffBase => (1..=u64::from(u32::MAX)).contains(&value),
            // Must survive the seconds-to-milliseconds conversion.
            Self::WorkerTimeout => (1..=(i64::MAX as u64) / 1_000).contains(&value),
        }
    }

    /// Parse an operator-supplied value: a positive integer in range for this key.
    pub fn parse_value(self, raw: &str) -> Result<u64, JobQueueError> {
        let invalid = |reason: &str| JobQueueError::InvalidSetting {
            key: self.display_name().to_owned(),
            value: raw.to_owned(),
            reason: reason.to_owned(),
        };
        let value: u64 = raw
            .trim()
            .parse()
            .map_err(|_| invalid("expected a positive integer"))?;
        if value == 0 {
            return Err(invalid("must be greater than zero"));
        }
        if !self.accepts(value) {
            return Err(invalid("value too large"));
        }
        Ok(value)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SettingKey {
    type Err = JobQueueError;

    /// Accepts dashes or underscores, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| JobQueueError::UnknownSetting(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: i64) -> ConfigRow {
        ConfigRow {
            key: key.into(),
            value,
            updated_at: 0,
        }
    }

    #[test]
    fn keys_accept_either_separator() {
        assert_eq!("max-retries".parse::<SettingKey>().unwrap(), SettingKey::MaxRetries);
        assert_eq!("BACKOFF_BASE".parse::<SettingKey>().unwrap(), SettingKey::BackoffBase);
        assert!(matches!(
            "poll-interval".parse::<SettingKey>(),
            Err(JobQueueError::UnknownSetting(_))
        ));
    }

    #[test]
    fn values_must_be_positive_integers() {
        assert_eq!(SettingKey::WorkerTimeout.parse_value(" 60 ").unwrap(), 60);
        for bad in ["0", "-1", "1.5", "abc", ""] {
            assert!(
                matches!(
                    SettingKey::MaxRetries.parse_value(bad),
                    Err(JobQueueError::InvalidSetting { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(SettingKey::BackoffBase.parse_value("4294967296").is_err());
    }

    #[test]
    fn rows_overlay_defaults() {
        let settings = QueueSettings::from_rows(&[
            row("max_retries", 5),
            row("worker_timeout", 10),
            row("bogus", 1),
            row("backoff_base", 0),
        ]);
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.worker_timeout, 10);
        assert_eq!(settings.backoff_base, DEFAULT_BACKOFF_BASE);
    }
}
