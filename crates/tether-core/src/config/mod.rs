//! Offline policy configuration.
//!
//! Provides `OfflinePolicy`, the set of durations every time-limit decision is
//! made against. Defaults follow the reference policy (a 168 hour offline
//! limit); hosts override them through environment variables or by building
//! the struct directly in tests.

use std::collections::HashMap;
use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::error::{Error, Result};
use crate::util::normalize_text_option;

const DEFAULT_MAX_OFFLINE_HOURS: i64 = 168;
const DEFAULT_WARNING_WINDOW_HOURS: i64 = 72;
const DEFAULT_ESCALATION_WINDOW_HOURS: i64 = 24;
const DEFAULT_NOTIFY_THRESHOLDS_HOURS: [i64; 3] = [72, 48, 24];
const DEFAULT_ENFORCEMENT_INTERVAL_SECS: u64 = 6 * 60 * 60;
/// Upper bound for every policy duration (100 years).
const MAX_POLICY_HOURS: i64 = 100 * 366 * 24;

/// Durations governing offline sessions, credentials and enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflinePolicy {
    /// Longest a single offline episode may last before enforcement.
    pub max_offline_duration: Duration,
    /// Lifetime stamped into a credential at issuance (`expires_at - issued_at`).
    pub credential_lifetime: Duration,
    /// Remaining time below which the device is in the warning state.
    pub warning_window: Duration,
    /// Remaining time below which queued sync operations escalate.
    pub escalation_window: Duration,
    /// Remaining-time bands surfaced to the notification layer, largest first.
    pub notification_thresholds: Vec<Duration>,
    /// Cadence of the periodic enforcement pass.
    pub enforcement_interval: StdDuration,
}

impl Default for OfflinePolicy {
    fn default() -> Self {
        Self {
            max_offline_duration: Duration::hours(DEFAULT_MAX_OFFLINE_HOURS),
            credential_lifetime: Duration::hours(DEFAULT_MAX_OFFLINE_HOURS),
            warning_window: Duration::hours(DEFAULT_WARNING_WINDOW_HOURS),
            escalation_window: Duration::hours(DEFAULT_ESCALATION_WINDOW_HOURS),
            notification_thresholds: DEFAULT_NOTIFY_THRESHOLDS_HOURS
                .iter()
                .map(|hours| Duration::hours(*hours))
                .collect(),
            enforcement_interval: StdDuration::from_secs(DEFAULT_ENFORCEMENT_INTERVAL_SECS),
        }
    }
}

impl OfflinePolicy {
    /// Policy with a custom offline limit; the credential lifetime follows it.
    pub fn with_max_offline_duration(max_offline_duration: Duration) -> Self {
        Self {
            max_offline_duration,
            credential_lifetime: max_offline_duration,
            ..Self::default()
        }
    }

    /// Read overrides from `TETHER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Build a policy from an arbitrary variable lookup.
    ///
    /// Missing variables keep their defaults. The credential lifetime follows
    /// the offline limit unless set explicitly.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let max_offline_duration =
            optional_hours(&lookup, "TETHER_MAX_OFFLINE_HOURS")?.unwrap_or(defaults.max_offline_duration);
        let credential_lifetime = optional_hours(&lookup, "TETHER_CREDENTIAL_LIFETIME_HOURS")?
            .unwrap_or(max_offline_duration);
        let warning_window =
            optional_hours(&lookup, "TETHER_WARNING_WINDOW_HOURS")?.unwrap_or(defaults.warning_window);
        let escalation_window = optional_hours(&lookup, "TETHER_ESCALATION_WINDOW_HOURS")?
            .unwrap_or(defaults.escalation_window);
        let notification_thresholds =
            match normalize_text_option(lookup("TETHER_NOTIFY_THRESHOLDS_HOURS")) {
                Some(raw) => parse_hour_list(&raw, "TETHER_NOTIFY_THRESHOLDS_HOURS")?,
                None => defaults.notification_thresholds,
            };
        let enforcement_interval =
            match normalize_text_option(lookup("TETHER_ENFORCEMENT_INTERVAL_SECS")) {
                Some(raw) => StdDuration::from_secs(parse_positive(
                    &raw,
                    "TETHER_ENFORCEMENT_INTERVAL_SECS",
                )?),
                None => defaults.enforcement_interval,
            };

        let policy = Self {
            max_offline_duration,
            credential_lifetime,
            warning_window,
            escalation_window,
            notification_thresholds,
            enforcement_interval,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.max_offline_duration <= Duration::zero() {
            return Err(Error::Config(
                "max offline duration must be positive".to_string(),
            ));
        }
        if self.credential_lifetime <= Duration::zero() {
            return Err(Error::Config(
                "credential lifetime must be positive".to_string(),
            ));
        }
        let ceiling = Duration::hours(MAX_POLICY_HOURS);
        let bounded = [
            ("max offline duration", self.max_offline_duration),
            ("credential lifetime", self.credential_lifetime),
            ("warning window", self.warning_window),
            ("escalation window", self.escalation_window),
        ]
        .into_iter()
        .chain(
            self.notification_thresholds
                .iter()
                .map(|threshold| ("notification threshold", *threshold)),
        );
        for (name, value) in bounded {
            if value > ceiling {
                return Err(Error::Config(format!(
                    "{name} must not exceed {MAX_POLICY_HOURS} hours"
                )));
            }
        }
        if self.escalation_window > self.warning_window {
            return Err(Error::Config(
                "escalation window must not exceed the warning window".to_string(),
            ));
        }
        if self.enforcement_interval.is_zero() {
            return Err(Error::Config(
                "enforcement interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn optional_hours(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<Duration>> {
    normalize_text_option(lookup(name))
        .map(|raw| parse_positive(&raw, name).map(hours_from))
        .transpose()
}

fn parse_hour_list(raw: &str, name: &str) -> Result<Vec<Duration>> {
    let mut thresholds = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_positive(part, name).map(hours_from))
        .collect::<Result<Vec<_>>>()?;
    thresholds.sort_unstable_by(|a, b| b.cmp(a));
    thresholds.dedup();
    Ok(thresholds)
}

fn parse_positive(raw: &str, name: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(Error::Config(format!(
            "{name} must be a positive integer (got {raw:?})"
        ))),
    }
}

fn hours_from(hours: u64) -> Duration {
    const MAX_HOURS: i64 = i64::MAX / 3_600_000;
    Duration::hours(i64::try_from(hours).unwrap_or(MAX_HOURS).min(MAX_HOURS))
}
