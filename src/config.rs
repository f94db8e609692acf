//! Service configuration loaded from environment variables

use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::engine::state_machine::ThresholdPolicy;
use crate::models::{Priority, SlaTargets};

/// Largest accepted target: one year in minutes
pub const MAX_TARGET_MINUTES: i64 = 525_600;

/// SLA targets resolved at case creation.
///
/// A case-type override wins over the priority table.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPolicy {
    pub high: SlaTargets,
    pub medium: SlaTargets,
    pub low: SlaTargets,
    pub by_case_type: HashMap<String, SlaTargets>,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self {
            high: SlaTargets::new(30, 240),
            medium: SlaTargets::new(60, 480),
            low: SlaTargets::new(240, 1440),
            by_case_type: HashMap::new(),
        }
    }
}

impl TargetPolicy {
    pub fn targets_for(&self, priority: Priority, case_type: &str) -> SlaTargets {
        if let Some(targets) = self.by_case_type.get(&case_type.to_lowercase()) {
            return *targets;
        }
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub event_buffer_capacity: usize,
    pub broadcast_capacity: usize,
    pub sweep_interval: Duration,
    pub thresholds: ThresholdPolicy,
    pub targets: TargetPolicy,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            event_buffer_capacity: 10_000,
            broadcast_capacity: 1_000,
            sweep_interval: Duration::from_secs(30),
            thresholds: ThresholdPolicy::default(),
            targets: TargetPolicy::default(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let listen_addr = parse_or(&lookup, "LISTEN_ADDR", defaults.listen_addr)?;
        let event_buffer_capacity =
            parse_or(&lookup, "EVENT_BUFFER_CAPACITY", defaults.event_buffer_capacity)?;
        let broadcast_capacity =
            parse_or(&lookup, "BROADCAST_CAPACITY", defaults.broadcast_capacity)?;
        let sweep_secs: u64 = parse_or(
            &lookup,
            "SWEEP_INTERVAL_SECS",
            defaults.sweep_interval.as_secs(),
        )?;
        if sweep_secs == 0 {
            return Err(anyhow!("SWEEP_INTERVAL_SECS must be positive"));
        }
        if event_buffer_capacity == 0 || broadcast_capacity == 0 {
            return Err(anyhow!("buffer capacities must be positive"));
        }

        let base = defaults.thresholds;
        let thresholds = ThresholdPolicy {
            warning_pct: parse_or(&lookup, "SLA_WARNING_PCT", base.warning_pct)?,
            resolution_critical_pct: parse_or(
                &lookup,
                "SLA_RESOLUTION_CRITICAL_PCT",
                base.resolution_critical_pct,
            )?,
            response_critical_pct: parse_or(
                &lookup,
                "SLA_RESPONSE_CRITICAL_PCT",
                base.response_critical_pct,
            )?,
            remaining_floor_minutes: parse_or(
                &lookup,
                "SLA_REMAINING_FLOOR_MINUTES",
                base.remaining_floor_minutes,
            )?,
        };
        thresholds.validate().map_err(|e| anyhow!(e))?;

        let mut targets = defaults.targets;
        for (key, slot) in [
            ("SLA_TARGETS_HIGH", &mut targets.high),
            ("SLA_TARGETS_MEDIUM", &mut targets.medium),
            ("SLA_TARGETS_LOW", &mut targets.low),
        ] {
            if let Some(raw) = lookup(key) {
                *slot = parse_targets(&raw).with_context(|| format!("Invalid {}", key))?;
            }
        }
        if let Some(raw) = lookup("SLA_CASE_TYPE_TARGETS") {
            targets.by_case_type =
                parse_case_type_targets(&raw).context("Invalid SLA_CASE_TYPE_TARGETS")?;
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("text") | None => LogFormat::Text,
            Some(other) => return Err(anyhow!("Invalid LOG_FORMAT '{}'", other)),
        };

        Ok(Self {
            listen_addr,
            event_buffer_capacity,
            broadcast_capacity,
            sweep_interval: Duration::from_secs(sweep_secs),
            thresholds,
            targets,
            log_format,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

/// Parses `response/resolution` in minutes, e.g. `30/240`.
fn parse_targets(raw: &str) -> anyhow::Result<SlaTargets> {
    let (response, resolution) = raw
        .trim()
        .split_once('/')
        .ok_or_else(|| anyhow!("expected response/resolution, got '{}'", raw))?;
    let response: i64 = response.trim().parse()?;
    let resolution: i64 = resolution.trim().parse()?;
    if response <= 0 || resolution <= 0 {
        return Err(anyhow!("targets must be positive"));
    }
    if response > MAX_TARGET_MINUTES || resolution > MAX_TARGET_MINUTES {
        return Err(anyhow!("targets must not exceed {} minutes", MAX_TARGET_MINUTES));
    }
    Ok(SlaTargets::new(response, resolution))
}

/// Parses `billing=60/720,outage=15/120`.
fn parse_case_type_targets(raw: &str) -> anyhow::Result<HashMap<String, SlaTargets>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (case_type, targets) = entry
                .split_once('=')
                .ok_or_else(|| anyhow!("expected type=response/resolution, got '{}'", entry))?;
            Ok((case_type.trim().to_lowercase(), parse_targets(targets)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.thresholds, ThresholdPolicy::default());
        assert_eq!(config.targets.medium, SlaTargets::new(60, 480));
    }

    #[test]
    fn test_overrides_targets_and_thresholds() {
        let config = Config::from_lookup(lookup_from(&[
            ("SLA_TARGETS_HIGH", "15/120"),
            ("SLA_CASE_TYPE_TARGETS", "Billing=60/720, outage=5/60"),
            ("SLA_WARNING_PCT", "30"),
            ("SWEEP_INTERVAL_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.targets.high, SlaTargets::new(15, 120));
        assert_eq!(
            config.targets.targets_for(Priority::Low, "billing"),
            SlaTargets::new(60, 720)
        );
        assert_eq!(
            config.targets.targets_for(Priority::High, "hardware"),
            SlaTargets::new(15, 120)
        );
        assert_eq!(config.thresholds.warning_pct, 30.0);
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_lookup(lookup_from(&[("SLA_TARGETS_LOW", "abc")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SLA_TARGETS_LOW", "0/10")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SLA_TARGETS_HIGH", "30/9223372036854775807")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SLA_CASE_TYPE_TARGETS", "outage=525601/600")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SWEEP_INTERVAL_SECS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SLA_WARNING_PCT", "5")])).is_err());
    }
}
