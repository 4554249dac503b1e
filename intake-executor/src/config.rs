//! Executor Configuration
//!
//! Every knob has a default and can be overridden from `INTAKE_*`
//! environment variables.

use crate::billing::BillingPolicy;
use std::env;
use std::time::Duration;

/// Submission tracker configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Users allowed in flight at once, system-wide
    pub max_concurrent: usize,
    /// In-flight entries older than this are treated as abandoned
    pub in_flight_ttl: Duration,
    /// Compare-and-swap attempts before giving up
    pub max_cas_retries: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            in_flight_ttl: Duration::from_secs(10 * 60),
            max_cas_retries: 16,
        }
    }
}

impl TrackerConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_in_flight_ttl(mut self, ttl: Duration) -> Self {
        self.in_flight_ttl = ttl;
        self
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: parse_var("INTAKE_TRACKER_MAX_CONCURRENT")
                .unwrap_or(defaults.max_concurrent),
            in_flight_ttl: parse_var("INTAKE_TRACKER_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.in_flight_ttl),
            max_cas_retries: parse_var("INTAKE_TRACKER_CAS_RETRIES")
                .unwrap_or(defaults.max_cas_retries),
        }
    }
}

/// Orchestrator configuration
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorConfig {
    /// Owner and property inserts in flight at once; 1 writes sequentially
    pub entity_write_concurrency: usize,
    /// How often a blocked attempt re-reads the tracker
    pub in_flight_poll_interval: Duration,
    /// How long a blocked attempt waits for the other one
    pub in_flight_wait: Duration,
    /// Tracker configuration
    pub tracker: TrackerConfig,
    /// Billing policy
    pub billing: BillingPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            entity_write_concurrency: 4,
            in_flight_poll_interval: Duration::from_millis(250),
            in_flight_wait: Duration::from_secs(30),
            tracker: TrackerConfig::default(),
            billing: BillingPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_write_concurrency(mut self, concurrency: usize) -> Self {
        self.entity_write_concurrency = concurrency.max(1);
        self
    }

    pub fn with_in_flight_wait(mut self, poll_interval: Duration, wait: Duration) -> Self {
        self.in_flight_poll_interval = poll_interval;
        self.in_flight_wait = wait;
        self
    }

    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_billing(mut self, billing: BillingPolicy) -> Self {
        self.billing = billing;
        self
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            entity_write_concurrency: parse_var::<usize>("INTAKE_WRITE_CONCURRENCY")
                .map(|n| n.max(1))
                .unwrap_or(defaults.entity_write_concurrency),
            in_flight_poll_interval: parse_var("INTAKE_IN_FLIGHT_POLL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.in_flight_poll_interval),
            in_flight_wait: parse_var("INTAKE_IN_FLIGHT_WAIT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.in_flight_wait),
            tracker: TrackerConfig::from_env(),
            billing: BillingPolicy::from_env(),
        }
    }
}

pub(crate) fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.tracker.max_concurrent, 3);
        assert_eq!(config.tracker.in_flight_ttl, Duration::from_secs(600));
        assert_eq!(config.entity_write_concurrency, 4);
    }

    #[test]
    fn test_write_concurrency_floor() {
        let config = OrchestratorConfig::default().with_write_concurrency(0);
        assert_eq!(config.entity_write_concurrency, 1);
    }

    #[test]
    fn test_unset_vars_fall_back() {
        assert_eq!(parse_var::<u32>("INTAKE_TEST_SURELY_UNSET_VAR"), None);
    }
}
