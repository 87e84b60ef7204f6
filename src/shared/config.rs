use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Named partition of the remote store all records live in.
    pub zone_name: String,
    /// Maximum attempts per remote call, including the first.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub base_delay_ms: u64,
    /// Periodic sync backstop interval.
    pub sync_interval_secs: u64,
    /// Delay after an offline->online transition before syncing, to avoid
    /// thrashing on flapping connectivity.
    pub settle_delay_ms: u64,
    /// How long a Completed/Failed status stays visible before resetting
    /// to Idle.
    pub status_display_ms: u64,
    /// Upper bound on records submitted in one remote batch.
    pub batch_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            zone_name: "TribeBoardZone".to_string(),
            max_attempts: 3,
            base_delay_ms: 1_000,
            sync_interval_secs: 30,
            settle_delay_ms: 2_000,
            status_display_ms: 3_000,
            batch_size: 100,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("TRIBEBOARD_ZONE_NAME") {
            if !v.trim().is_empty() {
                cfg.zone_name = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("TRIBEBOARD_MAX_ATTEMPTS") {
            if let Some(value) = parse_u32(&v) {
                cfg.max_attempts = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TRIBEBOARD_BASE_DELAY_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.base_delay_ms = value;
            }
        }
        if let Ok(v) = std::env::var("TRIBEBOARD_SYNC_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync_interval_secs = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("TRIBEBOARD_SETTLE_DELAY_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.settle_delay_ms = value;
            }
        }
        if let Ok(v) = std::env::var("TRIBEBOARD_STATUS_DISPLAY_MS") {
            if let Some(value) = parse_u64(&v) {
                cfg.status_display_ms = value;
            }
        }
        if let Ok(v) = std::env::var("TRIBEBOARD_BATCH_SIZE") {
            if let Some(value) = parse_u32(&v) {
                cfg.batch_size = value.max(1);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.zone_name.trim().is_empty() {
            return Err("zone_name must not be empty".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.sync_interval_secs == 0 {
            return Err("sync_interval_secs must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = SyncConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.zone_name, "TribeBoardZone");
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let cfg = SyncConfig {
            max_attempts: 0,
            ..SyncConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
