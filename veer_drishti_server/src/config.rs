use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use veer_drishti::{AlertConfig, PipelineConfig, SimulatorConfig};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Process configuration, read from `VD_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Directory of still frames replayed as the video feed.
    pub frames_dir: Option<PathBuf>,
    pub sample_interval: Duration,
    pub sim_tick_interval: Duration,
    pub sim_seed: Option<u64>,
    pub alert_window_secs: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            frames_dir: None,
            sample_interval: Duration::from_millis(1000),
            sim_tick_interval: Duration::from_millis(1000),
            sim_seed: None,
            alert_window_secs: veer_drishti::alerts::DEFAULT_WINDOW_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset or empty keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(bind) = get("VD_BIND") {
            cfg.bind_addr = bind;
        }
        cfg.frames_dir = get("VD_FRAMES_DIR").map(PathBuf::from);
        if let Some(ms) = get("VD_SAMPLE_INTERVAL_MS") {
            cfg.sample_interval = Duration::from_millis(parse_positive("VD_SAMPLE_INTERVAL_MS", &ms)?);
        }
        if let Some(ms) = get("VD_SIM_TICK_MS") {
            cfg.sim_tick_interval = Duration::from_millis(parse_positive("VD_SIM_TICK_MS", &ms)?);
        }
        if let Some(seed) = get("VD_SIM_SEED") {
            cfg.sim_seed = Some(seed.trim().parse().map_err(|_| ConfigError {
                key: "VD_SIM_SEED",
                value: seed.clone(),
            })?);
        }
        if let Some(secs) = get("VD_ALERT_WINDOW_SECS") {
            cfg.alert_window_secs = parse_positive("VD_ALERT_WINDOW_SECS", &secs)? as i64;
        }
        Ok(cfg)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            sample_interval: self.sample_interval,
            ..PipelineConfig::default()
        }
    }

    pub fn simulator(&self) -> SimulatorConfig {
        SimulatorConfig {
            tick_interval: self.sim_tick_interval,
            seed: self.sim_seed,
        }
    }

    pub fn alerts(&self) -> AlertConfig {
        AlertConfig {
            window: chrono::Duration::seconds(self.alert_window_secs),
        }
    }
}

// Capped so the window always fits a chrono duration.
fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 && v <= u32::MAX as u64 => Ok(v),
        _ => Err(ConfigError {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8000");
        assert!(cfg.frames_dir.is_none());
        assert_eq!(cfg.sample_interval, Duration::from_secs(1));
        assert_eq!(cfg.alerts().window, chrono::Duration::seconds(600));
    }

    #[test]
    fn reads_overrides() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("VD_BIND", "0.0.0.0:9000"),
            ("VD_FRAMES_DIR", "/data/frames"),
            ("VD_SAMPLE_INTERVAL_MS", "250"),
            ("VD_SIM_SEED", "99"),
            ("VD_ALERT_WINDOW_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.frames_dir, Some(PathBuf::from("/data/frames")));
        assert_eq!(cfg.pipeline().sample_interval, Duration::from_millis(250));
        assert_eq!(cfg.simulator().seed, Some(99));
        assert_eq!(cfg.alerts().window, chrono::Duration::seconds(60));
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = ServerConfig::from_lookup(lookup(&[("VD_SIM_TICK_MS", "0")])).unwrap_err();
        assert_eq!(err.key, "VD_SIM_TICK_MS");
        assert!(ServerConfig::from_lookup(lookup(&[("VD_SIM_SEED", "abc")])).is_err());
    }

    #[test]
    fn blank_values_keep_defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&[("VD_FRAMES_DIR", "  ")])).unwrap();
        assert!(cfg.frames_dir.is_none());
    }
}
