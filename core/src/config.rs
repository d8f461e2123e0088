// Client configuration
//
// Defaults, overlaid by environment variables, overlaid by an optional TOML file
// (path via ARGUS_CONFIG or ./argus.toml).

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::schedule::SchedulePolicy;
use crate::{ArgusError, Result};

#[derive(Clone, Debug)]
pub struct ArgusConfig {
    /// Base URL of the Argus web service, e.g. `https://argus.example.com`
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub user_agent: String,
    /// Stop a store's timers once its last subscriber leaves
    pub teardown_on_idle: bool,
    /// Buffered alerts per subscriber before old ones are dropped
    pub alert_capacity: usize,
    pub overrides: StoreOverrides,
}

impl Default for ArgusConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 30_000,
            user_agent: "argus-client/0.1".to_string(),
            teardown_on_idle: true,
            alert_capacity: 256,
            overrides: StoreOverrides::default(),
        }
    }
}

/// Per-store schedule overrides, keyed by store name (`StatsStore`, `UserStore`, ...)
#[derive(Clone, Debug, Default)]
pub struct StoreOverrides {
    pub stores: HashMap<String, ScheduleToml>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScheduleToml {
    pub period_secs: Option<u64>,
    pub initial_delay_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
    pub refresh_delay_ms: Option<u64>,
    /// Disable the periodic timer entirely
    pub disable_periodic: Option<bool>,
}

impl StoreOverrides {
    /// Apply the overrides configured for `store` on top of its domain policy
    pub fn apply(&self, store: &str, mut policy: SchedulePolicy) -> SchedulePolicy {
        let Some(o) = self.stores.get(store) else {
            return policy;
        };

        if o.disable_periodic.unwrap_or(false) {
            policy.periodic = None;
        } else if o.period_secs.is_some() || o.initial_delay_ms.is_some() {
            let current = policy.periodic.take();
            let period = o
                .period_secs
                .map(Duration::from_secs)
                .or(current.as_ref().map(|p| p.period))
                .unwrap_or(Duration::from_secs(60));
            let initial = o
                .initial_delay_ms
                .map(Duration::from_millis)
                .or(current.and_then(|p| p.initial_delay));
            policy = policy.periodic(initial, period);
        }
        if let Some(ms) = o.debounce_ms {
            let mode = policy.debounce.as_ref().map(|d| d.mode).unwrap_or_default();
            policy = policy
                .debounce(Duration::from_millis(ms))
                .debounce_mode(mode);
        }
        if let Some(ms) = o.refresh_delay_ms {
            policy = policy.refresh_delay(Duration::from_millis(ms));
        }
        policy
    }
}

impl ArgusConfig {
    /// Defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_nonempty("ARGUS_BASE_URL") {
            cfg.base_url = v;
        }
        if let Some(v) = env_nonempty("ARGUS_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            cfg.request_timeout_ms = v;
        }
        if let Some(v) = env_nonempty("ARGUS_USER_AGENT") {
            cfg.user_agent = v;
        }
        if let Some(v) = env_nonempty("ARGUS_TEARDOWN_ON_IDLE").and_then(|v| v.parse().ok()) {
            cfg.teardown_on_idle = v;
        }
        cfg
    }

    /// Environment-driven defaults plus the TOML overlay, if one exists
    ///
    /// A missing file is not an error; a file that fails to parse is.
    pub fn load() -> Result<Self> {
        let base = Self::from_env();
        let path = std::env::var("ARGUS_CONFIG").unwrap_or_else(|_| "argus.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return Ok(base);
        }
        let text = fs::read_to_string(p).map_err(|e| {
            warn!(target: "config", path = %path, error = %e, "Failed to read TOML");
            ArgusError::Config(format!("{}: {}", path, e))
        })?;
        Self::from_toml_str(&text, base)
    }

    /// Overlay a TOML document onto `base`
    pub fn from_toml_str(text: &str, base: Self) -> Result<Self> {
        let overlay: ArgusToml =
            toml::from_str(text).map_err(|e| ArgusError::Config(e.to_string()))?;
        Ok(overlay.overlay(base))
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct ArgusToml {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    user_agent: Option<String>,
    teardown_on_idle: Option<bool>,
    alert_capacity: Option<usize>,
    stores: Option<HashMap<String, ScheduleToml>>,
}

impl ArgusToml {
    fn overlay(self, mut base: ArgusConfig) -> ArgusConfig {
        if let Some(v) = self.base_url {
            base.base_url = v;
        }
        if let Some(v) = self.request_timeout_ms {
            base.request_timeout_ms = v;
        }
        if let Some(v) = self.user_agent {
            base.user_agent = v;
        }
        if let Some(v) = self.teardown_on_idle {
            base.teardown_on_idle = v;
        }
        if let Some(v) = self.alert_capacity {
            base.alert_capacity = v;
        }
        if let Some(stores) = self.stores {
            base.overrides.stores.extend(stores);
        }
        base
    }
}
