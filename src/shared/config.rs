use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the hosted table API. `None` leaves the remote unconfigured.
    pub rest_url: Option<String>,
    pub realtime_url: Option<String>,
    pub api_key: Option<String>,
    pub schema: String,
    pub table: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub max_retries: u32,
    pub backoff_schedule_secs: Vec<u64>,
    pub realtime_enabled: bool,
    pub realtime_reconnect_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/intake.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            remote: RemoteConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            rest_url: None,
            realtime_url: None,
            api_key: None,
            schema: "public".to_string(),
            table: "intake_forms".to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_secs: 30,
            max_retries: 5,
            backoff_schedule_secs: vec![1, 5, 15, 60, 300],
            realtime_enabled: true,
            realtime_reconnect_secs: 5,
        }
    }
}

impl RemoteConfig {
    pub fn is_configured(&self) -> bool {
        self.rest_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl SyncConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Schedule step indexed by retry count, clamped to the last step.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        let secs = self
            .backoff_schedule_secs
            .get(retry_count as usize)
            .or_else(|| self.backoff_schedule_secs.last())
            .copied()
            .unwrap_or(0);
        Duration::from_secs(secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("INTAKE_DATABASE_URL")
            && !v.trim().is_empty()
        {
            cfg.database.url = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("INTAKE_DATABASE_MAX_CONNECTIONS")
            && let Some(value) = parse_u32(&v)
        {
            cfg.database.max_connections = value;
        }

        cfg.remote.rest_url = non_empty_var("INTAKE_REMOTE_URL");
        cfg.remote.realtime_url = non_empty_var("INTAKE_REALTIME_URL");
        cfg.remote.api_key = non_empty_var("INTAKE_REMOTE_API_KEY");
        if let Some(table) = non_empty_var("INTAKE_REMOTE_TABLE") {
            cfg.remote.table = table;
        }
        if let Some(schema) = non_empty_var("INTAKE_REMOTE_SCHEMA") {
            cfg.remote.schema = schema;
        }
        if let Ok(v) = std::env::var("INTAKE_REQUEST_TIMEOUT_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.remote.request_timeout_secs = value.max(1);
        }

        if let Ok(v) = std::env::var("INTAKE_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Ok(v) = std::env::var("INTAKE_SYNC_INTERVAL_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.sync_interval_secs = value;
        }
        if let Ok(v) = std::env::var("INTAKE_MAX_RETRIES")
            && let Some(value) = parse_u32(&v)
        {
            cfg.sync.max_retries = value;
        }
        if let Ok(v) = std::env::var("INTAKE_BACKOFF_SCHEDULE")
            && let Some(schedule) = parse_schedule(&v)
        {
            cfg.sync.backoff_schedule_secs = schedule;
        }
        if let Ok(v) = std::env::var("INTAKE_REALTIME_ENABLED") {
            cfg.sync.realtime_enabled = parse_bool(&v, cfg.sync.realtime_enabled);
        }
        if let Ok(v) = std::env::var("INTAKE_REALTIME_RECONNECT_SECS")
            && let Some(value) = parse_u64(&v)
        {
            cfg.sync.realtime_reconnect_secs = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.sync.sync_interval_secs == 0 {
            return Err("Sync sync_interval_secs must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.sync.backoff_schedule_secs.is_empty() {
            return Err("Sync backoff_schedule_secs must not be empty".to_string());
        }
        if self.remote.table.trim().is_empty() {
            return Err("Remote table must not be empty".to_string());
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

fn parse_u32(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

fn parse_schedule(value: &str) -> Option<Vec<u64>> {
    let steps: Option<Vec<u64>> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_u64)
        .collect();
    steps.filter(|steps| !steps.is_empty())
}
