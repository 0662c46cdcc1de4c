//! Process-wide configuration, loaded from `.env`/environment at startup.
//!
//! Mirrors [`crate::runtimes::runtime_config::RuntimeConfig`]'s pattern: one
//! struct per concern, a `Default` impl carrying the spec's literal
//! defaults, overridable via environment variables read through `dotenvy`.

use std::time::Duration;

/// Top-level application configuration, composed of one struct per concern.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub job_queue: JobQueueConfig,
    pub event_bus: EventBusConfig,
    pub graph: GraphConfig,
    pub http: HttpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/weavegraph".to_string()),
            job_queue: JobQueueConfig::default(),
            event_bus: EventBusConfig::default(),
            graph: GraphConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`/the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Job queue (C2) tunables: lease duration, poll backoff, reclaim cadence,
/// and retry backoff. Defaults match spec §4.2/§4.6.
#[derive(Clone, Debug)]
pub struct JobQueueConfig {
    pub lease_duration: Duration,
    pub poll_backoff_min: Duration,
    pub poll_backoff_cap: Duration,
    pub reclaim_sweep_interval: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub max_retries: u32,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self {
            lease_duration: Duration::from_secs(env_or("JOB_LEASE_SECS", 300)),
            poll_backoff_min: Duration::from_millis(env_or("JOB_POLL_BACKOFF_MIN_MS", 500)),
            poll_backoff_cap: Duration::from_secs(env_or("JOB_POLL_BACKOFF_CAP_SECS", 5)),
            reclaim_sweep_interval: Duration::from_secs(env_or("JOB_RECLAIM_SWEEP_SECS", 30)),
            backoff_base: Duration::from_secs(env_or("JOB_BACKOFF_BASE_SECS", 1)),
            backoff_cap: Duration::from_secs(env_or("JOB_BACKOFF_CAP_SECS", 600)),
            max_retries: env_or("JOB_MAX_RETRIES", 3),
        }
    }
}

/// Per-topic event bus (C3) tunables: ring buffer and per-subscriber buffer
/// sizing, heartbeat cadence. Defaults match spec §4.3.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub topic_history_capacity: usize,
    pub subscriber_buffer_capacity: usize,
    pub heartbeat_interval: Duration,
}

impl EventBusConfig {
    /// History is trimmed to half capacity once it overflows.
    #[must_use]
    pub fn trim_to(&self) -> usize {
        self.topic_history_capacity / 2
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self {
            topic_history_capacity: env_or("EVENT_BUS_HISTORY_CAPACITY", 1000),
            subscriber_buffer_capacity: env_or("EVENT_BUS_SUBSCRIBER_CAPACITY", 256),
            heartbeat_interval: Duration::from_secs(env_or("EVENT_BUS_HEARTBEAT_SECS", 10)),
        }
    }
}

/// Which workflow graph variant (C4) the process serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphType {
    Thin,
    Full,
}

impl std::fmt::Display for GraphType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thin => write!(f, "thin"),
            Self::Full => write!(f, "full"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub graph_type: GraphType,
}

impl Default for GraphConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        let graph_type = match std::env::var("GRAPH_TYPE").as_deref() {
            Ok("thin") => GraphType::Thin,
            _ => GraphType::Full,
        };
        Self { graph_type }
    }
}

/// HTTP surface (C7) bind configuration.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        Self {
            bind_addr: std::env::var("HTTP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("HTTP_PORT", 8080),
        }
    }
}
