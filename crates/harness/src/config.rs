//! Invocation configuration
//!
//! A [`HarnessConfig`] is built once by the driver (from the environment,
//! CLI flags, or directly) and passed read-only to every invocation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::scheduler::SchedulerFactory;

/// Default connection target, matching the benchmark's reference database
pub const DEFAULT_DATABASE_URL: &str = "mysql://localhost:3306/testdb";

/// Scheduling strategy for the lightweight query tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fixed number of carriers sharing one FIFO admission queue
    #[default]
    FixedPool,
    /// Carriers with local queues that steal from each other when idle
    WorkStealing,
}

impl Strategy {
    /// Every strategy, in matrix order
    pub const ALL: [Strategy; 2] = [Strategy::FixedPool, Strategy::WorkStealing];
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedPool => write!(f, "fixed-pool"),
            Self::WorkStealing => write!(f, "work-stealing"),
        }
    }
}

impl FromStr for Strategy {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed-pool" | "fixed_pool" | "fixed" => Ok(Strategy::FixedPool),
            "work-stealing" | "work_stealing" | "stealing" => Ok(Strategy::WorkStealing),
            _ => Err(HarnessError::Config(format!(
                "unknown strategy: {}. Use 'fixed-pool' or 'work-stealing'",
                s
            ))),
        }
    }
}

/// Database backend, identified from the URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseDriver {
    MySql,
    Postgres,
    Sqlite,
}

impl DatabaseDriver {
    /// Identify the driver from a connection URL
    pub fn from_url(url: &str) -> Result<Self, HarnessError> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(HarnessError::Config(format!(
                "unsupported database URL scheme: {:?}",
                scheme
            ))),
        }
    }
}

/// Where and as whom to connect
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionTarget {
    /// Connection URL; the scheme selects the driver
    #[serde(serialize_with = "serialize_redacted")]
    pub url: String,

    /// Username injected into the URL at open time
    #[serde(default)]
    pub username: Option<String>,

    /// Password injected into the URL at open time
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl ConnectionTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Set credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Driver selected by the URL scheme
    pub fn driver(&self) -> Result<DatabaseDriver, HarnessError> {
        DatabaseDriver::from_url(&self.url)
    }

    /// The URL with any embedded password masked, safe for logs
    pub fn redacted(&self) -> String {
        redact_url(&self.url)
    }

    /// The URL to hand to the driver, with credentials applied
    pub(crate) fn connect_url(&self) -> Result<String, String> {
        if self.username.is_none() && self.password.is_none() {
            return Ok(self.url.clone());
        }

        let mut parsed = url::Url::parse(&self.url).map_err(|e| e.to_string())?;
        if let Some(username) = &self.username {
            parsed
                .set_username(username)
                .map_err(|_| "URL does not accept a username".to_string())?;
        }
        if let Some(password) = &self.password {
            parsed
                .set_password(Some(password))
                .map_err(|_| "URL does not accept a password".to_string())?;
        }
        Ok(parsed.to_string())
    }
}

fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn serialize_redacted<S: serde::Serializer>(url: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact_url(url))
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("url", &self.redacted())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for ConnectionTarget {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

/// Connection pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum live connections
    pub max_connections: u32,

    /// How long a task waits for a free connection before failing
    #[serde(with = "duration_millis")]
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Full configuration of one measured invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Scheduling strategy
    pub strategy: Strategy,

    /// Number of query tasks fanned out per invocation
    pub request_count: usize,

    /// Carrier threads in the scheduler
    pub worker_count: usize,

    /// Database to query
    pub target: ConnectionTarget,

    /// Pool sizing
    pub pool: PoolSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::FixedPool,
            request_count: 100,
            worker_count: 10,
            target: ConnectionTarget::default(),
            pool: PoolSettings::default(),
        }
    }
}

impl HarnessConfig {
    /// Create a configuration for the given target with default workload shape
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables (and `.env`, if present)
    pub fn from_env() -> Result<Self, HarnessError> {
        let _ = dotenvy::dotenv();

        let strategy = env_parse("DISPATCH_STRATEGY", Strategy::default())?;
        let request_count = env_parse("DISPATCH_REQUEST_COUNT", 100)?;
        let worker_count = env_parse("DISPATCH_WORKER_COUNT", 10)?;

        let target = ConnectionTarget {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            username: std::env::var("DATABASE_USERNAME").ok(),
            password: std::env::var("DATABASE_PASSWORD").ok(),
        };

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            acquire_timeout: Duration::from_millis(env_parse(
                "DATABASE_ACQUIRE_TIMEOUT_MS",
                defaults.acquire_timeout.as_millis() as u64,
            )?),
        };

        Ok(Self {
            strategy,
            request_count,
            worker_count,
            target,
            pool,
        })
    }

    /// Set the strategy
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the request count
    pub fn with_request_count(mut self, count: usize) -> Self {
        self.request_count = count;
        self
    }

    /// Set the worker count (not clamped; zero is rejected at invocation time)
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set pool sizing
    pub fn with_pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }

    /// Check the parts of the configuration that must hold before any resource is created
    pub fn validate(&self) -> Result<(), HarnessError> {
        SchedulerFactory::validate(self.worker_count)?;
        if self.pool.max_connections < 1 {
            return Err(HarnessError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        self.target.driver()?;
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T, HarnessError>
where
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| HarnessError::Config(format!("invalid {}: {}", name, e))),
        _ => Ok(default),
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
