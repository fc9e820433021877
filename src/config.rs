// src/config.rs
//! Process configuration, read once from the environment at startup.
//!
//! Every setting has a default except where noted; a value that is present but
//! unusable is a [`StartupError`] and the worker never reaches its first cycle.

use std::str::FromStr;
use std::time::Duration;

use crate::error::StartupError;
use crate::ingest::providers::ProviderSettings;

pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_DYNAMO_TABLE: &str = "DYNAMO_TABLE";
pub const ENV_AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
pub const ENV_AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_STORE_BACKEND: &str = "STORE_BACKEND";
pub const ENV_HEALTH_PORT: &str = "HEALTH_PORT";
pub const ENV_CYCLE_INTERVAL_SECS: &str = "CYCLE_INTERVAL_SECS";
pub const ENV_FETCH_DEADLINE_SECS: &str = "FETCH_DEADLINE_SECS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";
pub const ENV_STORE_TIMEOUT_SECS: &str = "STORE_TIMEOUT_SECS";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_TRENDS_GEO: &str = "TRENDS_GEO";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_TABLE: &str = "TrendingData";
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Dynamo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::Dynamo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown backend {other:?}, expected dynamodb or memory")),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

// Keep secrets out of logs.
impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoSettings {
    pub region: String,
    pub table: String,
    pub endpoint_url: Option<String>,
    /// `None` means the SDK default provider chain (profile, IMDS, IRSA, ...).
    pub credentials: Option<StaticCredentials>,
    /// Upper bound on one `PutItem`, retries included.
    pub timeout: Duration,
}

impl DynamoSettings {
    pub fn with_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            table: DEFAULT_TABLE.to_string(),
            endpoint_url: None,
            credentials: None,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StoreBackend,
    pub dynamo: DynamoSettings,
    pub health_port: u16,
    pub cycle_interval: Duration,
    pub fetch_deadline: Duration,
    pub http_timeout: Duration,
    pub providers: ProviderSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = parse_or(&get, ENV_STORE_BACKEND, StoreBackend::Dynamo)?;

        let credentials = match (get(ENV_AWS_ACCESS_KEY_ID), get(ENV_AWS_SECRET_ACCESS_KEY)) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
                access_key_id,
                secret_access_key,
                session_token: get(ENV_AWS_SESSION_TOKEN),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(StartupError::PartialCredentials {
                    present: ENV_AWS_ACCESS_KEY_ID,
                    missing: ENV_AWS_SECRET_ACCESS_KEY,
                })
            }
            (None, Some(_)) => {
                return Err(StartupError::PartialCredentials {
                    present: ENV_AWS_SECRET_ACCESS_KEY,
                    missing: ENV_AWS_ACCESS_KEY_ID,
                })
            }
        };

        let dynamo = DynamoSettings {
            region: get(ENV_AWS_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
            table: get(ENV_DYNAMO_TABLE).unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            endpoint_url: get(ENV_AWS_ENDPOINT_URL),
            credentials,
            timeout: secs_or(&get, ENV_STORE_TIMEOUT_SECS, DEFAULT_STORE_TIMEOUT.as_secs())?,
        };

        let providers = ProviderSettings {
            github_token: get(ENV_GITHUB_TOKEN),
            trends_geo: get(ENV_TRENDS_GEO).unwrap_or_else(|| "US".to_string()),
        };

        Ok(Self {
            backend,
            dynamo,
            health_port: parse_or(&get, ENV_HEALTH_PORT, 8080u16)?,
            cycle_interval: secs_or(&get, ENV_CYCLE_INTERVAL_SECS, 10)?,
            fetch_deadline: secs_or(&get, ENV_FETCH_DEADLINE_SECS, 30)?,
            http_timeout: secs_or(&get, ENV_HTTP_TIMEOUT_SECS, 15)?,
            providers,
        })
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, StartupError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| StartupError::InvalidVar {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Positive whole seconds.
fn secs_or<G>(get: &G, name: &'static str, default: u64) -> Result<Duration, StartupError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, name, default)?;
    if secs == 0 {
        return Err(StartupError::InvalidVar {
            name,
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
