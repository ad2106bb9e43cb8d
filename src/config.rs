use crate::{Error, Result};
use std::{env, time::Duration};

const DEFAULT_SECRET_NAME: &str = "grafana";
const DEFAULT_SECRET_NAMESPACE: &str = "grafana";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RESYNC_SECS: u64 = 300;

/// Runtime settings of the operator, read from `GRAFANA_*` environment variables.
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    pub grafana_url: String,
    pub secret_name: String,
    pub secret_namespace: String,
    /// Upper bound for a single Grafana API call.
    pub request_timeout: Duration,
    /// How long to wait before looking at a team again whose organization is missing or not ready.
    pub resync_interval: Duration,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let grafana_url = lookup("GRAFANA_URL").ok_or_else(|| Error::Config("missing GRAFANA_URL".to_string()))?;
        Ok(Self {
            grafana_url: grafana_url.trim_end_matches('/').to_string(),
            secret_name: lookup("GRAFANA_SECRET_NAME").unwrap_or(DEFAULT_SECRET_NAME.to_string()),
            secret_namespace: lookup("GRAFANA_SECRET_NAMESPACE").unwrap_or(DEFAULT_SECRET_NAMESPACE.to_string()),
            request_timeout: seconds(&lookup, "GRAFANA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            resync_interval: seconds(&lookup, "GRAFANA_RESYNC_SECS", DEFAULT_RESYNC_SECS)?,
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) => Err(Error::Config(format!("{key} must be greater than zero"))),
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(e) => Err(Error::Config(format!("{key}={raw:?} is not a number of seconds: {e}"))),
        },
    }
}
