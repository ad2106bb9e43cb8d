use kube::{
    runtime::events::{Recorder, Reporter},
    Client,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0:?}")]
    KubeError(#[from] kube::Error),

    #[error("Grafana request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Grafana returned {status} for {operation}: {body}")]
    RemoteStatus {
        operation: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Could not decode Grafana response for {operation}: {reason}")]
    ResponseDecode { operation: &'static str, reason: String },

    #[error("Grafana object {remote_id} was created but status of {key} could not be written: {source}")]
    StatusWriteFailed {
        key: String,
        remote_id: i64,
        #[source]
        source: Box<Error>,
    },

    #[error("Grafana credentials unavailable: {0}")]
    Credentials(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Delay before the controller retries a reconcile that failed with this error.
    pub fn retry_after(&self) -> Duration {
        match self {
            Error::StatusWriteFailed { .. } => Duration::from_secs(5),
            _ => Duration::from_secs(60),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone)]
pub struct OperatorContext {
    pub k8s: Client,
    pub grafana: GrafanaClient<SecretCredentials>,
    pub config: OperatorConfig,
    pub pending_organizations: Arc<PendingStatus<GrafanaOrganizationStatus>>,
    pub pending_teams: Arc<PendingStatus<GrafanaTeamStatus>>,
}
impl OperatorContext {
    pub fn build_recorder(&self) -> Recorder {
        Recorder::new(
            self.k8s.clone(),
            Reporter {
                controller: "grafana-operator".to_string(),
                instance: std::env::var("POD_NAME").ok(),
            },
        )
    }
}

pub mod config;
pub mod controllers;
pub mod grafana;
pub mod schema;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod util;

pub use config::OperatorConfig;
pub use grafana::{GrafanaClient, SecretCredentials};
use schema::{GrafanaOrganizationStatus, GrafanaTeamStatus};
use store::PendingStatus;
