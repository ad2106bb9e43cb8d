use grafana_operator::{
    controllers::{organization, team},
    grafana::CredentialSource,
    store::ObjectKey,
    GrafanaClient, OperatorConfig, OperatorContext, SecretCredentials,
};
use kube::Client;
use std::{env, sync::Arc};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "dotenv")]
    dotenv::dotenv().ok();

    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_env("GRAFANA_LOG").or(EnvFilter::try_new("info"))?;
    let logger = logger.with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
        if metadata.level() != &tracing::Level::DEBUG {
            return true;
        }
        if env::var("GRAFANA_LOG_ALL").unwrap_or("0".to_string()) == "1" {
            return true;
        }
        !(metadata.target().starts_with("h2::")
            || metadata.target().starts_with("rustls::")
            || metadata.target().starts_with("hyper_util::client::")
            || metadata.target().starts_with("hyper::proto::")
            || metadata.target() == "reqwest::connect"
            || metadata.target() == "tower::buffer::worker"
            || metadata.target() == "kube_runtime::controller")
    }));
    tracing_subscriber::registry().with(env_filter).with(logger).init();

    let config = OperatorConfig::from_env()?;

    info!("Loading k8s client...");
    let k8s = Client::try_default().await?;

    info!(
        "Checking Grafana credentials in secret {}/{}...",
        config.secret_namespace, config.secret_name
    );
    let credentials = SecretCredentials::new(
        k8s.clone(),
        ObjectKey::new(&config.secret_namespace, &config.secret_name),
    );
    credentials.credentials().await?;

    let grafana = GrafanaClient::new(&config.grafana_url, config.request_timeout, credentials)?;
    let context = Arc::new(OperatorContext {
        k8s: k8s.clone(),
        grafana,
        config,
        pending_organizations: Default::default(),
        pending_teams: Default::default(),
    });

    info!("Starting controllers...");
    let organization_controller = organization::run(context.clone());
    let team_controller = team::run(context.clone());

    tokio::join!(organization_controller, team_controller);

    Ok(())
}
