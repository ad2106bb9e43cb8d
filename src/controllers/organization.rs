use crate::{
    controllers::{publish_created, Outcome},
    grafana::GrafanaApi,
    schema::{GrafanaOrganization, GrafanaOrganizationStatus},
    store::{update_status_with_retry, KubeStore, ObjectKey, PendingStatus, ResourceStore},
    Error, OperatorContext, Result,
};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher::Config, Controller},
    Api, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Makes sure the organization behind `key` exists in Grafana and its id is recorded.
///
/// Creation happens at most once per object: as soon as `status.organizationID` is set the
/// organization is left alone, even if its name changes. An id that was created but could not be
/// written is kept in `pending` and written by the next invocation instead of creating again.
pub async fn ensure_organization<S, G>(
    store: &S,
    grafana: &G,
    pending: &PendingStatus<GrafanaOrganizationStatus>,
    key: &ObjectKey,
) -> Result<Outcome>
where
    S: ResourceStore<GrafanaOrganization>,
    G: GrafanaApi,
{
    let Some(org) = store.get(key).await? else {
        debug!("organization {key} not found, assuming it was deleted");
        pending.forget(key);
        return Ok(Outcome::NotFound);
    };

    if let Some(id) = org.organization_id() {
        debug!("organization {key} already exists in Grafana with id {id}");
        pending.forget(key);
        return Ok(Outcome::AlreadyReconciled(id));
    }

    let uid = org.uid();
    let status = match pending.take(key, &uid) {
        Some(status) => {
            info!("recording previously created Grafana organization for {key}");
            status
        }
        None => {
            let id = grafana.create_organization(&org.spec.name).await?;
            info!("created Grafana organization {} with id {id}", org.spec.name);
            GrafanaOrganizationStatus {
                organization_id: Some(id),
            }
        }
    };
    let id = status.organization_id.unwrap_or_default();

    if let Err(e) = update_status_with_retry::<GrafanaOrganization, _>(store, key, status.clone()).await {
        pending.remember(key, uid, status);
        return Err(Error::StatusWriteFailed {
            key: key.to_string(),
            remote_id: id,
            source: Box::new(e),
        });
    }

    Ok(Outcome::Created(id))
}

#[instrument(skip(ctx, org))]
async fn reconcile(org: Arc<GrafanaOrganization>, ctx: Arc<OperatorContext>) -> Result<Action> {
    let key = ObjectKey::from_resource(org.as_ref())?;
    info!("reconciling organization {key}");

    let store = KubeStore::<GrafanaOrganization>::new(ctx.k8s.clone());
    let outcome = ensure_organization(&store, &ctx.grafana, &ctx.pending_organizations, &key).await?;

    if let Outcome::Created(id) = outcome {
        publish_created(
            &ctx.build_recorder(),
            org.as_ref(),
            format!("Organization {} created in Grafana with id {id}", org.spec.name),
        )
        .await;
    }

    Ok(outcome.into_action(ctx.config.resync_interval))
}

fn error_policy(org: Arc<GrafanaOrganization>, error: &Error, _: Arc<OperatorContext>) -> Action {
    warn!("reconcile of organization {} failed: {:?}", org.name_any(), error);
    Action::requeue(error.retry_after())
}

pub async fn run(context: Arc<OperatorContext>) {
    let orgs = Api::<GrafanaOrganization>::all(context.k8s.clone());
    Controller::new(orgs, Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
