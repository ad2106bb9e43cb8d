use crate::{
    controllers::{publish_created, Outcome},
    grafana::GrafanaApi,
    schema::{GrafanaOrganization, GrafanaTeam, GrafanaTeamStatus},
    store::{update_status_with_retry, KubeStore, ObjectKey, PendingStatus, ResourceStore},
    util::IsReady,
    Error, OperatorContext, Result,
};
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, metadata_watcher, reflector::ObjectRef, watcher::Config, Controller, WatchStreamExt},
    Api, ResourceExt,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Makes sure the team behind `key` exists in Grafana, inside its parent organization.
///
/// A team is only created once its GrafanaOrganization carries a remote id. Until then the
/// reconcile ends with [`Outcome::ParentNotReady`] or [`Outcome::ParentNotFound`] and no remote call.
pub async fn ensure_team<T, O, G>(
    teams: &T,
    orgs: &O,
    grafana: &G,
    pending: &PendingStatus<GrafanaTeamStatus>,
    key: &ObjectKey,
) -> Result<Outcome>
where
    T: ResourceStore<GrafanaTeam>,
    O: ResourceStore<GrafanaOrganization>,
    G: GrafanaApi,
{
    let Some(team) = teams.get(key).await? else {
        debug!("team {key} not found, assuming it was deleted");
        pending.forget(key);
        return Ok(Outcome::NotFound);
    };

    if let Some(id) = team.team_id() {
        debug!("team {key} already exists in Grafana with id {id}");
        pending.forget(key);
        return Ok(Outcome::AlreadyReconciled(id));
    }

    let uid = team.uid();
    let status = match pending.take(key, &uid) {
        Some(status) => {
            info!("recording previously created Grafana team for {key}");
            status
        }
        None => {
            let org_key = team.organization_key()?;
            let Some(org) = orgs.get(&org_key).await? else {
                warn!("organization {org_key} referenced by team {key} does not exist");
                return Ok(Outcome::ParentNotFound(org_key));
            };
            let Some(org_id) = org.organization_id() else {
                info!("organization {org_key} has not been created in Grafana yet, postponing team {key}");
                return Ok(Outcome::ParentNotReady(org_key));
            };

            let team_id = grafana.create_team(&team.spec.name, org_id).await?;
            info!("created Grafana team {} with id {team_id} in organization {org_id}", team.spec.name);
            GrafanaTeamStatus {
                org_id: Some(org_id),
                team_id: Some(team_id),
            }
        }
    };
    let team_id = status.team_id.unwrap_or_default();

    if let Err(e) = update_status_with_retry::<GrafanaTeam, _>(teams, key, status.clone()).await {
        pending.remember(key, uid, status);
        return Err(Error::StatusWriteFailed {
            key: key.to_string(),
            remote_id: team_id,
            source: Box::new(e),
        });
    }

    Ok(Outcome::Created(team_id))
}

#[instrument(skip(ctx, team))]
async fn reconcile(team: Arc<GrafanaTeam>, ctx: Arc<OperatorContext>) -> Result<Action> {
    let key = ObjectKey::from_resource(team.as_ref())?;
    info!("reconciling team {key}");

    let teams = KubeStore::<GrafanaTeam>::new(ctx.k8s.clone());
    let orgs = KubeStore::<GrafanaOrganization>::new(ctx.k8s.clone());
    let outcome = ensure_team(&teams, &orgs, &ctx.grafana, &ctx.pending_teams, &key).await?;

    if let Outcome::Created(id) = outcome {
        publish_created(
            &ctx.build_recorder(),
            team.as_ref(),
            format!("Team {} created in Grafana with id {id}", team.spec.name),
        )
        .await;
    }

    Ok(outcome.into_action(ctx.config.resync_interval))
}

fn error_policy(team: Arc<GrafanaTeam>, error: &Error, _: Arc<OperatorContext>) -> Action {
    warn!("reconcile of team {} failed: {:?}", team.name_any(), error);
    Action::requeue(error.retry_after())
}

/// Teams still waiting for the organization `namespace/name`.
fn teams_for_organization(
    teams: &[Arc<GrafanaTeam>],
    namespace: Option<String>,
    name: &str,
) -> Vec<ObjectRef<GrafanaTeam>> {
    teams
        .iter()
        .filter(|team| !team.is_ready() && team.namespace() == namespace && team.organization_name() == name)
        .map(|team| ObjectRef::from_obj(team.as_ref()))
        .collect()
}

pub async fn run(context: Arc<OperatorContext>) {
    let teams = Api::<GrafanaTeam>::all(context.k8s.clone());
    let orgs = Api::<GrafanaOrganization>::all(context.k8s.clone());
    let controller = Controller::new(teams, Config::default().any_semantic());
    let store = controller.store();
    controller
        .watches_stream(
            metadata_watcher(orgs, Config::default()).touched_objects(),
            move |org| teams_for_organization(&store.state(), org.namespace(), &org.name_any()),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
}
