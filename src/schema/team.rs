use crate::{
    store::ObjectKey,
    util::{GetStatus, IsReady},
    Result,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(kind = "GrafanaTeam", group = "grafana.tcodelab.com", version = "v1alpha1", namespaced)]
#[kube(status = "GrafanaTeamStatus", shortname = "gt", shortname = "team")]
#[kube(printcolumn = r#"{"name":"Team ID","type":"integer","jsonPath":".status.team_id"}"#)]
#[serde(rename_all = "camelCase")]
pub struct GrafanaTeamSpec {
    #[schemars(length(min = 1, max = 200))]
    pub name: String,
    /// Name of the GrafanaOrganization in the same namespace that owns this team.
    /// Defaults to the name of the GrafanaTeam itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_ref: Option<String>,
}
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct GrafanaTeamStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
}
impl GrafanaTeam {
    pub fn team_id(&self) -> Option<i64> {
        self.get_status().as_ref().and_then(|s| s.team_id)
    }

    /// Name of the parent GrafanaOrganization.
    pub fn organization_name(&self) -> String {
        self.spec.organization_ref.clone().unwrap_or_else(|| self.name_any())
    }

    /// Key of the parent GrafanaOrganization; always in the team's namespace.
    pub fn organization_key(&self) -> Result<ObjectKey> {
        let own = ObjectKey::from_resource(self)?;
        Ok(ObjectKey::new(own.namespace, self.organization_name()))
    }
}
impl IsReady for GrafanaTeam {
    fn is_ready(&self) -> bool {
        self.team_id().is_some()
    }
}
impl GetStatus for GrafanaTeam {
    type Status = GrafanaTeamStatus;
    fn get_status(&self) -> &Option<Self::Status> {
        &self.status
    }
    #[cfg(test)]
    fn status_mut(&mut self) -> &mut Option<Self::Status> {
        &mut self.status
    }
}
