use crate::util::GetStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(kind = "GrafanaOrganization", group = "grafana.tcodelab.com", version = "v1alpha1", namespaced)]
#[kube(status = "GrafanaOrganizationStatus", shortname = "gorg", shortname = "org")]
#[kube(printcolumn = r#"{"name":"Grafana ID","type":"integer","jsonPath":".status.organizationID"}"#)]
pub struct GrafanaOrganizationSpec {
    /// Name of the organization in Grafana. Only used on creation.
    #[schemars(length(min = 1, max = 200))]
    pub name: String,
}
#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct GrafanaOrganizationStatus {
    #[serde(rename = "organizationID", default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<i64>,
}
impl GrafanaOrganization {
    /// Remote id, once the organization has been created in Grafana.
    pub fn organization_id(&self) -> Option<i64> {
        self.get_status().as_ref().and_then(|s| s.organization_id)
    }
}
impl GetStatus for GrafanaOrganization {
    type Status = GrafanaOrganizationStatus;
    fn get_status(&self) -> &Option<Self::Status> {
        &self.status
    }
    #[cfg(test)]
    fn status_mut(&mut self) -> &mut Option<Self::Status> {
        &mut self.status
    }
}
