mod organization;
mod team;

pub use organization::{GrafanaOrganization, GrafanaOrganizationSpec, GrafanaOrganizationStatus};
pub use team::{GrafanaTeam, GrafanaTeamSpec, GrafanaTeamStatus};
