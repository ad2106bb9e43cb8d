use kube::{
    api::{Patch, PatchParams},
    Api, Resource,
};
use serde::{de, Serialize};
use serde_json::json;

pub(crate) static FIELD_MANAGER: &str = "grafana-operator";

pub async fn patch_status<T: Resource<DynamicType = ()> + de::DeserializeOwned, S: Serialize>(
    api: &Api<T>,
    name: &str,
    status: S,
) -> Result<(), kube::Error> {
    api.patch_status(
        name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(json!({
            "apiVersion": T::api_version(&()),
            "kind": T::kind(&()),
            "status": status
        })),
    )
    .await
    .map(|_| ())
}

pub trait IsReady {
    fn is_ready(&self) -> bool;
}
pub trait GetStatus {
    type Status;
    fn get_status(&self) -> &Option<Self::Status>;
    #[cfg(test)]
    fn status_mut(&mut self) -> &mut Option<Self::Status>;
}
