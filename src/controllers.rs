use kube::{
    runtime::{
        controller::Action,
        events::{Event, EventType, Recorder},
    },
    Resource,
};
use std::time::Duration;
use tracing::warn;

pub mod organization;
pub mod team;

/// Result of a single reconcile invocation that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The remote object was created and its id recorded in status.
    Created(i64),
    /// Status already holds a remote id; nothing to do.
    AlreadyReconciled(i64),
    /// The resource is gone.
    NotFound,
    /// The referenced organization does not exist.
    ParentNotFound(crate::store::ObjectKey),
    /// The referenced organization has not been created in Grafana yet.
    ParentNotReady(crate::store::ObjectKey),
}

impl Outcome {
    pub fn into_action(self, resync: Duration) -> Action {
        match self {
            Outcome::Created(_) | Outcome::AlreadyReconciled(_) | Outcome::NotFound => Action::await_change(),
            Outcome::ParentNotFound(_) | Outcome::ParentNotReady(_) => Action::requeue(resync),
        }
    }
}

pub(crate) async fn publish_created<K: Resource<DynamicType = ()>>(recorder: &Recorder, resource: &K, note: String) {
    let event = Event {
        type_: EventType::Normal,
        reason: "Created".to_string(),
        note: Some(note),
        action: "Creating".to_string(),
        secondary: None,
    };
    // status is already written at this point
    if let Err(e) = recorder.publish(&event, &resource.object_ref(&())).await {
        warn!("failed to publish event: {:?}", e);
    }
}
