//! Access to the desired-state objects the reconcilers work on.
//!
//! Reconcilers only ever need two things from the cluster: the current version of an object,
//! and a way to record what they created. [`ResourceStore`] captures exactly that so the
//! reconcile logic can run against Kubernetes in production and an in-memory map in tests.

use crate::{
    util::{patch_status, GetStatus},
    Error, Result,
};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::Mutex,
    time::Duration,
};
use tokio::time::sleep;
use tracing::warn;

const STATUS_WRITE_ATTEMPTS: u32 = 3;
const STATUS_WRITE_BACKOFF: Duration = Duration::from_millis(100);

/// Namespace and name of a namespaced object.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}
impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_resource<K: Resource>(resource: &K) -> Result<Self> {
        let namespace = resource
            .namespace()
            .ok_or_else(|| Error::Other(format!("{} has no namespace", resource.name_any())))?;
        Ok(Self::new(namespace, resource.name_any()))
    }
}
impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

pub trait ResourceStore<K: GetStatus> {
    /// Fetches the object, `None` if it does not exist (anymore).
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>>;
    /// Replaces the status of the object.
    async fn update_status(&self, key: &ObjectKey, status: K::Status) -> Result<()>;
}

/// Writes `status`, retrying a few times with a growing delay before giving up.
pub async fn update_status_with_retry<K, S>(store: &S, key: &ObjectKey, status: K::Status) -> Result<()>
where
    K: GetStatus,
    K::Status: Clone,
    S: ResourceStore<K>,
{
    let mut attempt = 1;
    loop {
        match store.update_status(key, status.clone()).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < STATUS_WRITE_ATTEMPTS => {
                warn!("status write for {key} failed (attempt {attempt}): {e}");
                sleep(STATUS_WRITE_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Statuses whose remote object exists but which could not be written yet.
///
/// Entries are tied to the object's uid so a deleted and recreated object with the same name
/// does not inherit the id of its predecessor.
pub struct PendingStatus<S> {
    entries: Mutex<HashMap<ObjectKey, (Option<String>, S)>>,
}
impl<S> Default for PendingStatus<S> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}
impl<S> PendingStatus<S> {
    pub fn remember(&self, key: &ObjectKey, uid: Option<String>, status: S) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.clone(), (uid, status));
        }
    }

    /// Removes and returns the pending status of `key` if it belongs to the object with `uid`.
    pub fn take(&self, key: &ObjectKey, uid: &Option<String>) -> Option<S> {
        let mut entries = self.entries.lock().ok()?;
        match entries.remove(key) {
            Some((pending_uid, status)) if &pending_uid == uid => Some(status),
            _ => None,
        }
    }

    pub fn forget(&self, key: &ObjectKey) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// [`ResourceStore`] backed by the Kubernetes API server.
pub struct KubeStore<K> {
    client: Client,
    kind: PhantomData<K>,
}
impl<K> KubeStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            kind: PhantomData,
        }
    }
}
impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}
impl<K> ResourceStore<K> for KubeStore<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + GetStatus
        + Clone
        + DeserializeOwned
        + fmt::Debug,
    K::Status: Serialize,
{
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>> {
        Ok(Api::<K>::namespaced(self.client.clone(), &key.namespace)
            .get_opt(&key.name)
            .await?)
    }

    async fn update_status(&self, key: &ObjectKey, status: K::Status) -> Result<()> {
        let api = Api::<K>::namespaced(self.client.clone(), &key.namespace);
        Ok(patch_status(&api, &key.name, status).await?)
    }
}
