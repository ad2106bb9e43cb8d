use crate::{
    grafana::GrafanaApi,
    store::{ObjectKey, ResourceStore},
    util::GetStatus,
    Error, Result,
};
use kube::Resource;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// In-memory store that counts writes and can be told to fail them.
pub struct MemoryStore<K> {
    objects: Mutex<BTreeMap<ObjectKey, K>>,
    status_writes: AtomicUsize,
    failing_writes: AtomicUsize,
}
impl<K: Resource + Clone> MemoryStore<K> {
    pub fn new(objects: impl IntoIterator<Item = K>) -> Self {
        Self {
            objects: Mutex::new(
                objects
                    .into_iter()
                    .map(|o| (ObjectKey::from_resource(&o).unwrap(), o))
                    .collect(),
            ),
            status_writes: AtomicUsize::new(0),
            failing_writes: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` status writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    pub fn object(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}
impl<K: GetStatus + Clone> ResourceStore<K> for MemoryStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn update_status(&self, key: &ObjectKey, status: K::Status) -> Result<()> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::Other("status write rejected".to_string()));
        }
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| Error::Other(format!("{key} not found")))?;
        *object.status_mut() = Some(status);
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Grafana stand-in that hands out fixed ids and records every call.
#[derive(Default)]
pub struct FakeGrafana {
    pub org_id: i64,
    pub team_id: i64,
    /// Status code to fail every call with.
    pub fail_with: Option<u16>,
    pub calls: Mutex<Vec<String>>,
}
impl FakeGrafana {
    pub fn returning(org_id: i64, team_id: i64) -> Self {
        Self {
            org_id,
            team_id,
            ..Default::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_with: Some(status),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: String, id: i64, operation: &'static str) -> Result<i64> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with {
            Some(code) => Err(Error::RemoteStatus {
                operation,
                status: reqwest::StatusCode::from_u16(code).unwrap(),
                body: String::new(),
            }),
            None => Ok(id),
        }
    }
}
impl GrafanaApi for FakeGrafana {
    async fn create_organization(&self, name: &str) -> Result<i64> {
        self.respond(format!("org:{name}"), self.org_id, "create organization")
    }

    async fn create_team(&self, name: &str, org_id: i64) -> Result<i64> {
        self.respond(format!("team:{name}@{org_id}"), self.team_id, "create team")
    }
}
