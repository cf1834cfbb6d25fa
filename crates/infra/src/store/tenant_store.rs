use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use defter_core::TenantId;

/// Tenant-isolated key/value collection abstraction.
///
/// Every call takes the tenant explicitly; there is no ambient tenant state
/// anywhere in the storage layer.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    /// Insert only if the key is absent. Returns whether the insert happened.
    fn insert_new(&self, tenant_id: TenantId, key: K, value: V) -> bool;
    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Drop every record of the tenant for which `keep` returns false.
    fn retain(&self, tenant_id: TenantId, keep: &mut dyn FnMut(&V) -> bool);
    /// Clear all records for a tenant.
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn insert_new(&self, tenant_id: TenantId, key: K, value: V) -> bool {
        (**self).insert_new(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn retain(&self, tenant_id: TenantId, keep: &mut dyn FnMut(&V) -> bool) {
        (**self).retain(tenant_id, keep)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory tenant-isolated store (the dev/test backend; a document
/// database sits behind the same trait in a persistent deployment).
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, key.clone())).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, key), value);
        }
    }

    fn insert_new(&self, tenant_id: TenantId, key: K, value: V) -> bool {
        match self.inner.write() {
            Ok(mut map) => {
                let slot = (tenant_id, key);
                if map.contains_key(&slot) {
                    false
                } else {
                    map.insert(slot, value);
                    true
                }
            }
            Err(_) => false,
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let mut map = self.inner.write().ok()?;
        map.remove(&(tenant_id, key.clone()))
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _k), v)| if *t == tenant_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn retain(&self, tenant_id: TenantId, keep: &mut dyn FnMut(&V) -> bool) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), v| *t != tenant_id || keep(v));
        }
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(t, _k), _v| *t != tenant_id);
        }
    }
}
