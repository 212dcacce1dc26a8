//! Tenant-scoped in-memory resource store.
//!
//! Stands in for the CRUD backend behind the cache: resources are JSON
//! documents grouped by kind (`servers`, `cdns`, ...) and owned by a tenant.
//! Every read is counted so callers can see how much traffic the cache
//! absorbed.

use dashmap::DashMap;
use herd_core::TenantId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A stored resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u64,
    pub kind: String,
    pub data: serde_json::Value,
}

type Collection = BTreeMap<u64, serde_json::Value>;

/// In-memory resource store keyed by tenant and kind.
#[derive(Debug, Default)]
pub struct ResourceStore {
    collections: DashMap<(TenantId, String), Collection>,
    next_id: AtomicU64,
    reads: AtomicU64,
    /// Simulated backend latency applied to every read.
    read_latency: Duration,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub async fn list(&self, tenant_id: TenantId, kind: &str) -> Vec<Resource> {
        self.note_read().await;
        self.collections
            .get(&(tenant_id, kind.to_string()))
            .map(|collection| {
                collection
                    .iter()
                    .map(|(id, data)| Resource {
                        id: *id,
                        kind: kind.to_string(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn get(&self, tenant_id: TenantId, kind: &str, id: u64) -> Option<Resource> {
        self.note_read().await;
        self.collections
            .get(&(tenant_id, kind.to_string()))
            .and_then(|collection| collection.get(&id).cloned())
            .map(|data| Resource {
                id,
                kind: kind.to_string(),
                data,
            })
    }

    pub fn create(&self, tenant_id: TenantId, kind: &str, data: serde_json::Value) -> Resource {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.collections
            .entry((tenant_id, kind.to_string()))
            .or_default()
            .insert(id, data.clone());
        Resource {
            id,
            kind: kind.to_string(),
            data,
        }
    }

    /// Replace an existing resource. Returns `None` if it does not exist.
    pub fn update(
        &self,
        tenant_id: TenantId,
        kind: &str,
        id: u64,
        data: serde_json::Value,
    ) -> Option<Resource> {
        let mut collection = self.collections.get_mut(&(tenant_id, kind.to_string()))?;
        let slot = collection.get_mut(&id)?;
        *slot = data.clone();
        Some(Resource {
            id,
            kind: kind.to_string(),
            data,
        })
    }

    /// Delete a resource. Returns whether it existed.
    pub fn delete(&self, tenant_id: TenantId, kind: &str, id: u64) -> bool {
        self.collections
            .get_mut(&(tenant_id, kind.to_string()))
            .map(|mut collection| collection.remove(&id).is_some())
            .unwrap_or(false)
    }

    async fn note_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !self.read_latency.is_zero() {
            tokio::time::sleep(self.read_latency).await;
        }
    }
}
