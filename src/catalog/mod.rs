//! Cluster/command catalog: tag criteria, records, and the read seam the
//! resolver consumes.
//!
//! Catalog reads return snapshots in a stable order (creation time, then
//! lexicographic id) so that repeated resolution against an unchanged
//! catalog is deterministic. Admin mutations on [`InMemoryCatalog`] never
//! affect a snapshot already handed out.

pub mod cluster;
pub mod command;
pub mod criterion;

pub use cluster::{ClusterRecord, ClusterStatus};
pub use command::{CommandRecord, CommandStatus};
pub use criterion::TagCriterion;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{FedjobError, Result};

/// Read-only catalog seam. Backed by a database in production; the in-memory
/// implementation below serves single-instance deployments and tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List clusters, optionally restricted to one status, in stable order.
    async fn list_clusters(&self, status: Option<ClusterStatus>) -> Result<Vec<ClusterRecord>>;

    /// List commands, optionally restricted to one status, in stable order.
    async fn list_commands(&self, status: Option<CommandStatus>) -> Result<Vec<CommandRecord>>;
}

/// In-memory catalog with admin mutations.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    clusters: RwLock<HashMap<Uuid, ClusterRecord>>,
    commands: RwLock<HashMap<Uuid, CommandRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn save_cluster(&self, cluster: ClusterRecord) -> Uuid {
        let id = cluster.id;
        self.clusters.write().await.insert(id, cluster);
        tracing::info!(cluster_id = %id, "Cluster registered");
        id
    }

    pub async fn save_command(&self, command: CommandRecord) -> Uuid {
        let id = command.id;
        self.commands.write().await.insert(id, command);
        tracing::info!(command_id = %id, "Command registered");
        id
    }

    pub async fn set_cluster_status(&self, id: Uuid, status: ClusterStatus) -> Result<()> {
        let mut clusters = self.clusters.write().await;
        let cluster = clusters
            .get_mut(&id)
            .ok_or_else(|| FedjobError::DataSource(format!("unknown cluster {id}")))?;
        cluster.status = status;
        tracing::info!(cluster_id = %id, status = %status, "Cluster status updated");
        Ok(())
    }

    pub async fn set_command_status(&self, id: Uuid, status: CommandStatus) -> Result<()> {
        let mut commands = self.commands.write().await;
        let command = commands
            .get_mut(&id)
            .ok_or_else(|| FedjobError::DataSource(format!("unknown command {id}")))?;
        command.status = status;
        tracing::info!(command_id = %id, status = %status, "Command status updated");
        Ok(())
    }

    pub async fn remove_cluster(&self, id: Uuid) -> bool {
        self.clusters.write().await.remove(&id).is_some()
    }

    pub async fn remove_command(&self, id: Uuid) -> bool {
        self.commands.write().await.remove(&id).is_some()
    }
}

fn sort_stable<T>(records: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<chrono::Utc>, Uuid)) {
    records.sort_by_key(|r| {
        let (created, id) = key(r);
        (created, id.to_string())
    });
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn list_clusters(&self, status: Option<ClusterStatus>) -> Result<Vec<ClusterRecord>> {
        let clusters = self.clusters.read().await;
        let mut out: Vec<ClusterRecord> = clusters
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        sort_stable(&mut out, |c| (c.created, c.id));
        Ok(out)
    }

    async fn list_commands(&self, status: Option<CommandStatus>) -> Result<Vec<CommandRecord>> {
        let commands = self.commands.read().await;
        let mut out: Vec<CommandRecord> = commands
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        sort_stable(&mut out, |c| (c.created, c.id));
        Ok(out)
    }
}
