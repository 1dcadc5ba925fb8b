use std::collections::HashSet;

use crate::catalog::{ClusterRecord, ClusterStatus, CommandRecord, CommandStatus, TagCriterion};
use crate::error::{FedjobError, Result};

/// Outcome of criteria resolution: the concrete pair a job will run as.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub cluster: ClusterRecord,
    pub command: CommandRecord,
}

/// Resolve a job's placement criteria to one (cluster, command) pair.
///
/// The job's criteria are scanned in priority order. For each criterion the
/// candidate set is every UP cluster whose tags are a superset of the
/// criterion's tags; an empty candidate set falls through to the next
/// criterion. Against the first nonempty candidate set, commands are scanned
/// in catalog order: a command qualifies iff it is ACTIVE, carries all of the
/// job's command tags, and at least one of its own cluster criteria (in the
/// command's priority order) matches a candidate. The returned cluster is the
/// first candidate matched by the qualifying command's earliest matching
/// criterion, so resolution against an unchanged catalog is deterministic.
///
/// Pure function over the snapshots passed in; callers hand it the catalog
/// listing, which is already in stable `(created, id)` order.
pub fn resolve(
    cluster_criteria: &[TagCriterion],
    command_tags: &HashSet<String>,
    clusters: &[ClusterRecord],
    commands: &[CommandRecord],
) -> Result<Resolution> {
    for (rank, criterion) in cluster_criteria.iter().enumerate() {
        let candidates: Vec<&ClusterRecord> = clusters
            .iter()
            .filter(|c| c.status == ClusterStatus::Up && criterion.matches(&c.tags, c.status))
            .collect();
        if candidates.is_empty() {
            tracing::debug!(criterion_rank = rank, "No cluster matched criterion, trying next");
            continue;
        }

        for command in commands {
            if command.status != CommandStatus::Active {
                continue;
            }
            if !command_tags.is_subset(&command.tags) {
                continue;
            }
            // Cross-validate: the command's own cluster criteria must accept
            // one of the candidates. A command with no criteria never
            // qualifies.
            let matched = command.cluster_criteria.iter().find_map(|cc| {
                candidates
                    .iter()
                    .find(|cluster| cc.matches(&cluster.tags, cluster.status))
            });
            if let Some(cluster) = matched {
                tracing::debug!(
                    cluster_id = %cluster.id,
                    command_id = %command.id,
                    criterion_rank = rank,
                    "Resolved cluster/command pair"
                );
                return Ok(Resolution {
                    cluster: (*cluster).clone(),
                    command: command.clone(),
                });
            }
        }
        // Clusters matched but no command qualified; a lower-priority
        // criterion may still pair with a different candidate set.
        tracing::debug!(
            criterion_rank = rank,
            candidates = candidates.len(),
            "No qualifying command for matched clusters"
        );
    }

    Err(FedjobError::NoMatchFound)
}
