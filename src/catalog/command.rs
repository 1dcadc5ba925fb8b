use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TagCriterion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    Active,
    Deprecated,
    Inactive,
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandStatus::Active => write!(f, "active"),
            CommandStatus::Deprecated => write!(f, "deprecated"),
            CommandStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// An executable command in the catalog. `cluster_criteria` declares, in
/// priority order, which clusters this command may run on; a command with an
/// empty list can never be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: Uuid,
    pub name: String,
    pub status: CommandStatus,
    /// argv prefix; the job's own arguments are appended at dispatch
    pub executable: Vec<String>,
    pub tags: HashSet<String>,
    pub cluster_criteria: Vec<TagCriterion>,
    /// memory hint in MB, passed through to the execution layer
    pub memory_mb: u64,
    pub created: DateTime<Utc>,
}

impl CommandRecord {
    pub fn new<I, S>(name: impl Into<String>, executable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: CommandStatus::Active,
            executable: executable.into_iter().map(Into::into).collect(),
            tags: HashSet::new(),
            cluster_criteria: Vec::new(),
            memory_mb: 1024,
            created: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: CommandStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_cluster_criterion(mut self, criterion: TagCriterion) -> Self {
        self.cluster_criteria.push(criterion);
        self
    }
}
