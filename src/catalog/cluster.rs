use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterStatus {
    Up,
    OutOfService,
    Terminated,
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterStatus::Up => write!(f, "up"),
            ClusterStatus::OutOfService => write!(f, "out_of_service"),
            ClusterStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// An execution cluster in the catalog. Eligibility for a job is computed
/// from tags at resolution time, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: Uuid,
    pub name: String,
    pub status: ClusterStatus,
    pub tags: HashSet<String>,
    pub created: DateTime<Utc>,
}

impl ClusterRecord {
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: ClusterStatus::Up,
            tags: tags.into_iter().map(Into::into).collect(),
            created: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: ClusterStatus) -> Self {
        self.status = status;
        self
    }
}
