use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TagCriterion;
use crate::error::{FedjobError, Result};
use crate::job::JobStatus;

/// A client submission: what to run and where it may be placed. Immutable
/// after validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: Uuid,
    /// Placement criteria in priority order; the first criterion matching
    /// any UP cluster wins.
    pub cluster_criteria: Vec<TagCriterion>,
    /// Tags the chosen command must carry.
    pub command_tags: HashSet<String>,
    /// Arguments appended to the command's executable prefix.
    pub command_args: Vec<String>,
    /// Wall-clock budget measured from start time; exceeded jobs are killed.
    pub timeout_ms: Option<u64>,
    pub disable_log_archival: bool,
}

impl JobRequest {
    pub fn new<I, S>(cluster_criteria: Vec<TagCriterion>, command_tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let request = Self {
            id: Uuid::new_v4(),
            cluster_criteria,
            command_tags: command_tags.into_iter().map(Into::into).collect(),
            command_args: Vec::new(),
            timeout_ms: None,
            disable_log_archival: false,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cluster_criteria.is_empty() {
            return Err(FedjobError::Validation(
                "job requires at least one cluster criterion".to_string(),
            ));
        }
        if self.command_tags.is_empty() {
            return Err(FedjobError::Validation(
                "job requires at least one command tag".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(FedjobError::Validation(
                "timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Filter for job search. All fields optional; unset means unfiltered.
#[derive(Debug, Clone, Default)]
pub struct JobSearchFilter {
    pub command_id: Option<Uuid>,
    pub statuses: Option<HashSet<JobStatus>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl JobSearchFilter {
    pub fn with_command_id(mut self, id: Uuid) -> Self {
        self.command_id = Some(id);
        self
    }

    pub fn with_statuses<I: IntoIterator<Item = JobStatus>>(mut self, statuses: I) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_rejected() {
        let err = JobRequest::new(Vec::new(), ["type:date"]).unwrap_err();
        assert!(matches!(err, FedjobError::Validation(_)));
    }

    #[test]
    fn empty_command_tags_rejected() {
        let criterion = TagCriterion::new(["type:date"]).unwrap();
        let err = JobRequest::new(vec![criterion], Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, FedjobError::Validation(_)));
    }

    #[test]
    fn zero_timeout_rejected() {
        let criterion = TagCriterion::new(["type:date"]).unwrap();
        let request = JobRequest::new(vec![criterion], ["type:date"])
            .unwrap()
            .with_timeout_ms(0);
        assert!(request.validate().is_err());
    }
}
