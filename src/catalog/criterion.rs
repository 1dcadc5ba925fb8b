use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::catalog::ClusterStatus;
use crate::error::{FedjobError, Result};

/// A set of required tags plus an optional cluster status filter. The atomic
/// unit of placement matching: a cluster satisfies a criterion iff its tag
/// set is a superset of the criterion's tags and its status matches the
/// filter (if one is present).
///
/// Immutable once constructed; an empty tag set is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCriterion {
    tags: HashSet<String>,
    status: Option<ClusterStatus>,
}

impl TagCriterion {
    pub fn new<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: HashSet<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            return Err(FedjobError::Validation(
                "criterion requires at least one tag".to_string(),
            ));
        }
        Ok(Self { tags, status: None })
    }

    /// Restrict matches to clusters in the given status. Without a filter,
    /// callers decide which statuses are eligible (the resolver only ever
    /// considers UP clusters regardless).
    pub fn with_status(mut self, status: ClusterStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tags(&self) -> &HashSet<String> {
        &self.tags
    }

    pub fn status(&self) -> Option<ClusterStatus> {
        self.status
    }

    /// True iff `tags` is a superset of this criterion's tags and `status`
    /// passes the filter.
    pub fn matches(&self, tags: &HashSet<String>, status: ClusterStatus) -> bool {
        if let Some(wanted) = self.status {
            if status != wanted {
                return false;
            }
        }
        self.tags.is_subset(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags<const N: usize>(items: [&str; N]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_tag_set_rejected() {
        let err = TagCriterion::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, FedjobError::Validation(_)));
    }

    #[test]
    fn superset_matches() {
        let criterion = TagCriterion::new(["type:date"]).unwrap();
        assert!(criterion.matches(&tags(["type:date", "type:dummy"]), ClusterStatus::Up));
        assert!(!criterion.matches(&tags(["type:dummy"]), ClusterStatus::Up));
    }

    #[test]
    fn status_filter_applies() {
        let criterion = TagCriterion::new(["type:date"])
            .unwrap()
            .with_status(ClusterStatus::Up);
        assert!(criterion.matches(&tags(["type:date"]), ClusterStatus::Up));
        assert!(!criterion.matches(&tags(["type:date"]), ClusterStatus::OutOfService));
    }
}
