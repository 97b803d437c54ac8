use std::fmt;

/// Result of publishing a staging set to one registry target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// The target refused the release (validation or a permanent upload error).
    Rejected(String),
    /// The target could not be reached or timed out; safe to re-invoke later.
    TransientFailure(String),
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Published => write!(f, "published"),
            PublishOutcome::Rejected(reason) => write!(f, "rejected: {reason}"),
            PublishOutcome::TransientFailure(reason) => write!(f, "transient failure: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    pub outcome: PublishOutcome,
}

/// Outcomes for every target, in the order the targets were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub targets: Vec<TargetReport>,
}

impl PublishReport {
    pub fn all_published(&self) -> bool {
        self.targets.iter().all(|t| t.outcome.is_success())
    }

    pub fn failed_targets(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|t| !t.outcome.is_success())
            .map(|t| t.target.clone())
            .collect()
    }

    pub fn outcome(&self, target: &str) -> Option<&PublishOutcome> {
        self.targets
            .iter()
            .find(|t| t.target == target)
            .map(|t| &t.outcome)
    }
}
