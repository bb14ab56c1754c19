//! Configuration for the stage workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// What registering an already-known batch ID does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Reset the existing batch to `Supplier` / `Restocked` and log a restock
    #[default]
    Restock,
    /// Fail with `DuplicateBatch`
    Reject,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::Restock => write!(f, "restock"),
            DuplicatePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Workflow configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Handling of duplicate batch registration
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl WorkflowConfig {
    /// Config with an explicit duplicate policy
    pub fn with_duplicate_policy(duplicate_policy: DuplicatePolicy) -> Self {
        Self { duplicate_policy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkflowConfig::default();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Restock);
    }

    #[test]
    fn test_policy_from_json() {
        let config: WorkflowConfig =
            serde_json::from_str(r#"{"duplicate_policy":"reject"}"#).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);

        let config: WorkflowConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Restock);
    }
}
