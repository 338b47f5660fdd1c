//! `{status, counts, completed_at, trigger, reasons}`, spec.md §6's
//! scheduler invocation surface — the structured summary every task
//! handler returns regardless of which domain crate it wraps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Partial,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub counts: HashMap<String, u64>,
    pub completed_at: DateTime<Utc>,
    pub trigger: String,
    pub reasons: Vec<String>,
}

impl TaskOutcome {
    pub fn success(trigger: impl Into<String>) -> Self {
        Self { status: TaskStatus::Success, counts: HashMap::new(), completed_at: Utc::now(), trigger: trigger.into(), reasons: Vec::new() }
    }

    pub fn skipped(trigger: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { status: TaskStatus::Skipped, counts: HashMap::new(), completed_at: Utc::now(), trigger: trigger.into(), reasons: vec![reason.into()] }
    }

    pub fn with_count(mut self, key: impl Into<String>, value: u64) -> Self {
        self.counts.insert(key.into(), value);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }

    /// Demotes `Success` to `Partial` without discarding already-recorded
    /// counts, for tasks with more than one sub-step (e.g. ingestion sync
    /// across `sync_stores`/`sync_products`/`sync_transactions`/`sync_inventory`)
    /// where one sub-step failing shouldn't hide the others' results.
    pub fn mark_partial(mut self, reason: impl Into<String>) -> Self {
        if self.status == TaskStatus::Success {
            self.status = TaskStatus::Partial;
        }
        self.reasons.push(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_partial_does_not_override_failed() {
        let outcome = TaskOutcome::success("scheduled").with_count("processed", 3);
        let mut failed = outcome.clone();
        failed.status = TaskStatus::Failed;
        let demoted = failed.mark_partial("one source errored");
        assert_eq!(demoted.status, TaskStatus::Failed);
    }

    #[test]
    fn mark_partial_demotes_success() {
        let outcome = TaskOutcome::success("scheduled").mark_partial("one source errored");
        assert_eq!(outcome.status, TaskStatus::Partial);
        assert_eq!(outcome.reasons.len(), 1);
    }
}
