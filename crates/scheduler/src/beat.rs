//! Per-tenant, per-task-type serialization lock, spec.md §4.L /§5: "within
//! a tenant, a given periodic task is serialized (no two concurrent runs
//! of the same task for the same tenant)". Grounded on
//! `shelfops_alerts::hitl::AlertLocks` and `shelfops_core::database`'s
//! `DashMap`-backed tenant pool cache: a lazily-populated map from key to
//! a per-key `tokio::sync::Mutex<()>`, held for the lifetime of one run.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cadence::TaskKind;

type BeatKey = (Uuid, &'static str, Option<&'static str>);

/// Holds one lock per `(tenant, task, source)` combination. `source` is
/// `None` for tenant-scoped tasks and `Some(adapter_kind)` for the
/// source-scoped ingestion sync task, so two adapters for the same tenant
/// can run concurrently while two runs of the same adapter cannot.
#[derive(Debug, Clone, Default)]
pub struct Beat {
    locks: Arc<DashMap<BeatKey, Arc<Mutex<()>>>>,
}

impl Beat {
    pub fn new() -> Self {
        Self { locks: Arc::new(DashMap::new()) }
    }

    fn lock_for(&self, tenant_id: Uuid, task: TaskKind, source: Option<&'static str>) -> Arc<Mutex<()>> {
        self.locks.entry((tenant_id, task.as_str(), source)).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Runs `f` while holding the `(tenant, task, source)` lock; a second
    /// caller for the same key waits for the first run (released on
    /// completion, failure, or cancellation) rather than running
    /// alongside it, per §5's "held for the lifetime of a run" guarantee.
    pub async fn run_exclusive<F, Fut, T>(&self, tenant_id: Uuid, task: TaskKind, source: Option<&'static str>, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.lock_for(tenant_id, task, source);
        let _guard = lock.lock().await;
        f().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn same_key_runs_are_serialized() {
        let beat = Beat::new();
        let counter = Arc::new(AtomicU32::new(0));
        let tenant = Uuid::new_v4();

        let (c1, c2) = (counter.clone(), counter.clone());
        let (b1, b2) = (beat.clone(), beat.clone());

        let first = tokio::spawn(async move {
            b1.run_exclusive(tenant, TaskKind::AlertPipeline, None, || async move {
                let before = c1.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                before
            })
            .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = tokio::spawn(async move {
            b2.run_exclusive(tenant, TaskKind::AlertPipeline, None, || async move { c2.fetch_add(1, Ordering::SeqCst) }).await
        });

        let (r1, r2) = tokio::join!(first, second);
        assert_eq!(r1.unwrap(), 0);
        assert_eq!(r2.unwrap(), 1);
    }

    #[tokio::test]
    async fn different_sources_run_concurrently() {
        let beat = Beat::new();
        let tenant = Uuid::new_v4();
        let a = beat.run_exclusive(tenant, TaskKind::IngestionSync, Some("edi"), || async { 1 });
        let b = beat.run_exclusive(tenant, TaskKind::IngestionSync, Some("sftp"), || async { 2 });
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!((ra, rb), (1, 2));
    }
}
