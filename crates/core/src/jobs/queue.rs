use super::traits::{JobQueue, QueueStats};
use super::types::{JobId, JobPriority, JobState, JobStatus, QueuedJob};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Counters {
    total_jobs: AtomicU64,
    queued_jobs: AtomicU64,
    processing_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    failed_jobs: AtomicU64,
    retrying_jobs: AtomicU64,
    cancelled_jobs: AtomicU64,
}

/// In-process job queue for the single-binary scheduler.
///
/// The scheduler runs as one process per deployment (see `shelfops-scheduler`),
/// so jobs never need to cross a process boundary; a `DashMap` of job records
/// plus per-priority `VecDeque`s behind a `Mutex` gives the same ordering and
/// retry/backoff semantics the queue trait expects without an external broker.
pub struct InMemoryJobQueue {
    jobs: DashMap<JobId, QueuedJob>,
    priority_queues: Mutex<[VecDeque<JobId>; 4]>,
    processing: DashMap<JobId, ()>,
    counters: Counters,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            priority_queues: Mutex::new([
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ]),
            processing: DashMap::new(),
            counters: Counters::default(),
        }
    }

    fn queue_index(priority: JobPriority) -> usize {
        match priority {
            JobPriority::Critical => 0,
            JobPriority::High => 1,
            JobPriority::Normal => 2,
            JobPriority::Low => 3,
        }
    }

    async fn move_ready_delayed_jobs(&self) {
        let now = Utc::now();
        let ready: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                matches!(job.status.state, JobState::Queued | JobState::Retrying)
                    && job
                        .status
                        .scheduled_for
                        .map(|scheduled| scheduled <= now)
                        .unwrap_or(true)
            })
            .map(|entry| entry.key().clone())
            .collect();

        if ready.is_empty() {
            return;
        }

        let mut queues = self.priority_queues.lock().await;
        for job_id in ready {
            if let Some(mut job) = self.jobs.get_mut(&job_id) {
                if queues[Self::queue_index(job.priority)].contains(&job_id) {
                    continue;
                }
                job.status.state = JobState::Queued;
                job.status.scheduled_for = None;
                queues[Self::queue_index(job.priority)].push_back(job_id);
            }
        }
    }

    fn requeue_for_retry(&self, job: &mut QueuedJob) {
        if job.status.can_retry() {
            job.status.state = JobState::Retrying;
            let delay_seconds = 2_u64.pow(job.status.attempts).min(300);
            job.status.scheduled_for = Some(Utc::now() + Duration::seconds(delay_seconds as i64));
            self.counters.retrying_jobs.fetch_add(1, Ordering::Relaxed);
        } else {
            job.status.state = JobState::Failed;
            job.status.completed_at = Some(Utc::now());
            self.counters.failed_jobs.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.processing_jobs.fetch_sub(1, Ordering::Relaxed);
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: QueuedJob) -> Result<JobId> {
        let job_id = job.id.clone();
        self.counters.total_jobs.fetch_add(1, Ordering::Relaxed);
        self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);

        if job.status.scheduled_for.is_some() {
            debug!("Enqueued delayed job {}", job_id);
        } else {
            let mut queues = self.priority_queues.lock().await;
            queues[Self::queue_index(job.priority)].push_back(job_id.clone());
            debug!("Enqueued immediate job {} with priority {:?}", job_id, job.priority);
        }

        self.jobs.insert(job_id.clone(), job);
        info!("Enqueued job {}", job_id);
        Ok(job_id)
    }

    async fn dequeue(&self, worker_id: &str) -> Result<Option<QueuedJob>> {
        self.move_ready_delayed_jobs().await;

        let mut queues = self.priority_queues.lock().await;
        for queue in queues.iter_mut() {
            while let Some(job_id) = queue.pop_front() {
                let Some(mut job) = self.jobs.get_mut(&job_id) else {
                    continue;
                };
                if !job.is_ready_to_run() {
                    continue;
                }

                self.processing.insert(job_id.clone(), ());
                job.mark_processing();
                self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                self.counters.processing_jobs.fetch_add(1, Ordering::Relaxed);

                debug!("Dequeued job {} for worker {}", job_id, worker_id);
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    async fn get_status(&self, job_id: &JobId) -> Result<Option<JobStatus>> {
        Ok(self.jobs.get(job_id).map(|job| job.status.clone()))
    }

    async fn update_status(&self, job_id: &JobId, status: JobStatus) -> Result<()> {
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            let old_state = job.status.state;
            job.status = status;

            match (old_state, job.status.state) {
                (JobState::Processing, JobState::Completed) => {
                    self.processing.remove(job_id);
                    self.counters.processing_jobs.fetch_sub(1, Ordering::Relaxed);
                    self.counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
                }
                (JobState::Processing, JobState::Failed) => {
                    self.processing.remove(job_id);
                    self.counters.processing_jobs.fetch_sub(1, Ordering::Relaxed);
                    self.counters.failed_jobs.fetch_add(1, Ordering::Relaxed);
                }
                (JobState::Processing, JobState::Retrying) => {
                    self.processing.remove(job_id);
                    self.counters.processing_jobs.fetch_sub(1, Ordering::Relaxed);
                    self.counters.retrying_jobs.fetch_add(1, Ordering::Relaxed);
                }
                _ => {}
            }

            debug!("Updated status for job {}: {:?}", job_id, job.status.state);
        }

        Ok(())
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<bool> {
        let Some(mut job) = self.jobs.get_mut(job_id) else {
            return Ok(false);
        };
        if job.status.is_terminal() {
            return Ok(false);
        }

        job.mark_cancelled();
        self.processing.remove(job_id);

        let mut queues = self.priority_queues.lock().await;
        for queue in queues.iter_mut() {
            queue.retain(|id| id != job_id);
        }
        drop(queues);

        self.counters.cancelled_jobs.fetch_add(1, Ordering::Relaxed);
        info!("Cancelled job {}", job_id);
        Ok(true)
    }

    async fn get_stats(&self) -> Result<QueueStats> {
        let total_jobs = self.counters.total_jobs.load(Ordering::Relaxed);
        let queued_jobs = self.counters.queued_jobs.load(Ordering::Relaxed);
        let processing_jobs = self.counters.processing_jobs.load(Ordering::Relaxed);
        let completed_jobs = self.counters.completed_jobs.load(Ordering::Relaxed);
        let failed_jobs = self.counters.failed_jobs.load(Ordering::Relaxed);
        let retrying_jobs = self.counters.retrying_jobs.load(Ordering::Relaxed);
        let cancelled_jobs = self.counters.cancelled_jobs.load(Ordering::Relaxed);

        let error_rate = if total_jobs > 0 {
            Some(failed_jobs as f64 / total_jobs as f64)
        } else {
            None
        };

        Ok(QueueStats {
            total_jobs,
            queued_jobs,
            processing_jobs,
            completed_jobs,
            failed_jobs,
            retrying_jobs,
            cancelled_jobs,
            average_processing_time: None,
            jobs_per_minute: None,
            error_rate,
        })
    }

    async fn cleanup_old_jobs(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let stale: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.status.is_terminal()
                    && job
                        .status
                        .completed_at
                        .map(|completed| completed < older_than)
                        .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for job_id in &stale {
            self.jobs.remove(job_id);
        }

        info!("Cleaned up {} old jobs", stale.len());
        Ok(stale.len() as u64)
    }

    async fn get_jobs_by_status(&self, status: JobState, limit: Option<u32>) -> Result<Vec<QueuedJob>> {
        let limit = limit.unwrap_or(u32::MAX) as usize;
        Ok(self
            .jobs
            .iter()
            .filter(|entry| entry.value().status.state == status)
            .take(limit)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn health_check(&self) -> Result<bool> {
        let stale_cutoff = Utc::now() - Duration::seconds(3600);
        let stale: Vec<JobId> = self
            .processing
            .iter()
            .filter_map(|entry| {
                let job_id = entry.key().clone();
                let job = self.jobs.get(&job_id)?;
                let started = job.status.started_at?;
                (started < stale_cutoff).then_some(job_id)
            })
            .collect();

        for job_id in stale {
            if let Some(mut job) = self.jobs.get_mut(&job_id) {
                warn!("Cleaning up stale processing job: {}", job_id);
                self.requeue_for_retry(&mut job);
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::traits::SerializableJob;

    struct PingJob;
    impl SerializableJob for PingJob {
        fn job_type(&self) -> &'static str {
            "ping"
        }
        fn serialize(&self) -> std::result::Result<serde_json::Value, serde_json::Error> {
            Ok(serde_json::json!({}))
        }
        fn deserialize(
            _data: &serde_json::Value,
        ) -> std::result::Result<Box<dyn SerializableJob>, serde_json::Error> {
            Ok(Box::new(PingJob))
        }
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_round_trips() {
        let queue = InMemoryJobQueue::new();
        let queued = QueuedJob::new(&PingJob).unwrap();
        let job_id = queue.enqueue(queued).await.unwrap();

        let dequeued = queue.dequeue("worker-1").await.unwrap().unwrap();
        assert_eq!(dequeued.id, job_id);
        assert_eq!(dequeued.status.state, JobState::Processing);
    }

    #[tokio::test]
    async fn higher_priority_dequeues_first() {
        let queue = InMemoryJobQueue::new();
        let mut low = QueuedJob::new(&PingJob).unwrap();
        low.priority = JobPriority::Low;
        low.status.priority = JobPriority::Low;
        let mut critical = QueuedJob::new(&PingJob).unwrap();
        critical.priority = JobPriority::Critical;
        critical.status.priority = JobPriority::Critical;

        let low_id = queue.enqueue(low).await.unwrap();
        let critical_id = queue.enqueue(critical).await.unwrap();

        let first = queue.dequeue("worker-1").await.unwrap().unwrap();
        assert_eq!(first.id, critical_id);
        let second = queue.dequeue("worker-1").await.unwrap().unwrap();
        assert_eq!(second.id, low_id);
    }

    #[tokio::test]
    async fn cancel_removes_from_queue() {
        let queue = InMemoryJobQueue::new();
        let queued = QueuedJob::new(&PingJob).unwrap();
        let job_id = queue.enqueue(queued).await.unwrap();

        assert!(queue.cancel_job(&job_id).await.unwrap());
        assert!(queue.dequeue("worker-1").await.unwrap().is_none());
    }
}
