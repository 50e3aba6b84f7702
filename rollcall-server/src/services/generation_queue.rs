//! Attendance generation queue
//!
//! Photo uploads enqueue a job and return immediately. A single worker task
//! drains the queue and runs generation; upstream failures are retried with
//! exponential backoff, anything else ends the job. Job state is kept in
//! memory so callers can poll it alongside the lecture status; finished jobs
//! are forgotten after [`JOB_RETENTION`], leaving the lecture status as the
//! record of the outcome.
//!
//! Delivery is at-least-once: the unique record per lecture turns a duplicate
//! run into a harmless `Conflict`.

use rollcall_common::events::{AttendanceEvent, EventBus};
use rollcall_common::time;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::lecture_pipeline::LecturePipeline;
use crate::config::AttendanceSettings;
use crate::error::AttendanceError;

/// How long a completed or failed job stays visible
pub const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Per-lecture job state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running { attempt: u32 },
    Retrying { attempt: u32, last_error: String },
    Completed,
    Failed { error: String },
}

impl JobState {
    /// Job is waiting or running; a new enqueue would be redundant
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobState::Queued | JobState::Running { .. } | JobState::Retrying { .. }
        )
    }
}

#[derive(Debug, Clone)]
struct TrackedJob {
    state: JobState,
    /// Set once the job reaches a terminal state
    finished_at: Option<Instant>,
}

impl TrackedJob {
    fn new(state: JobState) -> Self {
        let finished_at = (!state.is_active()).then(Instant::now);
        Self { state, finished_at }
    }
}

#[derive(Debug, Clone, Copy)]
struct GenerationJob {
    lecture_id: Uuid,
    attempt: u32,
}

/// Handle for enqueueing jobs and reading their state
#[derive(Clone)]
pub struct GenerationQueue {
    sender: mpsc::UnboundedSender<GenerationJob>,
    jobs: Arc<RwLock<HashMap<Uuid, TrackedJob>>>,
    retention: Duration,
}

/// Receiving end, consumed by [`GenerationWorker`]
pub struct GenerationReceiver(mpsc::UnboundedReceiver<GenerationJob>);

impl GenerationQueue {
    pub fn new() -> (Self, GenerationReceiver) {
        Self::with_retention(JOB_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> (Self, GenerationReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                jobs: Arc::new(RwLock::new(HashMap::new())),
                retention,
            },
            GenerationReceiver(receiver),
        )
    }

    /// Queue generation for a lecture
    ///
    /// Returns `false` when a job for the lecture is already pending or
    /// running, or when the worker has stopped.
    pub async fn enqueue(&self, lecture_id: Uuid) -> bool {
        let mut jobs = self.jobs.write().await;
        self.evict_finished(&mut jobs);
        if jobs.get(&lecture_id).is_some_and(|job| job.state.is_active()) {
            debug!(lecture_id = %lecture_id, "Generation already pending");
            return false;
        }

        if self.sender.send(GenerationJob { lecture_id, attempt: 1 }).is_err() {
            warn!(lecture_id = %lecture_id, "Generation worker stopped, job not queued");
            return false;
        }

        jobs.insert(lecture_id, TrackedJob::new(JobState::Queued));
        debug!(lecture_id = %lecture_id, "Generation queued");
        true
    }

    /// `None` once a finished job has aged out
    pub async fn job_state(&self, lecture_id: Uuid) -> Option<JobState> {
        self.jobs
            .read()
            .await
            .get(&lecture_id)
            .filter(|job| !self.expired(job))
            .map(|job| job.state.clone())
    }

    /// Copy of every tracked job
    pub async fn snapshot(&self) -> HashMap<Uuid, JobState> {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|(_, job)| !self.expired(job))
            .map(|(id, job)| (*id, job.state.clone()))
            .collect()
    }

    async fn set_state(&self, lecture_id: Uuid, state: JobState) {
        let mut jobs = self.jobs.write().await;
        self.evict_finished(&mut jobs);
        jobs.insert(lecture_id, TrackedJob::new(state));
    }

    fn expired(&self, job: &TrackedJob) -> bool {
        job.finished_at
            .is_some_and(|finished| finished.elapsed() >= self.retention)
    }

    fn evict_finished(&self, jobs: &mut HashMap<Uuid, TrackedJob>) {
        let before = jobs.len();
        jobs.retain(|_, job| !self.expired(job));
        if jobs.len() < before {
            debug!(evicted = before - jobs.len(), "Evicted finished generation jobs");
        }
    }
}

/// Drains the queue, one job at a time
pub struct GenerationWorker {
    receiver: GenerationReceiver,
    queue: GenerationQueue,
    pipeline: LecturePipeline,
    settings: Arc<AttendanceSettings>,
    event_bus: EventBus,
    cancel: CancellationToken,
}

impl GenerationWorker {
    pub fn new(
        receiver: GenerationReceiver,
        pipeline: LecturePipeline,
        settings: Arc<AttendanceSettings>,
        event_bus: EventBus,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            queue: pipeline.queue().clone(),
            pipeline,
            settings,
            event_bus,
            cancel,
        }
    }

    /// Spawn the worker loop on the tokio runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Attendance generation worker started");
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = self.receiver.0.recv() => match job {
                    Some(job) => self.process(job).await,
                    None => break,
                },
            }
        }
        info!("Attendance generation worker stopped");
    }

    async fn process(&self, job: GenerationJob) {
        let lecture_id = job.lecture_id;
        self.queue
            .set_state(lecture_id, JobState::Running { attempt: job.attempt })
            .await;

        // Run in its own task so a panic ends this job, not the worker
        let pipeline = self.pipeline.clone();
        let outcome = tokio::spawn(async move {
            pipeline.generate_attendance(lecture_id, time::now()).await
        })
        .await;

        match outcome {
            Ok(Ok(summary)) => {
                debug!(lecture_id = %lecture_id, record_id = %summary.record_id, "Generation job completed");
                self.queue.set_state(lecture_id, JobState::Completed).await;
            }
            Ok(Err(AttendanceError::Conflict(msg))) => {
                info!(lecture_id = %lecture_id, "Attendance already generated, nothing to do: {}", msg);
                self.queue.set_state(lecture_id, JobState::Completed).await;
            }
            Ok(Err(e)) if e.is_retryable() && job.attempt < self.settings.generation_max_attempts => {
                let delay = self.settings.generation_backoff(job.attempt);
                warn!(
                    lecture_id = %lecture_id,
                    attempt = job.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    "Attendance generation failed, will retry: {}",
                    e
                );
                self.queue
                    .set_state(
                        lecture_id,
                        JobState::Retrying {
                            attempt: job.attempt,
                            last_error: e.to_string(),
                        },
                    )
                    .await;
                self.schedule_retry(
                    GenerationJob {
                        lecture_id,
                        attempt: job.attempt + 1,
                    },
                    delay,
                );
            }
            Ok(Err(e)) => self.fail(job, e.to_string()).await,
            Err(join_err) => self.fail(job, format!("generation task panicked: {}", join_err)).await,
        }
    }

    fn schedule_retry(&self, job: GenerationJob, delay: Duration) {
        let sender = self.queue.sender.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if sender.send(job).is_err() {
                        warn!(lecture_id = %job.lecture_id, "Generation worker stopped, retry dropped");
                    }
                }
            }
        });
    }

    async fn fail(&self, job: GenerationJob, error: String) {
        error!(
            lecture_id = %job.lecture_id,
            attempts = job.attempt,
            "Attendance generation failed: {}",
            error
        );
        self.queue
            .set_state(job.lecture_id, JobState::Failed { error: error.clone() })
            .await;
        self.event_bus.emit_lossy(AttendanceEvent::GenerationFailed {
            lecture_id: job.lecture_id,
            attempts: job.attempt,
            error,
            timestamp: time::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_deduplicates_active_jobs() {
        let (queue, _receiver) = GenerationQueue::new();
        let lecture_id = Uuid::new_v4();

        assert!(queue.enqueue(lecture_id).await);
        assert!(!queue.enqueue(lecture_id).await);
        assert_eq!(queue.job_state(lecture_id).await, Some(JobState::Queued));
    }

    #[tokio::test]
    async fn test_finished_job_can_be_requeued() {
        let (queue, _receiver) = GenerationQueue::new();
        let lecture_id = Uuid::new_v4();

        queue
            .set_state(lecture_id, JobState::Failed { error: "boom".into() })
            .await;
        assert!(queue.enqueue(lecture_id).await);
    }

    #[tokio::test]
    async fn test_finished_jobs_are_evicted() {
        let (queue, _receiver) = GenerationQueue::with_retention(Duration::ZERO);
        let done = Uuid::new_v4();
        let active = Uuid::new_v4();

        queue.set_state(done, JobState::Completed).await;
        assert_eq!(queue.job_state(done).await, None);

        assert!(queue.enqueue(active).await);
        let jobs = queue.jobs.read().await;
        assert!(!jobs.contains_key(&done));
        assert_eq!(jobs.get(&active).map(|job| job.state.clone()), Some(JobState::Queued));
    }

    #[tokio::test]
    async fn test_finished_jobs_kept_within_retention() {
        let (queue, _receiver) = GenerationQueue::new();
        let lecture_id = Uuid::new_v4();

        queue.set_state(lecture_id, JobState::Completed).await;
        assert!(queue.enqueue(Uuid::new_v4()).await);
        assert_eq!(queue.job_state(lecture_id).await, Some(JobState::Completed));
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_gone() {
        let (queue, receiver) = GenerationQueue::new();
        drop(receiver);
        assert!(!queue.enqueue(Uuid::new_v4()).await);
    }

    #[test]
    fn test_job_state_serialization() {
        let json = serde_json::to_value(JobState::Retrying {
            attempt: 2,
            last_error: "timeout".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "retrying");
        assert_eq!(json["attempt"], 2);
    }
}
