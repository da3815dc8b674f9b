//! Fixed-size worker pool fed from the bounded job queue.
//!
//! `Dispatcher::start` spawns the workers plus a single message pump that
//! consumes completion and status events. The pump owns the live-working
//! counter, so nothing else touches it.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::QueueFullPolicy;
use crate::models::job::{CompletionEvent, MergeRequestJob, WorkerStatus};
use crate::services::assignment::ReviewerAssigner;
use crate::services::observer::Observer;
use crate::services::queue::JobQueue;
use crate::services::worker::Worker;

const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub policy: QueueFullPolicy,
}

/// Totals reported by the pump once every worker has exited.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: u64,
    pub failed: u64,
}

pub struct Dispatcher;

impl Dispatcher {
    /// Spawn the pool. Drop every clone of the returned queue to shut it down,
    /// then await [`DispatcherHandle::join`].
    pub fn start(
        config: DispatcherConfig,
        assigner: Arc<ReviewerAssigner>,
        observer: Arc<dyn Observer>,
    ) -> (JobQueue, DispatcherHandle) {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);

        let (job_tx, job_rx) = mpsc::channel(capacity);
        let jobs = Arc::new(Mutex::new(job_rx));
        let (completion_tx, completion_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        for id in 0..workers {
            let worker = Worker::new(
                id,
                jobs.clone(),
                completion_tx.clone(),
                status_tx.clone(),
                assigner.clone(),
            );
            tokio::spawn(worker.run());
        }
        observer.workers_started(workers);
        tracing::info!(workers, queue_capacity = capacity, policy = ?config.policy, "worker pool started");

        let pump = MessagePump {
            completions: completion_rx,
            status: status_rx,
            jobs: job_tx.downgrade(),
            capacity,
            working: 0,
            summary: DispatchSummary::default(),
            observer,
        };
        let handle = DispatcherHandle {
            pump: tokio::spawn(pump.run()),
        };

        (JobQueue::new(job_tx, capacity, config.policy), handle)
    }
}

pub struct DispatcherHandle {
    pump: JoinHandle<DispatchSummary>,
}

impl DispatcherHandle {
    /// Wait for the workers to drain the queue and the pump to stop.
    pub async fn join(self) -> DispatchSummary {
        match self.pump.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "dispatcher pump failed");
                DispatchSummary::default()
            }
        }
    }
}

struct MessagePump {
    completions: mpsc::Receiver<CompletionEvent>,
    status: mpsc::Receiver<WorkerStatus>,
    jobs: mpsc::WeakSender<MergeRequestJob>,
    capacity: usize,
    working: usize,
    summary: DispatchSummary,
    observer: Arc<dyn Observer>,
}

impl MessagePump {
    async fn run(mut self) -> DispatchSummary {
        loop {
            tokio::select! {
                Some(event) = self.completions.recv() => self.handle_completion(event),
                Some(status) = self.status.recv() => self.adjust_status(status),
                else => break,
            }
        }

        tracing::info!(
            completed = self.summary.completed,
            failed = self.summary.failed,
            "all workers stopped"
        );
        self.summary
    }

    fn handle_completion(&mut self, event: CompletionEvent) {
        match event.result {
            Ok(status) => {
                self.summary.completed += 1;
                tracing::debug!(job_id = %event.job_id, group = %event.group, status = %status, "mr processed");
            }
            Err(error) => {
                self.summary.failed += 1;
                tracing::debug!(job_id = %event.job_id, group = %event.group, error = %error, "mr failed");
            }
        }
    }

    fn adjust_status(&mut self, status: WorkerStatus) {
        match status {
            WorkerStatus::Working => {
                self.working += 1;
                self.observer.worker_busy(true);
            }
            WorkerStatus::Waiting => {
                self.working = self.working.saturating_sub(1);
                self.observer.worker_busy(false);
            }
        }

        let depth = self
            .jobs
            .upgrade()
            .map(|tx| self.capacity.saturating_sub(tx.capacity()))
            .unwrap_or(0);
        self.observer.queue_depth(depth);
        tracing::debug!(working = self.working, queue_depth = depth, "worker status changed");
    }
}
