use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::models::job::{CompletionEvent, MergeRequestJob, WorkerStatus};
use crate::services::assignment::{log_outcome, ReviewerAssigner};

/// Receiving end of the job queue, shared by every worker.
pub type SharedJobs = Arc<Mutex<mpsc::Receiver<MergeRequestJob>>>;

/// One member of the pool. Loops Waiting -> Working -> Waiting until the
/// job queue is closed and drained.
pub struct Worker {
    id: usize,
    jobs: SharedJobs,
    completions: mpsc::Sender<CompletionEvent>,
    status: mpsc::Sender<WorkerStatus>,
    assigner: Arc<ReviewerAssigner>,
}

impl Worker {
    pub fn new(
        id: usize,
        jobs: SharedJobs,
        completions: mpsc::Sender<CompletionEvent>,
        status: mpsc::Sender<WorkerStatus>,
        assigner: Arc<ReviewerAssigner>,
    ) -> Self {
        Self {
            id,
            jobs,
            completions,
            status,
            assigner,
        }
    }

    pub async fn run(self) {
        tracing::debug!(worker = self.id, "worker started");

        while let Some(job) = self.next_job().await {
            // The pump only stops once every worker is gone, so these sends
            // can fail only if the pump panicked.
            let _ = self.status.send(WorkerStatus::Working).await;

            tracing::info!(
                worker = self.id,
                job_id = %job.id,
                project_id = job.project_id,
                merge_request_iid = job.merge_request_iid,
                "processing merge request"
            );

            let result = self.assigner.process(&job).await;
            log_outcome(&job, &result);

            let event = CompletionEvent {
                job_id: job.id,
                group: job.group,
                result: result.map(|o| o.to_string()).map_err(|e| e.to_string()),
            };
            let _ = self.completions.send(event).await;
            let _ = self.status.send(WorkerStatus::Waiting).await;
        }

        tracing::debug!(worker = self.id, "job queue closed, worker exiting");
    }

    async fn next_job(&self) -> Option<MergeRequestJob> {
        self.jobs.lock().await.recv().await
    }
}
