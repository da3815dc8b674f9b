use tokio::sync::mpsc;

use crate::config::QueueFullPolicy;
use crate::models::job::MergeRequestJob;

/// Producer side of the bounded in-memory job queue.
///
/// Cloned into every webhook handler. Workers stop once every clone is
/// dropped and the remaining jobs are drained.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<MergeRequestJob>,
    capacity: usize,
    policy: QueueFullPolicy,
}

impl JobQueue {
    pub(crate) fn new(
        sender: mpsc::Sender<MergeRequestJob>,
        capacity: usize,
        policy: QueueFullPolicy,
    ) -> Self {
        Self {
            sender,
            capacity,
            policy,
        }
    }

    /// Enqueue a job. With [`QueueFullPolicy::Block`] this waits for a free
    /// slot; with [`QueueFullPolicy::Shed`] a full queue is an error.
    pub async fn enqueue(&self, job: MergeRequestJob) -> Result<(), QueueError> {
        match self.policy {
            QueueFullPolicy::Block => self
                .sender
                .send(job)
                .await
                .map_err(|_| QueueError::Closed),
            QueueFullPolicy::Shed => self.sender.try_send(job).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            }),
        }
    }

    /// Jobs currently waiting for a worker.
    pub fn depth(&self) -> usize {
        self.capacity.saturating_sub(self.sender.capacity())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once the worker pool has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("job queue is full")]
    Full,

    #[error("job queue is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn job(iid: u64) -> MergeRequestJob {
        MergeRequestJob {
            id: Uuid::new_v4(),
            project_id: 1,
            merge_request_iid: iid,
            title: "title".to_string(),
            url: "https://gitlab.local/mr".to_string(),
            project_name: "repo".to_string(),
            project_url: "https://gitlab.local/repo".to_string(),
            path_with_namespace: "group/repo".to_string(),
            group: "group".to_string(),
            work_in_progress: false,
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_depth() {
        let (tx, mut rx) = mpsc::channel(4);
        let queue = JobQueue::new(tx, 4, QueueFullPolicy::Block);

        assert_ok!(queue.enqueue(job(1)).await);
        assert_ok!(queue.enqueue(job(2)).await);
        assert_eq!(queue.depth(), 2);

        assert_eq!(rx.recv().await.unwrap().merge_request_iid, 1);
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn test_shed_policy_rejects_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = JobQueue::new(tx, 1, QueueFullPolicy::Shed);

        assert_ok!(queue.enqueue(job(1)).await);
        assert_eq!(assert_err!(queue.enqueue(job(2)).await), QueueError::Full);
    }

    #[tokio::test]
    async fn test_block_policy_waits_for_capacity() {
        let (tx, mut rx) = mpsc::channel(1);
        let queue = JobQueue::new(tx, 1, QueueFullPolicy::Block);
        queue.enqueue(job(1)).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(job(2)).await })
        };
        tokio::task::yield_now().await;
        assert!(!producer.is_finished());

        assert_eq!(rx.recv().await.unwrap().merge_request_iid, 1);
        assert_ok!(producer.await.unwrap());
        assert_eq!(rx.recv().await.unwrap().merge_request_iid, 2);
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        let queue = JobQueue::new(tx, 1, QueueFullPolicy::Block);
        drop(rx);

        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(job(1)).await, Err(QueueError::Closed));
    }
}
