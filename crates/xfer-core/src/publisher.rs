//! Fan-out of job events to whoever is watching (control-socket `watch` clients).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job_db::{JobId, JobStatus};

/// Default channel capacity; a subscriber that falls further behind skips old events.
pub const DEFAULT_CAPACITY: usize = 1024;

/// One observer-facing event: `{"jobId":1,"status":"RUNNING","data":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Progress or error record as written by the copy tool; absent on terminal events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JobEvent {
    pub fn running(job_id: JobId, data: serde_json::Value) -> Self {
        Self {
            job_id,
            status: JobStatus::Running,
            data: Some(data),
        }
    }

    pub fn terminal(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            data: None,
        }
    }
}

/// Broadcast channel of [`JobEvent`]s. Clone shares the channel.
#[derive(Clone)]
pub struct ProgressPublisher {
    tx: broadcast::Sender<JobEvent>,
}

impl ProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send to all current subscribers. Never blocks; with no subscribers the
    /// event is dropped.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }

    /// Receive events published from now on. No replay of earlier events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    #[test]
    fn event_json_shape() {
        let ev = JobEvent::running(7, serde_json::json!({"stats": {"bytes": 1}}));
        assert_eq!(
            serde_json::to_string(&ev).unwrap(),
            r#"{"jobId":7,"status":"RUNNING","data":{"stats":{"bytes":1}}}"#
        );
        let done = JobEvent::terminal(7, JobStatus::Completed);
        assert_eq!(
            serde_json::to_string(&done).unwrap(),
            r#"{"jobId":7,"status":"COMPLETED"}"#
        );
        // Watch clients read the lines back; a missing `data` is a terminal event.
        let parsed: JobEvent = serde_json::from_str(r#"{"jobId":7,"status":"COMPLETED"}"#).unwrap();
        assert_eq!(parsed, done);
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let p = ProgressPublisher::new(4);
        p.publish(JobEvent::terminal(1, JobStatus::Failed));
        let mut rx = p.subscribe();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn every_subscriber_sees_events_in_order() {
        let p = ProgressPublisher::default();
        let mut a = p.subscribe();
        let mut b = p.subscribe();
        assert_eq!(p.subscriber_count(), 2);

        p.publish(JobEvent::running(1, serde_json::json!({"n": 1})));
        p.publish(JobEvent::terminal(1, JobStatus::Completed));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().status, JobStatus::Running);
            assert_eq!(rx.recv().await.unwrap().status, JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_old_events_only() {
        let p = ProgressPublisher::new(2);
        let mut slow = p.subscribe();
        for i in 0..5 {
            p.publish(JobEvent::running(i, serde_json::Value::Null));
        }
        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(slow.recv().await.unwrap().job_id, 3);
        assert_eq!(slow.recv().await.unwrap().job_id, 4);

        let mut fresh = p.subscribe();
        p.publish(JobEvent::terminal(9, JobStatus::Canceled));
        assert_eq!(fresh.recv().await.unwrap().job_id, 9);
    }
}
