//! Admission control for concurrent executions
//!
//! The semaphore here is the only state shared between executions. A permit
//! is held for the whole life of a worker, from spawn until it is reaped.

use crate::types::Rejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// What to do with a request when every slot is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// Refuse immediately
    #[default]
    Reject,
    /// Wait for a free slot, at most `max_wait`
    Queue {
        #[serde(with = "duration_ms")]
        max_wait: Duration,
    },
}

/// Slot held by one running execution; dropping it frees the slot
#[derive(Debug)]
pub struct ExecutionPermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone)]
pub struct Governor {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    policy: AdmissionPolicy,
}

impl Governor {
    pub fn new(max_concurrent: usize, policy: AdmissionPolicy) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            policy,
        }
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Executions currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.slots.available_permits())
    }

    /// Take a slot according to the admission policy
    pub async fn admit(&self) -> Result<ExecutionPermit, Rejection> {
        match self.policy {
            AdmissionPolicy::Reject => match self.slots.clone().try_acquire_owned() {
                Ok(permit) => Ok(ExecutionPermit { _permit: permit }),
                Err(TryAcquireError::NoPermits) => Err(Rejection::Busy),
                Err(TryAcquireError::Closed) => Err(Rejection::ShuttingDown),
            },
            AdmissionPolicy::Queue { max_wait } => {
                match tokio::time::timeout(max_wait, self.slots.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => Ok(ExecutionPermit { _permit: permit }),
                    Ok(Err(_closed)) => Err(Rejection::ShuttingDown),
                    Err(_elapsed) => Err(Rejection::Busy),
                }
            }
        }
    }

    /// Refuse all future admissions; queued waiters are rejected at once
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reject_policy_refuses_when_full() {
        let governor = Governor::new(2, AdmissionPolicy::Reject);
        let a = governor.admit().await.unwrap();
        let _b = governor.admit().await.unwrap();
        assert_eq!(governor.in_flight(), 2);
        assert_eq!(governor.admit().await.unwrap_err(), Rejection::Busy);

        drop(a);
        assert_eq!(governor.in_flight(), 1);
        assert!(governor.admit().await.is_ok());
    }

    #[tokio::test]
    async fn test_queue_policy_waits_for_a_slot() {
        let governor = Governor::new(
            1,
            AdmissionPolicy::Queue {
                max_wait: Duration::from_secs(2),
            },
        );
        let held = governor.admit().await.unwrap();

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(held);
        });

        assert!(governor.admit().await.is_ok());
        releaser.await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_policy_gives_up_after_max_wait() {
        let governor = Governor::new(
            1,
            AdmissionPolicy::Queue {
                max_wait: Duration::from_millis(50),
            },
        );
        let _held = governor.admit().await.unwrap();

        let started = std::time::Instant::now();
        assert_eq!(governor.admit().await.unwrap_err(), Rejection::Busy);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_closed_governor_reports_shutdown() {
        let governor = Governor::new(1, AdmissionPolicy::Reject);
        governor.close();
        assert!(governor.is_closed());
        assert_eq!(governor.admit().await.unwrap_err(), Rejection::ShuttingDown);

        let queued = Governor::new(
            1,
            AdmissionPolicy::Queue {
                max_wait: Duration::from_secs(5),
            },
        );
        queued.close();
        assert_eq!(queued.admit().await.unwrap_err(), Rejection::ShuttingDown);
    }

    #[test]
    fn test_zero_slots_is_clamped_to_one() {
        let governor = Governor::new(0, AdmissionPolicy::Reject);
        assert_eq!(governor.max_concurrent(), 1);
    }

    #[test]
    fn test_policy_serde() {
        let policy: AdmissionPolicy =
            serde_json::from_str(r#"{"mode": "queue", "max_wait": 250}"#).unwrap();
        assert_eq!(
            policy,
            AdmissionPolicy::Queue {
                max_wait: Duration::from_millis(250)
            }
        );
    }
}
