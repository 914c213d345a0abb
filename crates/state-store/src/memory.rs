use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Result, SagaId, StateRepository, StateStoreError, TransitionKind, TransitionRecord};

/// In-memory state repository for testing.
///
/// Records are kept in insertion order. Clones share the same storage, so a
/// test can hand one clone to the controller and inspect another.
#[derive(Clone, Default)]
pub struct InMemoryStateRepository {
    records: Arc<RwLock<Vec<TransitionRecord>>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryStateRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Returns all records in insertion order.
    pub async fn records(&self) -> Vec<TransitionRecord> {
        self.records.read().await.clone()
    }

    /// Returns the records of one saga instance in insertion order.
    pub async fn records_for(&self, saga_id: &SagaId) -> Vec<TransitionRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| &r.saga_id == saga_id)
            .cloned()
            .collect()
    }

    /// Returns `(step_name, transition)` pairs for one saga instance.
    pub async fn transitions_for(
        &self,
        saga_id: &SagaId,
    ) -> Vec<(Option<String>, TransitionKind)> {
        self.records_for(saga_id)
            .await
            .into_iter()
            .map(|r| (r.step_name, r.transition))
            .collect()
    }

    /// Returns the total number of records stored.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn record(&self, record: TransitionRecord) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(StateStoreError::Unavailable(
                "in-memory repository configured to fail".to_string(),
            ));
        }
        self.records.write().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateRepositoryExt;

    #[tokio::test]
    async fn test_records_keep_insertion_order() {
        let repo = InMemoryStateRepository::new();
        let saga_id = SagaId::from("s-1");

        repo.action_started(&saga_id, "step1").await.unwrap();
        repo.action_succeeded(&saga_id, "step1").await.unwrap();
        repo.saga_completed(&saga_id).await.unwrap();

        assert_eq!(
            repo.transitions_for(&saga_id).await,
            vec![
                (Some("step1".to_string()), TransitionKind::ActionStarted),
                (Some("step1".to_string()), TransitionKind::ActionSucceeded),
                (None, TransitionKind::SagaCompleted),
            ]
        );
    }

    #[tokio::test]
    async fn test_records_for_filters_by_saga() {
        let repo = InMemoryStateRepository::new();
        let a = SagaId::from("a");
        let b = SagaId::from("b");

        repo.action_started(&a, "step1").await.unwrap();
        repo.action_started(&b, "step1").await.unwrap();
        repo.action_failed(&b, "step1", "Declined", "card declined")
            .await
            .unwrap();

        assert_eq!(repo.records_for(&a).await.len(), 1);
        let b_records = repo.records_for(&b).await;
        assert_eq!(b_records.len(), 2);
        assert_eq!(b_records[1].error_kind.as_deref(), Some("Declined"));
        assert_eq!(b_records[1].error_message.as_deref(), Some("card declined"));
        assert_eq!(repo.len().await, 3);
    }

    #[tokio::test]
    async fn test_fail_on_write() {
        let repo = InMemoryStateRepository::new();
        repo.set_fail_on_write(true);

        let result = repo.saga_completed(&SagaId::from("s")).await;
        assert!(matches!(result, Err(StateStoreError::Unavailable(_))));
        assert!(repo.is_empty().await);

        repo.set_fail_on_write(false);
        repo.saga_completed(&SagaId::from("s")).await.unwrap();
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let repo = InMemoryStateRepository::new();
        let clone = repo.clone();
        clone
            .saga_failed(&SagaId::from("s"), "step1", Some("E"), Some("boom"))
            .await
            .unwrap();

        let records = repo.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transition, TransitionKind::SagaFailed);

        repo.clear().await;
        assert!(clone.is_empty().await);
    }
}
