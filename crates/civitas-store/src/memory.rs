//! In-process record store

use crate::RecordStore;
use async_trait::async_trait;
use civitas_core::{ModerationRecord, Result};
use parking_lot::RwLock;

/// Keeps records in insertion order for the life of the process
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<ModerationRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, record: &ModerationRecord) -> Result<String> {
        self.records.write().push(record.clone());
        Ok(record.id().to_string())
    }

    async fn list_all(&self) -> Result<Vec<ModerationRecord>> {
        Ok(self.records.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civitas_core::SecondaryAssessment;

    #[tokio::test]
    async fn test_create_returns_record_id() {
        let store = MemoryRecordStore::new();
        let record = ModerationRecord::flagged("hi", "LABEL_1", 0.99);

        let id = store.create(&record).await.unwrap();
        assert_eq!(id, record.id());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_preserves_insertion_order() {
        let store = MemoryRecordStore::new();
        assert!(store.list_all().await.unwrap().is_empty());

        let a = ModerationRecord::flagged("a", "LABEL_1", 0.9);
        let b = ModerationRecord::escalated(
            "b",
            "LABEL_0",
            0.4,
            SecondaryAssessment::api_error(),
        );
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        let ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id().to_string())
            .collect();
        assert_eq!(ids, vec![a.id().to_string(), b.id().to_string()]);
    }
}
