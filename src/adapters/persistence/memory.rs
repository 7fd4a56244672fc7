//! In-memory store. Implements RecordStore, CaseRegistry and WatermarkStore.
//!
//! Nothing survives the process; used for tests and quick experiments.

use crate::domain::{Case, DomainError, ManHourRecord, MessageId, NewRecord, RecordId};
use crate::ports::{CaseRegistry, RecordStore, WatermarkStore};
use chrono::{Datelike, Utc};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryData {
    records: Vec<ManHourRecord>,
    cases: Vec<Case>,
    watermark: Option<MessageId>,
}

/// In-memory store with the same uniqueness rules as the SQLite repository.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a case. Returns its id.
    pub async fn add_case(&self, unique_key: &str, name: &str, is_active: bool) -> i64 {
        let mut data = self.data.lock().await;
        let id = data.cases.len() as i64 + 1;
        data.cases.push(Case {
            id,
            unique_key: unique_key.to_string(),
            name: name.to_string(),
            is_active,
        });
        id
    }

    /// Snapshot of all records in insertion order.
    pub async fn records(&self) -> Vec<ManHourRecord> {
        self.data.lock().await.records.clone()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn exists_by_source_key(&self, source_key: &str) -> Result<bool, DomainError> {
        let data = self.data.lock().await;
        Ok(data
            .records
            .iter()
            .any(|r| r.source_key.as_str() == source_key))
    }

    async fn create(&self, record: NewRecord) -> Result<RecordId, DomainError> {
        let mut data = self.data.lock().await;
        if data
            .records
            .iter()
            .any(|r| r.source_key == record.source_key)
        {
            return Err(DomainError::DuplicateSourceKey(record.source_key.to_string()));
        }
        let id = data.records.len() as RecordId + 1;
        data.records
            .push(ManHourRecord::from_new(id, record, Utc::now()));
        Ok(id)
    }

    async fn query_by_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<ManHourRecord>, DomainError> {
        let data = self.data.lock().await;
        let mut out: Vec<ManHourRecord> = data
            .records
            .iter()
            .filter(|r| r.work_date.year() == year && r.work_date.month() == month)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.work_date
                .cmp(&b.work_date)
                .then_with(|| a.assignee.cmp(&b.assignee))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(out)
    }
}

#[async_trait::async_trait]
impl CaseRegistry for MemoryStore {
    async fn find_active(&self, case_key: &str) -> Result<Option<Case>, DomainError> {
        let data = self.data.lock().await;
        Ok(data
            .cases
            .iter()
            .find(|c| c.is_active && c.unique_key == case_key)
            .cloned())
    }
}

#[async_trait::async_trait]
impl WatermarkStore for MemoryStore {
    async fn read(&self) -> Result<Option<MessageId>, DomainError> {
        Ok(self.data.lock().await.watermark.clone())
    }

    async fn write(&self, message_id: &MessageId) -> Result<(), DomainError> {
        self.data.lock().await.watermark = Some(message_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Hours, SourceKey};
    use chrono::NaiveDate;

    fn new_record(key: &str, date: NaiveDate, assignee: &str) -> NewRecord {
        NewRecord {
            case_id: None,
            case_key: "ABCD1234".into(),
            project_name: "ABCD1234".into(),
            assignee: assignee.into(),
            work_date: date,
            hours: Hours::from_hundredths(100),
            source_key: SourceKey::from(key.to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_source_key_rejected() {
        let store = MemoryStore::new();
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        store.create(new_record("1.0_0", d, "a")).await.unwrap();
        let err = store.create(new_record("1.0_0", d, "b")).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateSourceKey(k) if k == "1.0_0"));
        assert!(store.exists_by_source_key("1.0_0").await.unwrap());
        assert!(!store.exists_by_source_key("1.0_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_inactive_case_not_found() {
        let store = MemoryStore::new();
        store.add_case("AAAA0001", "Alpha", false).await;
        store.add_case("BBBB0002", "Beta", true).await;
        assert!(store.find_active("AAAA0001").await.unwrap().is_none());
        assert_eq!(
            store.find_active("BBBB0002").await.unwrap().map(|c| c.name),
            Some("Beta".to_string())
        );
    }
}
