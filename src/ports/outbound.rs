//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{Case, DomainError, ManHourRecord, MessageId, NewRecord, RawMessage, RecordId};

/// Chat channel the reports are posted to.
#[async_trait::async_trait]
pub trait ChatSource: Send + Sync {
    /// Fetch messages newer than `since` (all history when `None`).
    ///
    /// Order of the returned messages is unspecified. An empty channel is `Ok(vec![])`;
    /// an unreachable platform is `DomainError::Chat`.
    async fn fetch_since(&self, since: Option<&MessageId>) -> Result<Vec<RawMessage>, DomainError>;
}

/// Author id → human-readable name.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Best-effort display name. Never fails: on lookup errors returns `author_id` itself.
    async fn display_name(&self, author_id: &str) -> String;
}

/// Read side of the case registry.
#[async_trait::async_trait]
pub trait CaseRegistry: Send + Sync {
    /// Active case with this unique key, if any. Inactive cases are not returned.
    async fn find_active(&self, case_key: &str) -> Result<Option<Case>, DomainError>;
}

/// Write side of the case registry, used by the operator commands.
#[async_trait::async_trait]
pub trait CaseAdmin: Send + Sync {
    /// Register a new active case under a freshly generated unique key.
    async fn register_case(&self, name: &str) -> Result<Case, DomainError>;

    /// Flip a case's active flag. Returns false when no case has this key.
    async fn set_case_active(&self, unique_key: &str, active: bool) -> Result<bool, DomainError>;

    /// All cases, active or not, ordered by id.
    async fn list_cases(&self) -> Result<Vec<Case>, DomainError>;
}

/// Durable man-hour records.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn exists_by_source_key(&self, source_key: &str) -> Result<bool, DomainError>;

    /// Persist a new record. A second record with the same source key is rejected
    /// with `DomainError::DuplicateSourceKey`.
    async fn create(&self, record: NewRecord) -> Result<RecordId, DomainError>;

    /// Records whose work date falls in `year`-`month`, ordered by (work_date, assignee).
    async fn query_by_period(&self, year: i32, month: u32)
    -> Result<Vec<ManHourRecord>, DomainError>;
}

/// Import watermark: id of the newest fully processed message.
#[async_trait::async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn read(&self) -> Result<Option<MessageId>, DomainError>;

    /// Replace the watermark in a single atomic write.
    async fn write(&self, message_id: &MessageId) -> Result<(), DomainError>;
}

/// Where finished exports are sent (the chat channel).
#[async_trait::async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, filename: &str, content: &[u8], comment: &str)
    -> Result<(), DomainError>;
}
