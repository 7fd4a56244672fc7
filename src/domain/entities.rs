//! Domain entities. Pure data structures for the core business.
//!
//! No Slack/IO types here; adapters map into these.

use crate::domain::Hours;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Chat message id. Slack timestamps (`"1712345678.000200"`) double as the
/// ordering key and as the seed of every source key derived from the message.
///
/// Ordering is numeric for timestamp-shaped ids (seconds, then fractional
/// digits), so `"999.9"` sorts before `"1000.1"`. Ids that are not timestamps
/// sort after all timestamps, by string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whole seconds since the Unix epoch, if the id is a timestamp.
    pub fn epoch_seconds(&self) -> Option<i64> {
        self.numeric()
            .and_then(|(secs, _)| i64::try_from(secs).ok())
    }

    fn numeric(&self) -> Option<(u64, &str)> {
        let (int_part, frac_part) = self.0.split_once('.').unwrap_or((&self.0, ""));
        let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty() || !digits(int_part) || !digits(frac_part) {
            return None;
        }
        let secs = int_part.parse::<u64>().ok()?;
        Some((secs, frac_part))
    }
}

/// Compare two digit strings as decimal fractions ("5" == "50" < "51").
fn cmp_fraction(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(b'0');
            let y = b.get(i).copied().unwrap_or(b'0');
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some((sa, fa)), Some((sb, fb))) => sa
                .cmp(&sb)
                .then_with(|| cmp_fraction(fa, fb))
                .then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One inbound chat message, exactly as the chat platform delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: MessageId,
    pub author_id: Option<String>,
    pub body: String,
    pub thread_id: Option<String>,
}

/// A parsed report line that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManHourEntry {
    /// Trimmed and upper-cased.
    pub case_key: String,
    pub hours: Hours,
    pub work_date: NaiveDate,
    /// `None` means "use the message author".
    pub assignee: Option<String>,
}

/// Idempotency key of a persisted record: `"{message_id}_{line_index}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceKey(String);

impl SourceKey {
    pub fn new(message_id: &MessageId, entry_index: usize) -> Self {
        Self(format!("{}_{}", message_id, entry_index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SourceKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered case (project). Owned by the case registry; read-only to the import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: i64,
    pub unique_key: String,
    pub name: String,
    pub is_active: bool,
}

pub type RecordId = i64;

/// Record ready to be written. Everything resolved, nothing generated by the store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub case_id: Option<i64>,
    pub case_key: String,
    /// Case name when the key resolved to an active case, else the case key.
    pub project_name: String,
    pub assignee: String,
    pub work_date: NaiveDate,
    pub hours: Hours,
    pub source_key: SourceKey,
}

/// Persisted man-hour fact. Created once per source key, never updated by the import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManHourRecord {
    pub id: RecordId,
    pub case_id: Option<i64>,
    pub case_key: String,
    pub project_name: String,
    pub assignee: String,
    pub work_date: NaiveDate,
    pub hours: Hours,
    pub source_key: SourceKey,
    pub created_at: DateTime<Utc>,
}

impl ManHourRecord {
    pub fn from_new(id: RecordId, record: NewRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            case_id: record.case_id,
            case_key: record.case_key,
            project_name: record.project_name,
            assignee: record.assignee,
            work_date: record.work_date,
            hours: record.hours,
            source_key: record.source_key,
            created_at,
        }
    }
}

/// One spreadsheet row of the monthly export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub work_date: NaiveDate,
    pub project: String,
    pub assignee: String,
    pub hours: Hours,
}

impl From<&ManHourRecord> for ExportRow {
    fn from(r: &ManHourRecord) -> Self {
        Self {
            work_date: r.work_date,
            project: r.project_name.clone(),
            assignee: r.assignee.clone(),
            hours: r.hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MessageId {
        MessageId::new(s)
    }

    #[test]
    fn test_message_id_orders_numerically() {
        assert!(id("1712345678.000200") < id("1712345678.000300"));
        assert!(id("999.9") < id("1000.1"));
        assert!(id("100.9") > id("100.10"));
        assert!(id("100.5") < id("100.50"));
        assert!(id("100") < id("100.000001"));
    }

    #[test]
    fn test_message_id_non_numeric_sorts_last() {
        assert!(id("1712345678.1") < id("abc"));
        assert!(id("abc") < id("abd"));
    }

    #[test]
    fn test_message_id_max_picks_newest_regardless_of_position() {
        let ids = vec![id("20.5"), id("100.1"), id("9.99")];
        assert_eq!(ids.iter().max(), Some(&id("100.1")));
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(id("1709251200.123456").epoch_seconds(), Some(1709251200));
        assert_eq!(id("1709251200").epoch_seconds(), Some(1709251200));
        assert_eq!(id("not-a-ts").epoch_seconds(), None);
        assert_eq!(id(".5").epoch_seconds(), None);
        assert_eq!(id("+5.0").epoch_seconds(), None);
    }

    #[test]
    fn test_source_key_format() {
        let key = SourceKey::new(&id("1712345678.000200"), 1);
        assert_eq!(key.as_str(), "1712345678.000200_1");
    }
}
