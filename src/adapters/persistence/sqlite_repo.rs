//! SQLite-backed repository via libsql. Implements RecordStore, CaseRegistry and CaseAdmin.
//!
//! One database file: data/manhour.db
//! `man_hour_records.source_key` is UNIQUE; inserts use ON CONFLICT DO NOTHING and an
//! empty RETURNING set is reported as a duplicate. Hours are stored as hundredths.

use crate::domain::{
    Case, DomainError, Hours, ManHourRecord, NewRecord, RecordId, SourceKey,
};
use crate::ports::{CaseAdmin, CaseRegistry, RecordStore};
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{params, Database, Row};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CASES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unique_key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
)"#;

const RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS man_hour_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    case_id INTEGER REFERENCES cases (id),
    case_key TEXT NOT NULL,
    project_name TEXT NOT NULL,
    assignee TEXT NOT NULL,
    work_date TEXT NOT NULL,
    hours_hundredths INTEGER NOT NULL,
    source_key TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
)"#;
const RECORDS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_work_date ON man_hour_records (work_date, assignee)";

const CASE_KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CASE_KEY_LEN: usize = 8;
const CASE_KEY_ATTEMPTS: usize = 16;

/// SQLite repository. One database file (manhour.db) in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    ///
    /// Sets WAL mode and synchronous=NORMAL so the scheduler and the CLI can share the file.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| DomainError::Repo(e.to_string()))?;
        let db_path = base.join("manhour.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let conn = db.connect().map_err(|e| DomainError::Repo(e.to_string()))?;

        // PRAGMA returns a row (new value); use query and consume rows (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows
                .next()
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?
                .is_some()
            {}
        }

        for ddl in [CASES_TABLE, RECORDS_TABLE, RECORDS_INDEX] {
            conn.execute(ddl, ())
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connection(&self) -> Result<libsql::Connection, DomainError> {
        self.db
            .connect()
            .map_err(|e| DomainError::Repo(e.to_string()))
    }
}

/// Random `[A-Z0-9]{8}` key. Uniqueness is enforced by the table.
fn generate_case_key() -> String {
    let mut rng = rand::thread_rng();
    (0..CASE_KEY_LEN)
        .map(|_| CASE_KEY_CHARSET[rng.gen_range(0..CASE_KEY_CHARSET.len())] as char)
        .collect()
}

fn case_from_row(row: &Row) -> Result<Case, DomainError> {
    let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
    let unique_key: String = row.get(1).map_err(|e| DomainError::Repo(e.to_string()))?;
    let name: String = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
    let is_active: i64 = row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?;
    Ok(Case {
        id,
        unique_key,
        name,
        is_active: is_active != 0,
    })
}

fn record_from_row(row: &Row) -> Result<ManHourRecord, DomainError> {
    let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
    let case_id: Option<i64> = row.get(1).ok();
    let case_key: String = row.get(2).map_err(|e| DomainError::Repo(e.to_string()))?;
    let project_name: String = row.get(3).map_err(|e| DomainError::Repo(e.to_string()))?;
    let assignee: String = row.get(4).map_err(|e| DomainError::Repo(e.to_string()))?;
    let work_date: String = row.get(5).map_err(|e| DomainError::Repo(e.to_string()))?;
    let hours: i64 = row.get(6).map_err(|e| DomainError::Repo(e.to_string()))?;
    let source_key: String = row.get(7).map_err(|e| DomainError::Repo(e.to_string()))?;
    let created_at: i64 = row.get(8).map_err(|e| DomainError::Repo(e.to_string()))?;
    let work_date = work_date
        .parse::<NaiveDate>()
        .map_err(|e| DomainError::Repo(format!("bad work_date {:?}: {}", work_date, e)))?;
    Ok(ManHourRecord {
        id,
        case_id,
        case_key,
        project_name,
        assignee,
        work_date,
        hours: Hours::from_hundredths(hours),
        source_key: SourceKey::from(source_key),
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_default(),
    })
}

/// `[first day of month, first day of next month)` as ISO strings.
fn period_bounds(year: i32, month: u32) -> Result<(String, String), DomainError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DomainError::Repo(format!("invalid period {}-{}", year, month)))?;
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(ny, nm, 1)
        .ok_or_else(|| DomainError::Repo(format!("invalid period {}-{}", year, month)))?;
    Ok((start.to_string(), end.to_string()))
}

#[async_trait::async_trait]
impl RecordStore for SqliteRepo {
    async fn exists_by_source_key(&self, source_key: &str) -> Result<bool, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM man_hour_records WHERE source_key = ?1 LIMIT 1",
                params![source_key],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
            .is_some())
    }

    async fn create(&self, record: NewRecord) -> Result<RecordId, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                r#"
                INSERT INTO man_hour_records
                    (case_id, case_key, project_name, assignee, work_date, hours_hundredths, source_key, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (source_key) DO NOTHING
                RETURNING id
                "#,
                params![
                    record.case_id,
                    record.case_key.as_str(),
                    record.project_name.as_str(),
                    record.assignee.as_str(),
                    record.work_date.to_string(),
                    record.hours.hundredths(),
                    record.source_key.as_str(),
                    Utc::now().timestamp()
                ],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            Some(row) => row.get(0).map_err(|e| DomainError::Repo(e.to_string())),
            None => Err(DomainError::DuplicateSourceKey(record.source_key.to_string())),
        }
    }

    async fn query_by_period(
        &self,
        year: i32,
        month: u32,
    ) -> Result<Vec<ManHourRecord>, DomainError> {
        let (start, end) = period_bounds(year, month)?;
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                r#"
                SELECT id, case_id, case_key, project_name, assignee, work_date,
                       hours_hundredths, source_key, created_at
                FROM man_hour_records
                WHERE work_date >= ?1 AND work_date < ?2
                ORDER BY work_date, assignee, id
                "#,
                params![start, end],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut records = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl CaseRegistry for SqliteRepo {
    async fn find_active(&self, case_key: &str) -> Result<Option<Case>, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, unique_key, name, is_active FROM cases WHERE unique_key = ?1 AND is_active = 1",
                params![case_key],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        match rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            Some(row) => Ok(Some(case_from_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl CaseAdmin for SqliteRepo {
    async fn register_case(&self, name: &str) -> Result<Case, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Repo("case name must not be empty".into()));
        }
        let conn = self.connection()?;
        let now = Utc::now().timestamp();
        for _ in 0..CASE_KEY_ATTEMPTS {
            let key = generate_case_key();
            let mut rows = conn
                .query(
                    r#"
                    INSERT INTO cases (unique_key, name, is_active, created_at)
                    VALUES (?1, ?2, 1, ?3)
                    ON CONFLICT (unique_key) DO NOTHING
                    RETURNING id
                    "#,
                    params![key.as_str(), name, now],
                )
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?;
            if let Some(row) = rows
                .next()
                .await
                .map_err(|e| DomainError::Repo(e.to_string()))?
            {
                let id: i64 = row.get(0).map_err(|e| DomainError::Repo(e.to_string()))?;
                info!(case_id = id, unique_key = %key, name, "case registered");
                return Ok(Case {
                    id,
                    unique_key: key,
                    name: name.to_string(),
                    is_active: true,
                });
            }
            debug!(unique_key = %key, "case key collision, retrying");
        }
        Err(DomainError::Repo(format!(
            "no free case key after {} attempts",
            CASE_KEY_ATTEMPTS
        )))
    }

    async fn set_case_active(&self, unique_key: &str, active: bool) -> Result<bool, DomainError> {
        let conn = self.connection()?;
        let changed = conn
            .execute(
                "UPDATE cases SET is_active = ?1 WHERE unique_key = ?2",
                params![active as i64, unique_key.trim().to_uppercase()],
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        Ok(changed > 0)
    }

    async fn list_cases(&self) -> Result<Vec<Case>, DomainError> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, unique_key, name, is_active FROM cases ORDER BY id",
                (),
            )
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?;
        let mut cases = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DomainError::Repo(e.to_string()))?
        {
            cases.push(case_from_row(&row)?);
        }
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(key: &str, day: u32, assignee: &str, case_id: Option<i64>) -> NewRecord {
        NewRecord {
            case_id,
            case_key: "ABCD1234".into(),
            project_name: "基幹刷新".into(),
            assignee: assignee.into(),
            work_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            hours: Hours::from_hundredths(250),
            source_key: SourceKey::from(key.to_string()),
        }
    }

    #[test]
    fn test_generate_case_key_shape() {
        for _ in 0..50 {
            let key = generate_case_key();
            assert_eq!(key.len(), CASE_KEY_LEN);
            assert!(key.bytes().all(|b| CASE_KEY_CHARSET.contains(&b)));
        }
    }

    #[test]
    fn test_period_bounds_wraps_december() {
        assert_eq!(
            period_bounds(2024, 12).unwrap(),
            ("2024-12-01".to_string(), "2025-01-01".to_string())
        );
        assert!(period_bounds(2024, 0).is_err());
    }

    #[tokio::test]
    async fn test_create_and_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        assert!(repo.db_path().ends_with("manhour.db"));

        let id = repo.create(new_record("1.0_0", 1, "山田", None)).await.unwrap();
        assert!(id > 0);
        assert!(repo.exists_by_source_key("1.0_0").await.unwrap());
        assert!(!repo.exists_by_source_key("1.0_1").await.unwrap());

        let err = repo
            .create(new_record("1.0_0", 2, "佐藤", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateSourceKey(k) if k == "1.0_0"));
    }

    #[tokio::test]
    async fn test_query_by_period_round_trips_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        let case = repo.register_case("基幹刷新").await.unwrap();

        repo.create(new_record("a", 5, "佐藤", Some(case.id))).await.unwrap();
        repo.create(new_record("b", 1, "山田", None)).await.unwrap();
        repo.create(new_record("c", 1, "伊藤", None)).await.unwrap();

        let records = repo.query_by_period(2024, 3).await.unwrap();
        let order: Vec<_> = records.iter().map(|r| r.source_key.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
        assert_eq!(records[2].case_id, Some(case.id));
        assert_eq!(records[0].case_id, None);
        assert_eq!(records[0].hours, Hours::from_hundredths(250));
        assert_eq!(
            records[0].work_date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );

        assert!(repo.query_by_period(2024, 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_case_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        let case = repo.register_case("  Alpha  ").await.unwrap();
        assert_eq!(case.name, "Alpha");

        let found = repo.find_active(&case.unique_key).await.unwrap();
        assert_eq!(found, Some(case.clone()));

        assert!(repo.set_case_active(&case.unique_key, false).await.unwrap());
        assert!(repo.find_active(&case.unique_key).await.unwrap().is_none());
        assert!(!repo.set_case_active("ZZZZZZZZ", false).await.unwrap());

        let all = repo.list_cases().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);

        assert!(repo.register_case("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_reconnect_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = SqliteRepo::connect(dir.path()).await.unwrap();
            repo.create(new_record("k", 3, "山田", None)).await.unwrap();
        }
        let repo = SqliteRepo::connect(dir.path()).await.unwrap();
        assert!(repo.exists_by_source_key("k").await.unwrap());
    }
}
