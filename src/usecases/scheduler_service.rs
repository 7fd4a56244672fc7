//! Scheduler (daemon) use case: once a day at `schedule_hour:00` local time, import new
//! reports and publish the month-to-date export.
//!
//! Does not block the runtime; waits with tokio::time::sleep.

use crate::domain::DomainError;
use crate::usecases::export_service::{current_period, ExportOutcome, ExportService};
use crate::usecases::import_service::{ImportService, ImportStats};
use chrono::{DateTime, Days, FixedOffset, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of one nightly cycle.
#[derive(Debug)]
pub struct NightlyReport {
    /// `None` when the import failed; the export still runs on what is stored.
    pub import: Option<ImportStats>,
    pub export: ExportOutcome,
}

/// Nightly scheduler. Runs import then export+delivery, sleeps until the next slot, repeats.
pub struct SchedulerService {
    import: Arc<ImportService>,
    export: Arc<ExportService>,
    schedule_hour: u32,
    offset: FixedOffset,
}

impl SchedulerService {
    pub fn new(
        import: Arc<ImportService>,
        export: Arc<ExportService>,
        schedule_hour: u32,
        offset: FixedOffset,
    ) -> Self {
        Self {
            import,
            export,
            schedule_hour: schedule_hour.min(23),
            offset,
        }
    }

    /// One nightly cycle. An import failure is logged and the export of the current month
    /// still goes out; an export failure is returned.
    pub async fn run_nightly(&self) -> Result<NightlyReport, DomainError> {
        info!("nightly run started");
        let import = match self.import.run_import().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "nightly import failed; exporting stored records");
                None
            }
        };

        let (year, month) = current_period(self.offset);
        let export = self.export.export_and_deliver(year, month, true).await?;
        info!(
            year,
            month,
            imported = import.as_ref().map(|s| s.records_created).unwrap_or(0),
            rows = export.rows,
            "nightly run complete"
        );
        Ok(NightlyReport { import, export })
    }

    /// Run the scheduler loop until the process is stopped.
    pub async fn run_loop(&self) -> Result<(), DomainError> {
        info!(
            hour = self.schedule_hour,
            offset = %self.offset,
            "scheduler started"
        );
        loop {
            let delay = next_run_delay(Utc::now(), self.schedule_hour, self.offset);
            info!(sleep_secs = delay.as_secs(), "sleeping until next nightly run");
            tokio::time::sleep(delay).await;

            if let Err(e) = self.run_nightly().await {
                warn!(error = %e, "nightly run failed");
            }
        }
    }
}

/// Time from `now` until the next `hour:00` at `offset`. Exactly on the slot means
/// the following day, so one slot never fires twice.
pub fn next_run_delay(now: DateTime<Utc>, hour: u32, offset: FixedOffset) -> Duration {
    let local = now.with_timezone(&offset);
    let slot = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = local.date_naive();
    let mut next = today.and_time(slot);
    if next <= local.naive_local() {
        next = today
            .checked_add_days(Days::new(1))
            .unwrap_or(today)
            .and_time(slot);
    }
    (next - local.naive_local())
        .to_std()
        .unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::memory::MemoryStore;
    use crate::domain::{MessageId, RawMessage};
    use crate::ports::{ChatSource, IdentityResolver};
    use crate::usecases::import_service::ImportSettings;
    use chrono::TimeZone;

    struct OneReportChat {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ChatSource for OneReportChat {
        async fn fetch_since(
            &self,
            _since: Option<&MessageId>,
        ) -> Result<Vec<RawMessage>, DomainError> {
            if self.fail {
                return Err(DomainError::Chat("offline".into()));
            }
            Ok(vec![RawMessage {
                id: MessageId::new(format!("{}.000100", Utc::now().timestamp())),
                author_id: Some("U1".into()),
                body: "工数登録\n案件=ABCD1234, 時間=2".into(),
                thread_id: None,
            }])
        }
    }

    struct NamedIdentity;

    #[async_trait::async_trait]
    impl IdentityResolver for NamedIdentity {
        async fn display_name(&self, _author_id: &str) -> String {
            "山田".into()
        }
    }

    fn scheduler(fail: bool, reports: &std::path::Path) -> SchedulerService {
        let store = Arc::new(MemoryStore::new());
        let import = ImportService::new(
            Arc::new(OneReportChat { fail }),
            Arc::new(NamedIdentity),
            store.clone(),
            store.clone(),
            store.clone(),
            ImportSettings::default(),
        );
        let export = ExportService::new(store, None, reports.to_path_buf(), "raw".into());
        SchedulerService::new(Arc::new(import), Arc::new(export), 0, jst())
    }

    #[tokio::test]
    async fn test_run_nightly_imports_then_exports() {
        let dir = tempfile::tempdir().unwrap();
        let report = scheduler(false, dir.path()).run_nightly().await.unwrap();
        assert_eq!(report.import.map(|s| s.records_created), Some(1));
        assert_eq!(report.export.rows, 1);
        assert!(report.export.path.exists());
        assert!(!report.export.delivered);
    }

    #[tokio::test]
    async fn test_run_nightly_exports_even_if_import_fails() {
        let dir = tempfile::tempdir().unwrap();
        let report = scheduler(true, dir.path()).run_nightly().await.unwrap();
        assert!(report.import.is_none());
        assert_eq!(report.export.rows, 0);
        assert!(report.export.path.exists());
    }

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn test_next_run_later_same_day() {
        // 2024-03-01 10:00 JST
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 1, 0, 0).unwrap();
        assert_eq!(
            next_run_delay(now, 12, jst()),
            Duration::from_secs(2 * 3600)
        );
    }

    #[test]
    fn test_next_run_midnight_rolls_to_next_day() {
        // 2024-03-01 23:30 JST
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        assert_eq!(next_run_delay(now, 0, jst()), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_next_run_exactly_on_slot_waits_a_day() {
        // 2024-03-02 00:00 JST
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        assert_eq!(
            next_run_delay(now, 0, jst()),
            Duration::from_secs(24 * 3600)
        );
    }

    #[test]
    fn test_next_run_respects_offset() {
        // 00:30 UTC is 09:30 JST: next JST midnight is 14h30m away, next UTC midnight 23h30m.
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(
            next_run_delay(now, 0, jst()),
            Duration::from_secs(14 * 3600 + 30 * 60)
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            next_run_delay(now, 0, utc),
            Duration::from_secs(23 * 3600 + 30 * 60)
        );
    }
}
