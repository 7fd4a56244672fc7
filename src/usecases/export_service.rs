//! Export service. Builds the monthly man-hour sheet and delivers it to the channel.
//!
//! Coordinates between repository (records), CSV rendering, filesystem (reports) and delivery.

use crate::adapters::export::{export_filename, rows_to_csv};
use crate::domain::{DomainError, ExportRow, Hours};
use crate::ports::{DeliverySink, RecordStore};
use chrono::{Datelike, FixedOffset, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// Service for the monthly export.
///
/// Orchestrates the flow:
/// 1. Query the period's records (ordered by date, then assignee)
/// 2. Render them as a spreadsheet
/// 3. Save a copy under the reports directory
/// 4. Deliver the file to the chat channel
pub struct ExportService {
    records: Arc<dyn RecordStore>,
    sink: Option<Arc<dyn DeliverySink>>,
    reports_dir: PathBuf,
    sheet_name: String,
}

/// Outcome of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub rows: usize,
    pub total_hours: Hours,
    pub delivered: bool,
}

impl ExportService {
    /// Create a new export service.
    ///
    /// # Arguments
    /// * `records` - Record store to read from
    /// * `sink` - Delivery target; `None` keeps exports local
    /// * `reports_dir` - Directory to save generated sheets
    /// * `sheet_name` - Sheet name, also used in the file name
    pub fn new(
        records: Arc<dyn RecordStore>,
        sink: Option<Arc<dyn DeliverySink>>,
        reports_dir: PathBuf,
        sheet_name: String,
    ) -> Self {
        Self {
            records,
            sink,
            reports_dir,
            sheet_name,
        }
    }

    /// Rows of the `year`-`month` export, ordered by work date then assignee.
    pub async fn build_export(&self, year: i32, month: u32) -> Result<Vec<ExportRow>, DomainError> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::Export(format!("invalid month: {}", month)));
        }
        let records = self.records.query_by_period(year, month).await?;
        Ok(records.iter().map(ExportRow::from).collect())
    }

    /// Build, save and (when `deliver` is set and a sink exists) upload the export.
    pub async fn export_and_deliver(
        &self,
        year: i32,
        month: u32,
        deliver: bool,
    ) -> Result<ExportOutcome, DomainError> {
        let rows = self.build_export(year, month).await?;
        let total_hours: Hours = rows.iter().map(|r| r.hours).sum();
        let content =
            rows_to_csv(&rows).map_err(|e| DomainError::Export(format!("render CSV: {}", e)))?;

        fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| DomainError::Export(format!("Failed to create reports dir: {}", e)))?;
        let filename = export_filename(year, month, &self.sheet_name);
        let path = self.reports_dir.join(&filename);
        fs::write(&path, &content)
            .await
            .map_err(|e| DomainError::Export(format!("Failed to write export: {}", e)))?;
        info!(
            path = %path.display(),
            rows = rows.len(),
            total_hours = %total_hours,
            "export written"
        );

        let delivered = match (&self.sink, deliver) {
            (Some(sink), true) => {
                sink.deliver(&filename, &content, &delivery_comment(year, month))
                    .await?;
                info!(filename = %filename, "export delivered");
                true
            }
            (None, true) => {
                warn!("no delivery sink configured; export kept locally");
                false
            }
            _ => false,
        };

        Ok(ExportOutcome {
            path,
            rows: rows.len(),
            total_hours,
            delivered,
        })
    }
}

/// Message posted alongside the uploaded file.
pub fn delivery_comment(year: i32, month: u32) -> String {
    format!("{}年{}月 工数レポートです。", year, month)
}

/// Current (year, month) at `offset`.
pub fn current_period(offset: FixedOffset) -> (i32, u32) {
    let today = Utc::now().with_timezone(&offset).date_naive();
    (today.year(), today.month())
}
