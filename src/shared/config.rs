//! Application configuration. Slack credentials, paths, report vocabulary, schedule.

use crate::domain::{DomainError, ReportField, ReportVocabulary};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_TRIGGER_PHRASE: &str = "工数登録";
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;
pub const DEFAULT_UNKNOWN_SENDER: &str = "不明";
pub const DEFAULT_FETCH_PAGE_SIZE: u32 = 200;
pub const DEFAULT_SHEET_NAME: &str = "raw";

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Bot token. Read from MANHOUR_SLACK_BOT_TOKEN, falling back to SLACK_BOT_TOKEN.
    #[serde(default)]
    pub slack_bot_token: Option<String>,

    /// Channel the reports are posted to. Read from MANHOUR_SLACK_CHANNEL_ID, falling back to SLACK_CHANNEL_ID.
    #[serde(default)]
    pub slack_channel_id: Option<String>,

    #[serde(default)]
    pub data_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Report vocabulary
    // ─────────────────────────────────────────────────────────────────────────
    /// First-line marker of a report (default 工数登録).
    #[serde(default)]
    pub trigger_phrase: Option<String>,

    #[serde(default)]
    pub case_key_field: Option<String>,

    #[serde(default)]
    pub hours_field: Option<String>,

    #[serde(default)]
    pub date_field: Option<String>,

    #[serde(default)]
    pub assignee_field: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Import / export / schedule
    // ─────────────────────────────────────────────────────────────────────────
    /// Offset for message dates, the export period and the schedule (default +9, JST).
    #[serde(default)]
    pub utc_offset_hours: Option<i32>,

    /// Assignee used when a message has no author (default 不明).
    #[serde(default)]
    pub unknown_sender: Option<String>,

    /// `limit` per conversations.history page (default 200).
    #[serde(default)]
    pub fetch_page_size: Option<u32>,

    /// Local hour of the nightly run (default 0).
    #[serde(default)]
    pub schedule_hour: Option<u32>,

    /// Sheet name, also part of the export file name (default raw).
    #[serde(default)]
    pub export_sheet_name: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("MANHOUR"));
        if let Ok(path) = std::env::var("MANHOUR_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    /// Bot token from config or SLACK_BOT_TOKEN env.
    pub fn slack_bot_token(&self) -> Option<String> {
        non_empty(
            self.slack_bot_token
                .clone()
                .or_else(|| std::env::var("SLACK_BOT_TOKEN").ok()),
        )
    }

    /// Channel id from config or SLACK_CHANNEL_ID env.
    pub fn slack_channel_id(&self) -> Option<String> {
        non_empty(
            self.slack_channel_id
                .clone()
                .or_else(|| std::env::var("SLACK_CHANNEL_ID").ok()),
        )
    }

    /// Returns true if both Slack credentials are present.
    pub fn is_slack_configured(&self) -> bool {
        self.slack_bot_token().is_some() && self.slack_channel_id().is_some()
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(
            non_empty(self.data_dir.clone()).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        )
    }

    /// Watermark file inside the data dir.
    pub fn state_path(&self) -> PathBuf {
        self.data_dir_or_default().join("import_state.json")
    }

    /// Directory for generated exports.
    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir_or_default().join("reports")
    }

    pub fn unknown_sender_or_default(&self) -> String {
        non_empty(self.unknown_sender.clone()).unwrap_or_else(|| DEFAULT_UNKNOWN_SENDER.to_string())
    }

    pub fn fetch_page_size_or_default(&self) -> u32 {
        self.fetch_page_size
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_FETCH_PAGE_SIZE)
    }

    pub fn schedule_hour_or_default(&self) -> u32 {
        self.schedule_hour.unwrap_or(0)
    }

    pub fn export_sheet_name_or_default(&self) -> String {
        non_empty(self.export_sheet_name.clone()).unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string())
    }

    /// Report vocabulary; unset names fall back to the defaults.
    /// Field names may not contain the line separators (`,` `=`) or repeat.
    pub fn vocabulary(&self) -> Result<ReportVocabulary, DomainError> {
        let defaults = ReportVocabulary::default();
        let pick = |v: &Option<String>, field: ReportField| {
            non_empty(v.clone()).unwrap_or_else(|| defaults.key(field).to_string())
        };
        let trigger = non_empty(self.trigger_phrase.clone())
            .unwrap_or_else(|| DEFAULT_TRIGGER_PHRASE.to_string());
        let vocabulary = ReportVocabulary::new(
            &trigger,
            &pick(&self.case_key_field, ReportField::CaseKey),
            &pick(&self.hours_field, ReportField::Hours),
            &pick(&self.date_field, ReportField::Date),
            &pick(&self.assignee_field, ReportField::Assignee),
        );

        let keys: Vec<&str> = ReportField::ALL
            .iter()
            .map(|f| vocabulary.key(*f))
            .collect();
        for (i, k) in keys.iter().enumerate() {
            if k.contains([',', '=']) {
                return Err(DomainError::Config(format!(
                    "field name {:?} contains a separator",
                    k
                )));
            }
            if keys[..i].contains(k) {
                return Err(DomainError::Config(format!("field name {:?} used twice", k)));
            }
        }
        Ok(vocabulary)
    }

    /// UTC offset; hours outside -23..=23 are a configuration error.
    pub fn utc_offset(&self) -> Result<FixedOffset, DomainError> {
        let hours = self.utc_offset_hours.unwrap_or(DEFAULT_UTC_OFFSET_HOURS);
        hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| DomainError::Config(format!("utc_offset_hours out of range: {}", hours)))
    }

    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), DomainError> {
        self.vocabulary()?;
        self.utc_offset()?;
        if self.schedule_hour_or_default() > 23 {
            return Err(DomainError::Config(format!(
                "schedule_hour must be 0-23, got {}",
                self.schedule_hour_or_default()
            )));
        }
        Ok(())
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
