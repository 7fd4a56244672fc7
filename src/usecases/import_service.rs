//! Import logic: fetch since watermark -> filter -> extract -> dedupe + persist -> advance watermark.
//!
//! - Reads the watermark from WatermarkStore and fetches only newer messages
//! - Every entry gets a source key `"{message_id}_{index}"`; existing keys are skipped
//! - Updates the watermark (max message id, never `messages[0]`) only after the whole batch
//! - A fetch failure aborts with no writes; a crash mid-batch leaves the watermark
//!   behind so the next run reprocesses the same window safely

use crate::domain::{
    extract, select_triggered, DomainError, ManHourEntry, MessageId, NewRecord, RawMessage,
    ReportVocabulary, SourceKey,
};
use crate::ports::{CaseRegistry, ChatSource, IdentityResolver, RecordStore, WatermarkStore};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lifecycle of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Idle,
    Fetching,
    Processing,
    Committing,
    Failed,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportPhase::Idle => "idle",
            ImportPhase::Fetching => "fetching",
            ImportPhase::Processing => "processing",
            ImportPhase::Committing => "committing",
            ImportPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Knobs of the import that come from configuration.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub vocabulary: ReportVocabulary,
    /// Offset used to turn message timestamps into calendar dates (JST by default).
    pub utc_offset: FixedOffset,
    /// Sender name used when a message has no author.
    pub unknown_sender: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            vocabulary: ReportVocabulary::default(),
            utc_offset: FixedOffset::east_opt(9 * 3600).unwrap_or_else(|| Utc.fix()),
            unknown_sender: "不明".to_string(),
        }
    }
}

/// Author id -> display name, scoped to a single run.
#[derive(Debug, Default)]
pub struct SenderCache {
    names: HashMap<String, String>,
}

impl SenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for `author_id`, asking `identity` at most once per author.
    pub async fn resolve(
        &mut self,
        identity: &dyn IdentityResolver,
        author_id: Option<&str>,
        unknown: &str,
    ) -> String {
        let Some(author_id) = author_id.filter(|a| !a.is_empty()) else {
            return unknown.to_string();
        };
        if let Some(name) = self.names.get(author_id) {
            return name.clone();
        }
        let name = identity.display_name(author_id).await;
        self.names.insert(author_id.to_string(), name.clone());
        name
    }
}

/// Import service. Single writer: concurrent calls to `run_import` are serialized.
pub struct ImportService {
    chat: Arc<dyn ChatSource>,
    identity: Arc<dyn IdentityResolver>,
    cases: Arc<dyn CaseRegistry>,
    records: Arc<dyn RecordStore>,
    watermark: Arc<dyn WatermarkStore>,
    settings: ImportSettings,
    run_lock: Mutex<()>,
    last_phase: std::sync::Mutex<ImportPhase>,
}

impl ImportService {
    pub fn new(
        chat: Arc<dyn ChatSource>,
        identity: Arc<dyn IdentityResolver>,
        cases: Arc<dyn CaseRegistry>,
        records: Arc<dyn RecordStore>,
        watermark: Arc<dyn WatermarkStore>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            chat,
            identity,
            cases,
            records,
            watermark,
            settings,
            run_lock: Mutex::new(()),
            last_phase: std::sync::Mutex::new(ImportPhase::Idle),
        }
    }

    /// Phase the most recent run ended in (`Idle` after success, `Failed` after an error).
    pub fn last_phase(&self) -> ImportPhase {
        self.last_phase
            .lock()
            .map(|p| *p)
            .unwrap_or(ImportPhase::Failed)
    }

    fn enter(&self, phase: ImportPhase) {
        if let Ok(mut current) = self.last_phase.lock() {
            let from = *current;
            debug!(%from, to = %phase, "import phase");
            *current = phase;
        }
    }

    /// Run one import. Returns counts; `records_created` is the number of new records.
    pub async fn run_import(&self) -> Result<ImportStats, DomainError> {
        let _guard = self.run_lock.lock().await;
        match self.run_phases().await {
            Ok(stats) => {
                self.enter(ImportPhase::Idle);
                info!(
                    fetched = stats.messages_fetched,
                    matched = stats.messages_matched,
                    created = stats.records_created,
                    duplicates = stats.duplicates_skipped,
                    watermark = stats.watermark.as_ref().map(|w| w.as_str()).unwrap_or("-"),
                    "import finished"
                );
                Ok(stats)
            }
            Err(e) => {
                self.enter(ImportPhase::Failed);
                warn!(error = %e, "import failed; watermark left untouched");
                Err(e)
            }
        }
    }

    async fn run_phases(&self) -> Result<ImportStats, DomainError> {
        self.enter(ImportPhase::Fetching);
        let since = self.watermark.read().await?;
        let mut messages = self.chat.fetch_since(since.as_ref()).await?;

        // Only messages strictly newer than the watermark
        if let Some(w) = &since {
            messages.retain(|m| &m.id > w);
        }

        let mut stats = ImportStats {
            messages_fetched: messages.len(),
            watermark: since.clone(),
            ..ImportStats::default()
        };
        if messages.is_empty() {
            debug!("no new messages");
            return Ok(stats);
        }
        let latest = messages.iter().map(|m| &m.id).max().cloned();

        self.enter(ImportPhase::Processing);
        let triggered = select_triggered(messages, self.settings.vocabulary.trigger());
        stats.messages_matched = triggered.len();
        let mut senders = SenderCache::new();
        for message in &triggered {
            self.import_message(message, &mut senders, &mut stats).await?;
        }

        self.enter(ImportPhase::Committing);
        if let Some(latest) = latest {
            if since.as_ref().is_none_or(|w| &latest > w) {
                self.watermark.write(&latest).await?;
                stats.watermark = Some(latest);
            }
        }
        Ok(stats)
    }

    async fn import_message(
        &self,
        message: &RawMessage,
        senders: &mut SenderCache,
        stats: &mut ImportStats,
    ) -> Result<(), DomainError> {
        let message_date = message_date(&message.id, self.settings.utc_offset);
        let entries = extract(&message.body, &self.settings.vocabulary, message_date);
        if entries.is_empty() {
            debug!(msg_id = %message.id, "report message without valid lines");
            return Ok(());
        }
        let sender = senders
            .resolve(
                self.identity.as_ref(),
                message.author_id.as_deref(),
                &self.settings.unknown_sender,
            )
            .await;

        for (index, entry) in entries.into_iter().enumerate() {
            let source_key = SourceKey::new(&message.id, index);
            if self.records.exists_by_source_key(source_key.as_str()).await? {
                stats.duplicates_skipped += 1;
                continue;
            }
            let record = self.resolve_record(entry, &sender, source_key).await?;
            let source_key = record.source_key.clone();
            match self.records.create(record).await {
                Ok(id) => {
                    stats.records_created += 1;
                    debug!(record_id = id, source_key = %source_key, "record created");
                }
                Err(DomainError::DuplicateSourceKey(key)) => {
                    stats.duplicates_skipped += 1;
                    debug!(source_key = %key, "record created concurrently; skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Attach the active case (if any) and the final assignee to an entry.
    async fn resolve_record(
        &self,
        entry: ManHourEntry,
        sender: &str,
        source_key: SourceKey,
    ) -> Result<NewRecord, DomainError> {
        let case = self.cases.find_active(&entry.case_key).await?;
        if case.is_none() {
            debug!(case_key = %entry.case_key, "no active case; keeping key as project name");
        }
        let (case_id, project_name) = match case {
            Some(c) => (Some(c.id), c.name),
            None => (None, entry.case_key.clone()),
        };
        Ok(NewRecord {
            case_id,
            case_key: entry.case_key,
            project_name,
            assignee: entry.assignee.unwrap_or_else(|| sender.to_string()),
            work_date: entry.work_date,
            hours: entry.hours,
            source_key,
        })
    }
}

/// Calendar date of a message at `offset`. Falls back to today when the id is not a timestamp.
pub fn message_date(id: &MessageId, offset: FixedOffset) -> NaiveDate {
    id.epoch_seconds()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
        .with_timezone(&offset)
        .date_naive()
}

/// Result of a single import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub messages_fetched: usize,
    pub messages_matched: usize,
    pub records_created: usize,
    pub duplicates_skipped: usize,
    /// Watermark after the run.
    pub watermark: Option<MessageId>,
}
