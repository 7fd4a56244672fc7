//! Core domain layer. No external I/O dependencies.
//!
//! Entities, the report grammar and its parser live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod hours;
pub mod report;
pub mod text;
pub mod vocabulary;

pub use entities::{
    Case, ExportRow, ManHourEntry, ManHourRecord, MessageId, NewRecord, RawMessage, RecordId, SourceKey,
};
pub use errors::DomainError;
pub use hours::{Hours, ParseHoursError};
pub use report::{extract, parse_key_value_line, select_triggered};
pub use vocabulary::{ReportField, ReportVocabulary};
