//! Infrastructure adapters. Implement outbound ports.
//!
//! Slack, SQLite, JSON state, spreadsheet export, terminal UI. Map errors to DomainError.

pub mod export;
pub mod persistence;
pub mod slack;
pub mod ui;
