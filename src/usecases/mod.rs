//! Application use cases. Orchestrate domain logic via ports.

pub mod export_service;
pub mod import_service;
pub mod scheduler_service;

pub use export_service::ExportService;
pub use import_service::{ImportService, ImportSettings, ImportStats};
pub use scheduler_service::SchedulerService;
