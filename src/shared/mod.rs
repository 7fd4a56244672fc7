//! Cross-cutting pieces shared by the binary and the services.

pub mod config;

pub use config::AppConfig;
