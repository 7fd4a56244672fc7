//! manhour-sync: import man-hour reports from a Slack channel and publish monthly exports,
//! with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
