//! Slack adapter: channel history, user names and file delivery over the Web API.

pub mod client;
pub mod mapper;

pub use client::SlackClient;
