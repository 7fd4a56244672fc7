//! Slack Web API client. Implements ChatSource, IdentityResolver and DeliverySink.
//!
//! Bot token auth; one channel per client. Rate-limited calls (HTTP 429) are retried
//! after the `Retry-After` delay a bounded number of times.

use super::mapper::{
    display_name, message_to_domain, AckResponse, HistoryResponse, UploadUrlResponse,
    UserInfoResponse,
};
use crate::domain::{DomainError, MessageId, RawMessage};
use crate::ports::{ChatSource, DeliverySink, IdentityResolver};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

const SLACK_API_URL: &str = "https://slack.com/api";
const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Slack adapter bound to one channel.
pub struct SlackClient {
    client: Client,
    api_url: String,
    token: String,
    channel_id: String,
    page_size: u32,
}

impl SlackClient {
    /// Create a new Slack client.
    ///
    /// # Arguments
    /// * `token` - Bot token (`xoxb-...`) with `channels:history`, `users:read` and `files:write`
    /// * `channel_id` - Channel the reports are posted to and the export is uploaded to
    /// * `page_size` - `limit` for `conversations.history` pages
    pub fn new(token: String, channel_id: String, page_size: u32) -> Self {
        Self {
            client: Client::new(),
            api_url: SLACK_API_URL.to_string(),
            token,
            channel_id,
            page_size: page_size.clamp(1, 1000),
        }
    }

    /// Point the client at another API root (proxies, Slack-compatible gateways).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_url, method)
    }

    /// Send a request built by `build`, waiting out rate limits. Errors are plain strings
    /// so each port can wrap them in its own `DomainError` variant.
    async fn send_with_retry<F>(&self, method: &str, build: F) -> Result<Response, String>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build()
                .bearer_auth(&self.token)
                .send()
                .await
                .map_err(|e| format!("{} request failed: {}", method, e))?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(format!(
                        "{} HTTP {}: {}",
                        method,
                        status,
                        text.chars().take(200).collect::<String>()
                    ));
                }
                return Ok(response);
            }

            attempt += 1;
            if attempt > MAX_RATE_LIMIT_RETRIES {
                return Err(format!("{} rate limited after {} retries", method, attempt - 1));
            }
            let wait = retry_after(response.headers().get(header::RETRY_AFTER));
            warn!(method, attempt, wait_secs = wait.as_secs(), "rate limited by Slack");
            tokio::time::sleep(wait).await;
        }
    }

    /// Call a Web API method and decode its JSON body.
    async fn call<T, F>(&self, method: &str, build: F) -> Result<T, String>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let response = self.send_with_retry(method, build).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| format!("{} returned malformed JSON: {}", method, e))
    }
}

/// Delay from a `Retry-After` header (seconds), with a fallback when absent or unparsable.
fn retry_after(value: Option<&header::HeaderValue>) -> Duration {
    let secs = value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

fn api_error(method: &str, error: Option<String>) -> String {
    format!(
        "{} failed: {}",
        method,
        error.unwrap_or_else(|| "unknown_error".to_string())
    )
}

#[async_trait::async_trait]
impl ChatSource for SlackClient {
    async fn fetch_since(&self, since: Option<&MessageId>) -> Result<Vec<RawMessage>, DomainError> {
        const METHOD: &str = "conversations.history";
        let url = self.method_url(METHOD);
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("channel", self.channel_id.clone()),
                ("limit", self.page_size.to_string()),
            ];
            if let Some(oldest) = since {
                query.push(("oldest", oldest.to_string()));
            }
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: HistoryResponse = self
                .call(METHOD, || self.client.get(&url).query(&query))
                .await
                .map_err(DomainError::Chat)?;
            if !page.ok {
                return Err(DomainError::Chat(api_error(METHOD, page.error)));
            }
            pages += 1;

            let next = page.next_cursor().map(str::to_string);
            messages.extend(page.messages.into_iter().filter_map(message_to_domain));
            debug!(page = pages, fetched = messages.len(), "history page received");

            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }

        info!(
            channel = %self.channel_id,
            since = since.map(|s| s.as_str()).unwrap_or("-"),
            pages,
            count = messages.len(),
            "fetched channel history"
        );
        Ok(messages)
    }
}

#[async_trait::async_trait]
impl IdentityResolver for SlackClient {
    async fn display_name(&self, author_id: &str) -> String {
        const METHOD: &str = "users.info";
        let url = self.method_url(METHOD);
        let result: Result<UserInfoResponse, String> = self
            .call(METHOD, || self.client.get(&url).query(&[("user", author_id)]))
            .await;

        match result {
            Ok(info) if info.ok => info
                .user
                .as_ref()
                .and_then(display_name)
                .unwrap_or_else(|| author_id.to_string()),
            Ok(info) => {
                warn!(user = author_id, error = %api_error(METHOD, info.error), "user lookup failed");
                author_id.to_string()
            }
            Err(e) => {
                warn!(user = author_id, error = %e, "user lookup failed");
                author_id.to_string()
            }
        }
    }
}

#[async_trait::async_trait]
impl DeliverySink for SlackClient {
    /// External upload flow: reserve an upload URL, POST the bytes, then share the
    /// file to the channel with `comment` as the initial message.
    async fn deliver(
        &self,
        filename: &str,
        content: &[u8],
        comment: &str,
    ) -> Result<(), DomainError> {
        const GET_URL: &str = "files.getUploadURLExternal";
        const COMPLETE: &str = "files.completeUploadExternal";

        let url = self.method_url(GET_URL);
        let length = content.len().to_string();
        let reserved: UploadUrlResponse = self
            .call(GET_URL, || {
                self.client
                    .post(&url)
                    .form(&[("filename", filename), ("length", length.as_str())])
            })
            .await
            .map_err(DomainError::Delivery)?;
        if !reserved.ok {
            return Err(DomainError::Delivery(api_error(GET_URL, reserved.error)));
        }
        let (upload_url, file_id) = match (reserved.upload_url, reserved.file_id) {
            (Some(u), Some(f)) => (u, f),
            _ => {
                return Err(DomainError::Delivery(format!(
                    "{} returned no upload_url/file_id",
                    GET_URL
                )));
            }
        };

        let bytes = content.to_vec();
        self.send_with_retry("upload", || {
            self.client
                .post(&upload_url)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone())
        })
        .await
        .map_err(DomainError::Delivery)?;

        let files = serde_json::json!([{ "id": file_id, "title": filename }]).to_string();
        let url = self.method_url(COMPLETE);
        let done: AckResponse = self
            .call(COMPLETE, || {
                self.client.post(&url).form(&[
                    ("files", files.as_str()),
                    ("channel_id", self.channel_id.as_str()),
                    ("initial_comment", comment),
                ])
            })
            .await
            .map_err(DomainError::Delivery)?;
        if !done.ok {
            return Err(DomainError::Delivery(api_error(COMPLETE, done.error)));
        }

        info!(
            channel = %self.channel_id,
            filename,
            bytes = content.len(),
            file_id = %file_id,
            "file uploaded to Slack"
        );
        Ok(())
    }
}
