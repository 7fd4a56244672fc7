//! Map Slack Web API payloads to domain entities.
//!
//! Only the fields the import reads are modelled; everything else is ignored by serde.

use crate::domain::text::strip_invisible;
use crate::domain::{MessageId, RawMessage};
use serde::Deserialize;

/// `conversations.history` response.
#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

impl HistoryResponse {
    /// Cursor of the next page, if Slack says there is one.
    pub fn next_cursor(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.response_metadata
            .as_ref()
            .map(|m| m.next_cursor.as_str())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Debug, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// `users.info` response.
#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
pub struct SlackUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub real_name_normalized: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// `files.getUploadURLExternal` response.
#[derive(Debug, Deserialize)]
pub struct UploadUrlResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub upload_url: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
}

/// Generic `{ok, error}` envelope.
#[derive(Debug, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Undo Slack's HTML escaping of `&`, `<` and `>` in message text.
pub fn unescape_text(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Map a Slack message to a domain message. Messages without a `ts` are dropped.
pub fn message_to_domain(msg: SlackMessage) -> Option<RawMessage> {
    let ts = msg.ts.filter(|t| !t.is_empty())?;
    Some(RawMessage {
        id: MessageId::new(ts),
        author_id: msg.user.filter(|u| !u.is_empty()),
        body: unescape_text(&msg.text),
        thread_id: msg.thread_ts,
    })
}

/// Pick the display name: normalized real name, then display name, then handle.
/// Invisible characters are removed; `None` when nothing usable is left.
pub fn display_name(user: &SlackUser) -> Option<String> {
    [
        user.profile.real_name_normalized.as_deref(),
        user.profile.display_name.as_deref(),
        user.name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(strip_invisible)
    .find(|n| !n.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_page_parses() {
        let json = r#"{
            "ok": true,
            "messages": [
                {"type": "message", "user": "U1", "text": "工数登録\n案件:A &amp; B", "ts": "1709251200.000100"},
                {"type": "message", "subtype": "channel_join", "text": "joined", "ts": "1709251100.000100"},
                {"type": "message", "text": "no ts"}
            ],
            "has_more": true,
            "response_metadata": {"next_cursor": "bmV4dA=="}
        }"#;
        let page: HistoryResponse = serde_json::from_str(json).unwrap();
        assert!(page.ok);
        assert_eq!(page.next_cursor(), Some("bmV4dA=="));

        let messages: Vec<_> = page
            .messages
            .into_iter()
            .filter_map(message_to_domain)
            .collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, MessageId::new("1709251200.000100"));
        assert_eq!(messages[0].author_id.as_deref(), Some("U1"));
        assert_eq!(messages[0].body, "工数登録\n案件:A & B");
        assert_eq!(messages[1].author_id, None);
    }

    #[test]
    fn test_last_page_has_no_cursor() {
        let json = r#"{"ok": true, "messages": [], "has_more": false,
                       "response_metadata": {"next_cursor": "stale"}}"#;
        let page: HistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_cursor(), None);

        let empty_cursor = r#"{"ok": true, "has_more": true, "response_metadata": {"next_cursor": ""}}"#;
        let page: HistoryResponse = serde_json::from_str(empty_cursor).unwrap();
        assert_eq!(page.next_cursor(), None);
    }

    #[test]
    fn test_error_envelope() {
        let page: HistoryResponse =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        assert!(!page.ok);
        assert_eq!(page.error.as_deref(), Some("channel_not_found"));
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text("a &lt;b&gt; &amp;lt;"), "a <b> &lt;");
    }

    #[test]
    fn test_display_name_precedence() {
        let json = r#"{"ok": true, "user": {"name": "yamada",
            "profile": {"real_name_normalized": "Yamada Taro", "display_name": "taro"}}}"#;
        let info: UserInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            display_name(&info.user.unwrap()).as_deref(),
            Some("Yamada Taro")
        );

        let json = r#"{"ok": true, "user": {"name": "yamada",
            "profile": {"real_name_normalized": "", "display_name": "taro\u200b"}}}"#;
        let info: UserInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(display_name(&info.user.unwrap()).as_deref(), Some("taro"));

        let json = r#"{"ok": true, "user": {"name": "yamada", "profile": {}}}"#;
        let info: UserInfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(display_name(&info.user.unwrap()).as_deref(), Some("yamada"));
    }

    #[test]
    fn test_display_name_none_when_blank() {
        let json = r#"{"profile": {"display_name": "\u200b"}}"#;
        let user: SlackUser = serde_json::from_str(json).unwrap();
        assert_eq!(display_name(&user), None);
    }
}
