//! Keep only messages that start with the trigger phrase.

use crate::domain::RawMessage;
use crate::domain::text::equivalent;

/// First non-blank line of `body`, or the first line if all are blank.
pub(crate) fn first_line(body: &str) -> &str {
    body.lines()
        .find(|l| !l.trim().is_empty())
        .or_else(|| body.lines().next())
        .unwrap_or("")
}

/// True if the message body opens with `trigger` (whitespace-insensitive).
pub fn is_triggered(message: &RawMessage, trigger: &str) -> bool {
    !message.body.is_empty() && equivalent(first_line(&message.body), trigger)
}

/// Messages whose first line matches `trigger`, in input order. Others are dropped.
pub fn select_triggered(messages: Vec<RawMessage>, trigger: &str) -> Vec<RawMessage> {
    messages
        .into_iter()
        .filter(|m| is_triggered(m, trigger))
        .collect()
}
