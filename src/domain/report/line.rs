//! `key=value, key=value` line grammar.

use crate::domain::text::normalize;
use std::collections::HashMap;

/// Parse one report line into a key → value map.
///
/// Segments are separated by `,` and split on the first `=`. Keys are normalized,
/// values only trimmed. Segments without `=` are ignored; a repeated key keeps
/// its last value.
pub fn parse_key_value_line(line: &str) -> HashMap<String, String> {
    let mut kv = HashMap::new();
    for segment in line.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        kv.insert(normalize(key), value.trim().to_string());
    }
    kv
}
