//! Turn a report message body into typed man-hour entries.
//!
//! Pure and context-free: the assignee default (message author) is applied later
//! by the import, not here.

use crate::domain::report::line::parse_key_value_line;
use crate::domain::text::normalize;
use crate::domain::{Hours, ManHourEntry, ParseHoursError, ReportField, ReportVocabulary};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Why a line produced no entry. Only ever logged; never surfaced to callers.
#[derive(Error, Debug, PartialEq, Eq)]
enum LineRejection {
    #[error("missing required field {0:?}")]
    MissingField(ReportField),
    #[error("empty case key")]
    EmptyCaseKey,
    #[error("bad hours: {0}")]
    Hours(#[from] ParseHoursError),
    #[error("bad date: {0}")]
    Date(String),
}

/// Extract entries from `body`, one per well-formed line after the trigger line.
///
/// Returns nothing when the first non-blank line is not the trigger phrase.
/// Malformed lines (missing case key or hours, unparseable hours or date) are
/// skipped and the rest of the message is still processed. `message_date` fills
/// in lines without an explicit date.
pub fn extract(
    body: &str,
    vocabulary: &ReportVocabulary,
    message_date: NaiveDate,
) -> Vec<ManHourEntry> {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    if normalize(header) != vocabulary.trigger() {
        return Vec::new();
    }

    lines
        .enumerate()
        .filter_map(|(n, line)| {
            let kv = parse_key_value_line(line);
            match entry_from_fields(&kv, vocabulary, message_date) {
                Ok(entry) => Some(entry),
                Err(reason) => {
                    debug!(line_no = n + 1, %reason, "skipping report line");
                    None
                }
            }
        })
        .collect()
}

fn entry_from_fields(
    kv: &HashMap<String, String>,
    vocabulary: &ReportVocabulary,
    message_date: NaiveDate,
) -> Result<ManHourEntry, LineRejection> {
    let value = |field: ReportField| kv.get(vocabulary.key(field)).map(|v| v.trim());

    if let Some(missing) = ReportField::ALL
        .into_iter()
        .find(|f| f.is_required() && value(*f).is_none())
    {
        return Err(LineRejection::MissingField(missing));
    }

    let case_key = value(ReportField::CaseKey)
        .unwrap_or_default()
        .to_uppercase();
    if case_key.is_empty() {
        return Err(LineRejection::EmptyCaseKey);
    }

    let hours: Hours = value(ReportField::Hours).unwrap_or_default().parse()?;

    let work_date = match value(ReportField::Date).filter(|d| !d.is_empty()) {
        Some(d) => parse_work_date(d).ok_or_else(|| LineRejection::Date(d.to_string()))?,
        None => message_date,
    };

    let assignee = value(ReportField::Assignee)
        .filter(|a| !a.is_empty())
        .map(String::from);

    Ok(ManHourEntry {
        case_key,
        hours,
        work_date,
        assignee,
    })
}

/// ISO 8601 calendar date, extended (`2024-03-01`) or basic (`20240301`) form.
fn parse_work_date(d: &str) -> Option<NaiveDate> {
    if d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(d, "%Y%m%d").ok();
    }
    d.parse::<NaiveDate>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> ReportVocabulary {
        ReportVocabulary::default()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_minimal_line_uses_defaults() {
        let msg_date = day(2024, 3, 15);
        let out = extract("工数登録\n案件=ABCD1234, 時間=2", &vocab(), msg_date);
        assert_eq!(
            out,
            vec![ManHourEntry {
                case_key: "ABCD1234".into(),
                hours: Hours::from_hundredths(200),
                work_date: msg_date,
                assignee: None,
            }]
        );
    }

    #[test]
    fn test_full_line() {
        let body = "工数登録\n案件=abcd1234, 時間=2.5, 日付=2024-03-01, 担当者=田中";
        let out = extract(body, &vocab(), day(2024, 3, 15));
        assert_eq!(
            out,
            vec![ManHourEntry {
                case_key: "ABCD1234".into(),
                hours: Hours::from_hundredths(250),
                work_date: day(2024, 3, 1),
                assignee: Some("田中".into()),
            }]
        );
    }

    #[test]
    fn test_trigger_with_trailing_space() {
        let out = extract("工数登録 \n案件=A, 時間=1", &vocab(), day(2024, 1, 1));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_wrong_trigger_yields_nothing() {
        assert!(extract("雑談\n案件=A, 時間=1", &vocab(), day(2024, 1, 1)).is_empty());
        assert!(extract("", &vocab(), day(2024, 1, 1)).is_empty());
        assert!(extract(" \n \n", &vocab(), day(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_missing_hours_skips_line_and_continues() {
        let body = "工数登録\n案件=AAAA0001\n案件=BBBB0002, 時間=1.5";
        let out = extract(body, &vocab(), day(2024, 1, 1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].case_key, "BBBB0002");
    }

    #[test]
    fn test_bad_values_skip_only_that_line() {
        let body = "工数登録\n\
                    案件=A1, 時間=abc\n\
                    案件=A2, 時間=1, 日付=2024/03/01\n\
                    案件=A3, 時間=0\n\
                    案件= , 時間=1\n\
                    時間=1\n\
                    案件=A4, 時間=3, 単位=h";
        let out = extract(body, &vocab(), day(2024, 1, 1));
        let keys: Vec<_> = out.iter().map(|e| e.case_key.as_str()).collect();
        assert_eq!(keys, vec!["A4"]);
    }

    #[test]
    fn test_empty_optional_fields_fall_back() {
        let msg_date = day(2024, 5, 2);
        let out = extract("工数登録\n案件=A, 時間=1, 日付=, 担当者= ", &vocab(), msg_date);
        assert_eq!(out[0].work_date, msg_date);
        assert_eq!(out[0].assignee, None);
    }

    #[test]
    fn test_blank_lines_ignored_and_order_kept() {
        let body = "\n工数登録\n\n案件=B, 時間=1\n   \n案件=A, 時間=2\n";
        let out = extract(body, &vocab(), day(2024, 1, 1));
        let keys: Vec<_> = out.iter().map(|e| e.case_key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A"]);
    }

    #[test]
    fn test_custom_vocabulary() {
        let v = ReportVocabulary::new("#hours", "case", "h", "date", "who");
        let out = extract("#hours\ncase=x1, h=4, who=sam", &v, day(2024, 1, 1));
        assert_eq!(out[0].case_key, "X1");
        assert_eq!(out[0].assignee.as_deref(), Some("sam"));
        assert!(extract("#hours\n案件=A, 時間=1", &v, day(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let body = "工数登録\n案件=a, 時間=1\n案件=b, 時間=2, 担当者=x";
        let d = day(2024, 2, 29);
        assert_eq!(extract(body, &vocab(), d), extract(body, &vocab(), d));
    }

    #[test]
    fn test_rejection_reasons() {
        let v = vocab();
        let d = day(2024, 1, 1);
        let kv = parse_key_value_line("案件=A");
        assert_eq!(
            entry_from_fields(&kv, &v, d),
            Err(LineRejection::MissingField(ReportField::Hours))
        );
        let kv = parse_key_value_line("案件=A, 時間=1, 日付=2024-02-30");
        assert_eq!(
            entry_from_fields(&kv, &v, d),
            Err(LineRejection::Date("2024-02-30".into()))
        );
    }

    #[test]
    fn test_fullwidth_hours() {
        let out = extract("工数登録\n案件=ABCD1234, 時間=２.５", &vocab(), day(2024, 3, 1));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hours, Hours::from_hundredths(250));
    }

    #[test]
    fn test_basic_form_date() {
        let out = extract("工数登録\n案件=A, 時間=1, 日付=20240301", &vocab(), day(2024, 5, 1));
        assert_eq!(out[0].work_date, day(2024, 3, 1));
        assert_eq!(parse_work_date("2024-03-01"), Some(day(2024, 3, 1)));
        assert_eq!(parse_work_date("20240230"), None);
        assert_eq!(parse_work_date("2024031"), None);
    }
}
