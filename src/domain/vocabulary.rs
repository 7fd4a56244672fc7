//! Field-marker vocabulary of a man-hour report. Injected from configuration.

use crate::domain::text::normalize;

/// Fields a report line may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportField {
    CaseKey,
    Hours,
    Date,
    Assignee,
}

impl ReportField {
    pub const ALL: [ReportField; 4] = [
        ReportField::CaseKey,
        ReportField::Hours,
        ReportField::Date,
        ReportField::Assignee,
    ];

    /// Lines missing a required field are not reports.
    pub fn is_required(self) -> bool {
        matches!(self, ReportField::CaseKey | ReportField::Hours)
    }
}

/// Trigger phrase plus the key names used on report lines.
///
/// Names are stored normalized so lookups match what the line parser produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportVocabulary {
    trigger: String,
    case_key: String,
    hours: String,
    date: String,
    assignee: String,
}

impl ReportVocabulary {
    pub fn new(
        trigger: &str,
        case_key_field: &str,
        hours_field: &str,
        date_field: &str,
        assignee_field: &str,
    ) -> Self {
        Self {
            trigger: normalize(trigger),
            case_key: normalize(case_key_field),
            hours: normalize(hours_field),
            date: normalize(date_field),
            assignee: normalize(assignee_field),
        }
    }

    /// Normalized trigger phrase.
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Normalized key name for `field`.
    pub fn key(&self, field: ReportField) -> &str {
        match field {
            ReportField::CaseKey => &self.case_key,
            ReportField::Hours => &self.hours,
            ReportField::Date => &self.date,
            ReportField::Assignee => &self.assignee,
        }
    }
}

impl Default for ReportVocabulary {
    fn default() -> Self {
        Self::new("工数登録", "案件", "時間", "日付", "担当者")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        let required: Vec<_> = ReportField::ALL
            .into_iter()
            .filter(|f| f.is_required())
            .collect();
        assert_eq!(required, vec![ReportField::CaseKey, ReportField::Hours]);
    }

    #[test]
    fn test_names_are_normalized() {
        let v = ReportVocabulary::new(" 工数 登録 ", "案 件", "時間", "日付", "担当者\u{3000}");
        assert_eq!(v.trigger(), "工数登録");
        assert_eq!(v.key(ReportField::CaseKey), "案件");
        assert_eq!(v.key(ReportField::Assignee), "担当者");
    }
}
