//! Spreadsheet rendering for the monthly export. Uses the `csv` crate for safe serialization.
//!
//! Output is UTF-8 with a BOM so spreadsheet apps open Japanese text correctly.

use crate::domain::ExportRow;

/// Column titles of the export sheet.
pub const HEADER: [&str; 4] = ["日付", "案件名", "担当者", "時間(h)"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Render export rows as CSV bytes: header row, then one row per record.
///
/// Dates are ISO (`2024-03-01`), hours use the fixed-point display (`2.5`).
pub fn rows_to_csv(rows: &[ExportRow]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(UTF8_BOM.to_vec());

    wtr.write_record(HEADER)?;
    for row in rows {
        let date = row.work_date.format("%Y-%m-%d").to_string();
        let hours = row.hours.to_string();
        // One record per line
        let project = row.project.replace(['\r', '\n'], " ");
        let assignee = row.assignee.replace(['\r', '\n'], " ");
        wtr.write_record([&date, &project, &assignee, &hours])?;
    }

    wtr.flush()?;
    wtr.into_inner().map_err(|e| {
        csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            e.to_string(),
        ))
    })
}

/// Export file name for a period and sheet, e.g. `manhour_202403_raw.csv`.
pub fn export_filename(year: i32, month: u32, sheet_name: &str) -> String {
    format!("manhour_{}{:02}_{}.csv", year, month, sheet_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Hours;
    use chrono::NaiveDate;

    fn row(day: u32, project: &str, assignee: &str, hundredths: i64) -> ExportRow {
        ExportRow {
            work_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            project: project.into(),
            assignee: assignee.into(),
            hours: Hours::from_hundredths(hundredths),
        }
    }

    #[test]
    fn test_rows_to_csv_basic() {
        let bytes = rows_to_csv(&[row(1, "基幹刷新", "山田", 250)]).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines, vec!["日付,案件名,担当者,時間(h)", "2024-03-01,基幹刷新,山田,2.5"]);
    }

    #[test]
    fn test_rows_to_csv_special_chars() {
        let bytes = rows_to_csv(&[row(2, "A, \"B\"\nC", "x", 100)]).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("\"A, \"\"B\"\" C\""));
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let bytes = rows_to_csv(&[]).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text, "日付,案件名,担当者,時間(h)\n");
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename(2024, 3, "raw"), "manhour_202403_raw.csv");
    }
}
