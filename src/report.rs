//! Statistical patient reports as Excel workbooks or CSV text.
//!
//! Generation is pure: rows in, bytes or text out. Writing the result to
//! disk is left to the caller.

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::patient::PatientRow;

/// Which report to build from the patient rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportKind {
    /// Every patient, one row each.
    #[default]
    PatientList,
    /// Patient count per diagnosis.
    ByDiagnosis,
    /// Patient count per age group.
    ByAgeGroup,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [ReportKind::PatientList, ReportKind::ByDiagnosis, ReportKind::ByAgeGroup];

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::PatientList => "Patient list",
            ReportKind::ByDiagnosis => "Statistics by diagnosis",
            ReportKind::ByAgeGroup => "Statistics by age group",
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Excel,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Excel => "xlsx",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Who generated the report and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub generated_by: String,
    pub role: String,
    pub date: String,
}

/// Fixed age groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    UpTo18,
    From19To30,
    From31To45,
    From46To60,
    Over60,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 5] = [
        AgeBucket::UpTo18,
        AgeBucket::From19To30,
        AgeBucket::From31To45,
        AgeBucket::From46To60,
        AgeBucket::Over60,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeBucket::UpTo18 => "0-18",
            AgeBucket::From19To30 => "19-30",
            AgeBucket::From31To45 => "31-45",
            AgeBucket::From46To60 => "46-60",
            AgeBucket::Over60 => "60+",
        }
    }

    pub fn for_age(age: i64) -> Self {
        match age {
            ..=18 => AgeBucket::UpTo18,
            19..=30 => AgeBucket::From19To30,
            31..=45 => AgeBucket::From31To45,
            46..=60 => AgeBucket::From46To60,
            _ => AgeBucket::Over60,
        }
    }
}

/// Bucket for a textual age; `None` when it is not a whole number.
pub fn age_bucket(age: &str) -> Option<AgeBucket> {
    age.trim().parse::<i64>().ok().map(AgeBucket::for_age)
}

/// Count rows per age group, skipping non-numeric ages. Always returns
/// all five groups in order.
pub fn age_group_counts(rows: &[PatientRow]) -> Vec<(AgeBucket, usize)> {
    let mut counts = [0usize; 5];
    for bucket in rows.iter().filter_map(|r| age_bucket(&r.age)) {
        counts[bucket as usize] += 1;
    }
    AgeBucket::ALL.into_iter().zip(counts).collect()
}

/// Count rows per diagnosis, in order of first appearance.
pub fn diagnosis_counts(rows: &[PatientRow]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for row in rows {
        match counts.iter_mut().find(|(d, _)| *d == row.diagnosis) {
            Some((_, count)) => *count += 1,
            None => counts.push((row.diagnosis.clone(), 1)),
        }
    }
    counts
}

const LIST_HEADERS: [&str; 6] = ["ID", "Full Name", "Age", "Diagnosis", "Date", "Status"];
const COUNT_HEADER: &str = "Patients";

/// Table body of a report: header row and data rows.
enum Table {
    List(Vec<[String; 6]>),
    Counts(&'static str, Vec<(String, usize)>),
}

fn build_table(rows: &[PatientRow], kind: ReportKind) -> Table {
    match kind {
        ReportKind::PatientList => Table::List(
            rows.iter()
                .map(|r| {
                    [
                        r.id.clone(),
                        r.name.clone(),
                        r.age.clone(),
                        r.diagnosis.clone(),
                        r.date.clone(),
                        r.status.clone(),
                    ]
                })
                .collect(),
        ),
        ReportKind::ByDiagnosis => Table::Counts("Diagnosis", diagnosis_counts(rows)),
        ReportKind::ByAgeGroup => Table::Counts(
            "Age Group",
            age_group_counts(rows)
                .into_iter()
                .map(|(bucket, count)| (bucket.label().to_string(), count))
                .collect(),
        ),
    }
}

/// Build an Excel workbook and return its bytes.
pub fn generate_excel_report(rows: &[PatientRow], kind: ReportKind, meta: &ReportMeta) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let sheet_name: String = kind.title().chars().take(31).collect();
    worksheet.set_name(&sheet_name)?;

    // Header format
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White)
        .set_border(FormatBorder::Thin);
    let label_format = Format::new().set_bold();

    // Generator info
    worksheet.write_string_with_format(0, 0, "Generated by:", &label_format)?;
    worksheet.write_string(0, 1, format!("{} ({})", meta.generated_by, meta.role))?;
    worksheet.write_string_with_format(1, 0, "Date:", &label_format)?;
    worksheet.write_string(1, 1, &meta.date)?;

    const HEADER_ROW: u32 = 3;

    let (last_col, data_rows) = match build_table(rows, kind) {
        Table::List(records) => {
            for (col, header) in LIST_HEADERS.iter().enumerate() {
                worksheet.write_string_with_format(HEADER_ROW, col as u16, *header, &header_format)?;
            }

            worksheet.set_column_width(0, 8)?; // ID
            worksheet.set_column_width(1, 30)?; // Full Name
            worksheet.set_column_width(2, 8)?; // Age
            worksheet.set_column_width(3, 25)?; // Diagnosis
            worksheet.set_column_width(4, 12)?; // Date
            worksheet.set_column_width(5, 15)?; // Status

            for (idx, record) in records.iter().enumerate() {
                let row = HEADER_ROW + 1 + idx as u32;
                for (col, value) in record.iter().enumerate() {
                    worksheet.write_string(row, col as u16, value)?;
                }
            }
            ((LIST_HEADERS.len() - 1) as u16, records.len() as u32)
        }
        Table::Counts(label, counts) => {
            worksheet.write_string_with_format(HEADER_ROW, 0, label, &header_format)?;
            worksheet.write_string_with_format(HEADER_ROW, 1, COUNT_HEADER, &header_format)?;

            worksheet.set_column_width(0, 30)?;
            worksheet.set_column_width(1, 12)?;

            for (idx, (key, count)) in counts.iter().enumerate() {
                let row = HEADER_ROW + 1 + idx as u32;
                worksheet.write_string(row, 0, key)?;
                worksheet.write_number(row, 1, *count as f64)?;
            }
            (1, counts.len() as u32)
        }
    };

    // Autofilter
    if data_rows > 0 {
        worksheet.autofilter(HEADER_ROW, 0, HEADER_ROW + data_rows, last_col)?;
    }

    // Freeze generator info and header
    worksheet.set_freeze_panes(HEADER_ROW + 1, 0)?;

    Ok(workbook.save_to_buffer()?)
}

/// Build CSV text with the same layout as the Excel report.
pub fn generate_csv_report(rows: &[PatientRow], kind: ReportKind, meta: &ReportMeta) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());

    writer.write_record(["Generated by:", &format!("{} ({})", meta.generated_by, meta.role)])?;
    writer.write_record(["Date:", meta.date.as_str()])?;
    writer.write_record(None::<&[u8]>)?;

    match build_table(rows, kind) {
        Table::List(records) => {
            writer.write_record(LIST_HEADERS)?;
            for record in &records {
                writer.write_record(record)?;
            }
        }
        Table::Counts(label, counts) => {
            writer.write_record([label, COUNT_HEADER])?;
            for (key, count) in &counts {
                writer.write_record([key.as_str(), &count.to_string()])?;
            }
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| crate::error::AppError::export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| crate::error::AppError::export(e.to_string()))
}

/// Generate a report in the given format as bytes ready to write.
pub fn generate_report(rows: &[PatientRow], kind: ReportKind, meta: &ReportMeta, format: ReportFormat) -> Result<Vec<u8>> {
    match format {
        ReportFormat::Excel => generate_excel_report(rows, kind, meta),
        ReportFormat::Csv => generate_csv_report(rows, kind, meta).map(String::into_bytes),
    }
}

/// `medical_report_<title>_<date>.<ext>` with the title reduced to
/// alphanumerics, `-` and `_`.
pub fn report_filename(kind: ReportKind, format: ReportFormat, date: NaiveDate) -> String {
    let title: String = kind
        .title()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .replace(' ', "_");

    format!(
        "medical_report_{title}_{date}.{ext}",
        date = date.format("%Y-%m-%d"),
        ext = format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u32, age: &str, diagnosis: &str) -> PatientRow {
        PatientRow {
            id: id.to_string(),
            name: format!("Patient {id}"),
            age: age.to_string(),
            diagnosis: diagnosis.to_string(),
            date: "2024-03-27".to_string(),
            status: "In treatment".to_string(),
        }
    }

    fn meta() -> ReportMeta {
        ReportMeta {
            generated_by: "Ivan Petrov".to_string(),
            role: "Doctor".to_string(),
            date: "2024-03-27".to_string(),
        }
    }

    fn parse_csv(text: &str) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect::<Vec<_>>())
            .filter(|r| r.iter().any(|f| !f.is_empty()))
            .collect()
    }

    #[test]
    fn test_age_bucket_boundaries() {
        assert_eq!(age_bucket("0"), Some(AgeBucket::UpTo18));
        assert_eq!(age_bucket("18"), Some(AgeBucket::UpTo18));
        assert_eq!(age_bucket("19"), Some(AgeBucket::From19To30));
        assert_eq!(age_bucket("30"), Some(AgeBucket::From19To30));
        assert_eq!(age_bucket("31"), Some(AgeBucket::From31To45));
        assert_eq!(age_bucket("45"), Some(AgeBucket::From31To45));
        assert_eq!(age_bucket("46"), Some(AgeBucket::From46To60));
        assert_eq!(age_bucket("60"), Some(AgeBucket::From46To60));
        assert_eq!(age_bucket("61"), Some(AgeBucket::Over60));
        assert_eq!(age_bucket(" 42 "), Some(AgeBucket::From31To45));
    }

    #[test]
    fn test_non_numeric_ages_skipped() {
        assert_eq!(age_bucket(""), None);
        assert_eq!(age_bucket("forty"), None);
        assert_eq!(age_bucket("45.5"), None);

        let rows = vec![row(1, "12", "Flu"), row(2, "abc", "Flu"), row(3, "", "Flu"), row(4, "71", "Flu")];
        let counts = age_group_counts(&rows);
        assert_eq!(counts.len(), 5);
        assert_eq!(counts.iter().map(|(_, c)| c).sum::<usize>(), 2);
        assert_eq!(counts[0], (AgeBucket::UpTo18, 1));
        assert_eq!(counts[4], (AgeBucket::Over60, 1));
    }

    #[test]
    fn test_diagnosis_counts_keep_first_seen_order() {
        let rows = vec![
            row(1, "45", "Flu"),
            row(2, "32", "Bronchitis"),
            row(3, "28", "Flu"),
            row(4, "52", "Pneumonia"),
            row(5, "41", "Bronchitis"),
        ];
        assert_eq!(
            diagnosis_counts(&rows),
            vec![
                ("Flu".to_string(), 2),
                ("Bronchitis".to_string(), 2),
                ("Pneumonia".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_csv_patient_list() {
        let rows = vec![row(1, "45", "Flu"), row(2, "32", "Cold")];
        let text = generate_csv_report(&rows, ReportKind::PatientList, &meta()).unwrap();
        let records = parse_csv(&text);

        assert_eq!(records[0], vec!["Generated by:", "Ivan Petrov (Doctor)"]);
        assert_eq!(records[1], vec!["Date:", "2024-03-27"]);
        assert_eq!(records[2], LIST_HEADERS.to_vec());
        assert_eq!(records[3], vec!["1", "Patient 1", "45", "Flu", "2024-03-27", "In treatment"]);
        assert_eq!(records[4], vec!["2", "Patient 2", "32", "Cold", "2024-03-27", "In treatment"]);
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_csv_separator_is_a_bare_line() {
        let text = generate_csv_report(&[], ReportKind::PatientList, &meta()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("ID,"));
    }

    #[test]
    fn test_csv_age_groups_list_all_buckets() {
        let rows = vec![row(1, "45", "Flu"), row(2, "n/a", "Flu")];
        let text = generate_csv_report(&rows, ReportKind::ByAgeGroup, &meta()).unwrap();
        let records = parse_csv(&text);

        assert_eq!(records[2], vec!["Age Group", "Patients"]);
        let body: Vec<_> = records[3..].iter().map(|r| (r[0].as_str(), r[1].as_str())).collect();
        assert_eq!(
            body,
            vec![("0-18", "0"), ("19-30", "0"), ("31-45", "1"), ("46-60", "0"), ("60+", "0")]
        );
    }

    #[test]
    fn test_csv_quotes_commas() {
        let rows = vec![row(1, "45", "Flu, complicated")];
        let text = generate_csv_report(&rows, ReportKind::ByDiagnosis, &meta()).unwrap();
        assert!(text.contains("\"Flu, complicated\""));
        assert_eq!(parse_csv(&text)[3], vec!["Flu, complicated", "1"]);
    }

    #[test]
    fn test_excel_report_is_xlsx() {
        let rows = vec![row(1, "45", "Flu")];
        for kind in ReportKind::ALL {
            let bytes = generate_excel_report(&rows, kind, &meta()).unwrap();
            assert!(bytes.starts_with(b"PK"));
        }
    }

    #[test]
    fn test_generate_report_dispatches_on_format() {
        let rows = vec![row(1, "45", "Flu")];
        let csv = generate_report(&rows, ReportKind::ByDiagnosis, &meta(), ReportFormat::Csv).unwrap();
        assert!(String::from_utf8(csv).unwrap().starts_with("Generated by:"));
    }

    #[test]
    fn test_report_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 27).unwrap();
        assert_eq!(
            report_filename(ReportKind::ByAgeGroup, ReportFormat::Csv, date),
            "medical_report_Statistics_by_age_group_2024-03-27.csv"
        );
        assert_eq!(
            report_filename(ReportKind::PatientList, ReportFormat::Excel, date),
            "medical_report_Patient_list_2024-03-27.xlsx"
        );
    }
}
