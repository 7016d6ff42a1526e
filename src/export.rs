//! Word export of analysis results and created documents.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Run, Table, TableCell, TableRow};
use tempfile::TempDir;

use crate::documents::{Document, field_label};
use crate::error::{AppError, Result};
use crate::models::analysis::{AnalysisResultRow, ResultData, status_label};
use crate::reference::{REPORT_UNKNOWN_RANGE, reference_range};

const NOT_SPECIFIED: &str = "Not specified";
const NO_RESULT_DATA: &str = "No result data.";

/// What the results section of a report shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSection {
    /// Parameter, value and reference range per row.
    Table(Vec<[String; 3]>),
    /// Payload that is not a JSON object.
    Text(String),
    Empty,
}

/// Results section for a row, in declared parameter order.
pub fn result_section(row: &AnalysisResultRow) -> ResultSection {
    match row.data() {
        ResultData::Empty => ResultSection::Empty,
        ResultData::Text(text) => ResultSection::Text(text),
        data @ ResultData::Table(_) => {
            let rows: Vec<[String; 3]> = data
                .ordered(row.parameters.as_deref())
                .into_iter()
                .map(|(param, value)| {
                    let range = reference_range(&param).unwrap_or(REPORT_UNKNOWN_RANGE).to_string();
                    [param, value, range]
                })
                .collect();
            if rows.is_empty() {
                ResultSection::Empty
            } else {
                ResultSection::Table(rows)
            }
        }
    }
}

/// Label/value pairs describing the patient.
pub fn patient_fields(row: &AnalysisResultRow) -> Vec<(&'static str, String)> {
    let or_unknown = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(NOT_SPECIFIED)
            .to_string()
    };

    vec![
        ("Patient:", row.patient_name.clone()),
        (
            "Birth date:",
            row.birth_date
                .map(|d| d.format("%d.%m.%Y").to_string())
                .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
        ),
        ("Gender:", or_unknown(row.gender.as_deref())),
        ("Phone:", or_unknown(row.phone.as_deref())),
        ("Analysis date:", row.result_date.format("%d.%m.%Y").to_string()),
    ]
}

fn text(value: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(value))
}

fn heading(value: &str, size: usize) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(value).bold().size(size))
}

fn labelled(label: &str, value: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(format!("{label} ")).bold())
        .add_run(Run::new().add_text(value))
}

fn cell(value: &str) -> TableCell {
    TableCell::new().add_paragraph(text(value))
}

fn header_cell(value: &str) -> TableCell {
    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(value).bold()))
}

fn two_column_table(pairs: &[(&str, String)]) -> Table {
    Table::new(
        pairs
            .iter()
            .map(|(label, value)| TableRow::new(vec![cell(label), cell(value)]))
            .collect(),
    )
}

fn add_result_section(mut docx: Docx, row: &AnalysisResultRow) -> Docx {
    match result_section(row) {
        ResultSection::Table(rows) => {
            let mut table_rows = vec![TableRow::new(vec![
                header_cell("Parameter"),
                header_cell("Value"),
                header_cell("Reference range"),
            ])];
            table_rows.extend(
                rows.iter()
                    .map(|[param, value, range]| TableRow::new(vec![cell(param), cell(value), cell(range)])),
            );
            docx = docx.add_table(Table::new(table_rows));
        }
        ResultSection::Text(value) => {
            docx = docx.add_paragraph(labelled("Result:", &value));
        }
        ResultSection::Empty => {
            docx = docx.add_paragraph(text(NO_RESULT_DATA));
        }
    }
    docx
}

fn pack(docx: Docx) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| AppError::export(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Render a single analysis result as a Word document.
pub fn render_result_docx(row: &AnalysisResultRow, today: NaiveDate) -> Result<Vec<u8>> {
    let mut docx = Docx::new()
        .add_paragraph(heading("ANALYSIS RESULT", 32).align(AlignmentType::Center))
        .add_paragraph(heading("Patient information", 28))
        .add_table(two_column_table(&patient_fields(row)))
        .add_paragraph(heading(&format!("Analysis: {}", row.analysis_type), 28));

    docx = add_result_section(docx, row);

    docx = docx
        .add_paragraph(text(""))
        .add_paragraph(text(&format!("Lab technician: {}", row.lab_technician)))
        .add_paragraph(text(&format!("Date: {}", today.format("%d.%m.%Y"))));

    pack(docx)
}

/// Render several results, one page each, under a summary header.
pub fn render_results_docx(rows: &[AnalysisResultRow], generated_at: NaiveDateTime) -> Result<Vec<u8>> {
    let mut docx = Docx::new()
        .add_paragraph(heading("ANALYSIS RESULTS REPORT", 32).align(AlignmentType::Center))
        .add_paragraph(text(&format!(
            "Generated: {}",
            generated_at.format("%d.%m.%Y %H:%M")
        )))
        .add_paragraph(text(&format!("Number of results: {}", rows.len())));

    for (idx, row) in rows.iter().enumerate() {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        docx = docx.add_paragraph(heading(
            &format!("Analysis #{}: {}", idx + 1, row.analysis_type),
            28,
        ));

        for (label, value) in patient_fields(row) {
            docx = docx.add_paragraph(labelled(label, &value));
        }
        docx = docx.add_paragraph(labelled("Status:", status_label(&row.status)));

        docx = docx.add_paragraph(heading("Results", 24));
        docx = add_result_section(docx, row);
        docx = docx.add_paragraph(labelled("Lab technician:", &row.lab_technician));
    }

    pack(docx)
}

/// Render a created document: title, one line per field, author footer.
pub fn render_document_docx(document: &Document) -> Result<Vec<u8>> {
    let mut docx = Docx::new()
        .add_paragraph(heading(&document.name.to_uppercase(), 32).align(AlignmentType::Center))
        .add_paragraph(text(&format!("Created: {}", document.created_at.format("%d.%m.%Y"))));

    let fields: Vec<&str> = match document.template() {
        Some(template) => template.fields.to_vec(),
        None => document.data.keys().map(String::as_str).collect(),
    };

    let pairs: Vec<(String, String)> = fields
        .into_iter()
        .map(|field| {
            (
                format!("{}:", field_label(field)),
                document.data.get(field).cloned().unwrap_or_default(),
            )
        })
        .collect();
    let rows: Vec<(&str, String)> = pairs.iter().map(|(l, v)| (l.as_str(), v.clone())).collect();
    docx = docx.add_table(two_column_table(&rows));

    if let Some(author) = &document.created_by {
        docx = docx
            .add_paragraph(text(""))
            .add_paragraph(labelled("Created by:", author));
    }

    pack(docx)
}

/// Write a single result report to `path`.
pub fn export_result_to_docx(row: &AnalysisResultRow, path: &Path) -> Result<()> {
    let bytes = render_result_docx(row, Local::now().date_naive())?;
    std::fs::write(path, bytes)?;
    tracing::info!("Exported analysis result {} to {}", row.id, path.display());
    Ok(())
}

/// Write the report for `row` into a fresh temporary directory. The file
/// is removed when the returned directory is dropped.
pub fn export_result_to_temp(row: &AnalysisResultRow) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::Builder::new().prefix("medcenter-mail").tempdir()?;
    let path = dir.path().join(default_result_filename(row));
    export_result_to_docx(row, &path)?;
    Ok((dir, path))
}

/// Write a batch report of `rows` to `path`.
pub fn export_results_to_docx(rows: &[AnalysisResultRow], path: &Path) -> Result<()> {
    let bytes = render_results_docx(rows, Local::now().naive_local())?;
    std::fs::write(path, bytes)?;
    tracing::info!("Exported {} analysis results to {}", rows.len(), path.display());
    Ok(())
}

/// Write a created document to `path`.
pub fn export_document_to_docx(document: &Document, path: &Path) -> Result<()> {
    let bytes = render_document_docx(document)?;
    std::fs::write(path, bytes)?;
    tracing::info!("Exported document '{}' to {}", document.name, path.display());
    Ok(())
}

/// `Analysis_<type>_<patient>_<date>.docx` with path separators and
/// colons replaced by `-`.
pub fn default_result_filename(row: &AnalysisResultRow) -> String {
    format!(
        "Analysis_{}_{}_{}.docx",
        row.analysis_type, row.patient_name, row.result_date
    )
    .replace(['/', '\\', ':'], "-")
}

/// Open save file dialog and return selected path.
pub fn show_save_dialog(default_name: &str, filter_name: &str, extensions: &[&str]) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_file_name(default_name)
        .add_filter(filter_name, extensions)
        .save_file()
}

/// Generate default filename for export.
pub fn generate_export_filename(prefix: &str, extension: &str) -> String {
    let now = Local::now();
    format!("{prefix}_{ts}.{extension}", ts = now.format("%Y%m%d_%H%M"))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::documents::DocumentManager;

    fn result_row(data: Option<&str>, parameters: Option<&str>) -> AnalysisResultRow {
        AnalysisResultRow {
            id: 7,
            result_date: NaiveDate::from_ymd_opt(2024, 3, 27).unwrap(),
            patient_id: 1,
            patient_name: "Ivan Ivanov".to_string(),
            patient_email: Some("ivan@example.com".to_string()),
            birth_date: None,
            gender: Some("M".to_string()),
            phone: Some(String::new()),
            analysis_type_id: 1,
            analysis_type: "Blood test: CBC/ESR".to_string(),
            result_data: data.map(str::to_string),
            status: "completed".to_string(),
            lab_technician: "Maria Ivanova".to_string(),
            parameters: parameters.map(str::to_string),
        }
    }

    #[test]
    fn test_result_section_uses_declared_order() {
        let row = result_row(
            Some(r#"{"ESR": "10 mm/h", "Hemoglobin": "135 g/l", "Ferritin": "80"}"#),
            Some("Hemoglobin,ESR,Ferritin"),
        );
        let ResultSection::Table(rows) = result_section(&row) else {
            panic!("expected table");
        };
        assert_eq!(rows[0][0], "Hemoglobin");
        assert_eq!(rows[1], ["ESR".to_string(), "10 mm/h".to_string(), "2-15 mm/h".to_string()]);
        assert_eq!(rows[2][2], "No data");
    }

    #[test]
    fn test_result_section_text_and_empty() {
        assert_eq!(
            result_section(&result_row(Some("negative"), None)),
            ResultSection::Text("negative".to_string())
        );
        assert_eq!(result_section(&result_row(None, None)), ResultSection::Empty);
        assert_eq!(
            result_section(&result_row(Some(r#"{"A": 1}"#), Some("B"))),
            ResultSection::Empty
        );
    }

    #[test]
    fn test_patient_fields_fill_missing_values() {
        let fields = patient_fields(&result_row(None, None));
        assert_eq!(fields[1], ("Birth date:", "Not specified".to_string()));
        assert_eq!(fields[2], ("Gender:", "M".to_string()));
        assert_eq!(fields[3], ("Phone:", "Not specified".to_string()));
        assert_eq!(fields[4], ("Analysis date:", "27.03.2024".to_string()));
    }

    #[test]
    fn test_default_result_filename_sanitized() {
        assert_eq!(
            default_result_filename(&result_row(None, None)),
            "Analysis_Blood test- CBC-ESR_Ivan Ivanov_2024-03-27.docx"
        );
    }

    #[test]
    fn test_render_outputs_docx_archives() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
        let row = result_row(Some(r#"{"Glucose": "5.1"}"#), None);

        assert!(render_result_docx(&row, today).unwrap().starts_with(b"PK"));

        let generated = today.and_hms_opt(10, 30, 0).unwrap();
        let rows = vec![row.clone(), result_row(Some("negative"), None)];
        assert!(render_results_docx(&rows, generated).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_export_document_writes_file() {
        let mut manager = DocumentManager::new();
        let data = BTreeMap::from([("patient_name".to_string(), "Ivan Ivanov".to_string())]);
        let document = manager
            .create_document_on("sick_leave", data, NaiveDate::from_ymd_opt(2024, 3, 27).unwrap())
            .unwrap()
            .clone();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sick_leave.docx");
        export_document_to_docx(&document, &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"PK"));
    }

    #[test]
    fn test_temp_export_removed_with_dir() {
        let row = result_row(Some(r#"{"hemoglobin": "140"}"#), None);
        let (dir, path) = export_result_to_temp(&row).unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(std::fs::read(&path).unwrap().starts_with(b"PK"));

        drop(dir);
        assert!(!path.exists());
    }

    #[test]
    fn test_generate_export_filename() {
        let name = generate_export_filename("Analysis_report", "docx");
        assert!(name.starts_with("Analysis_report_"));
        assert!(name.ends_with(".docx"));
    }
}
