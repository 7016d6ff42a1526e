//! Analysis result view models.

use chrono::NaiveDate;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Analysis result joined with patient, type and technician, from
/// `analysis_results`.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult)]
pub struct AnalysisResultRow {
    pub id: i32,
    pub result_date: NaiveDate,
    pub patient_id: i32,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub analysis_type_id: i32,
    pub analysis_type: String,
    pub result_data: Option<String>,
    pub status: String,
    pub lab_technician: String,
    pub parameters: Option<String>,
}

impl AnalysisResultRow {
    /// Parsed result payload.
    pub fn data(&self) -> ResultData {
        ResultData::parse(self.result_data.as_deref())
    }
}

/// Filter for listing analysis results. Empty fields do not filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisFilter {
    pub patient_id: Option<i32>,
    pub analysis_type_id: Option<i32>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub status: Option<AnalysisStatus>,
}

/// Processing status of an analysis result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Cancelled,
    Sent,
}

impl AnalysisStatus {
    pub const ALL: [AnalysisStatus; 4] = [
        AnalysisStatus::Pending,
        AnalysisStatus::Completed,
        AnalysisStatus::Cancelled,
        AnalysisStatus::Sent,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Cancelled => "cancelled",
            AnalysisStatus::Sent => "sent",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "In progress",
            AnalysisStatus::Completed => "Completed",
            AnalysisStatus::Cancelled => "Cancelled",
            AnalysisStatus::Sent => "Sent",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

/// Display label for a stored status code; unknown codes pass through.
pub fn status_label(code: &str) -> &str {
    AnalysisStatus::from_code(code).map(|s| s.label()).unwrap_or(code)
}

/// Result payload of an analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    /// No data recorded.
    Empty,
    /// Parameter/value pairs in stored order.
    Table(Vec<(String, String)>),
    /// Free text, or JSON that is not an object.
    Text(String),
}

impl ResultData {
    /// Parse a stored payload. JSON objects become tables; anything that
    /// is not valid JSON is kept as text.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return ResultData::Empty;
        };

        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) if map.is_empty() => ResultData::Empty,
            Ok(Value::Object(map)) => {
                ResultData::Table(map.into_iter().map(|(k, v)| (k, value_text(&v))).collect())
            }
            Ok(Value::Null) => ResultData::Empty,
            Ok(other) => ResultData::Text(value_text(&other)),
            Err(_) => ResultData::Text(raw.to_string()),
        }
    }

    /// Table rows in the order of a comma separated parameter list,
    /// keeping only parameters that have a value. Without a list, stored
    /// order is used.
    pub fn ordered(&self, parameters: Option<&str>) -> Vec<(String, String)> {
        let ResultData::Table(pairs) = self else {
            return Vec::new();
        };

        let declared: Vec<&str> = parameters
            .map(|p| p.split(',').map(str::trim).filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        if declared.is_empty() {
            return pairs.clone();
        }

        declared
            .into_iter()
            .filter_map(|name| pairs.iter().find(|(k, _)| k == name).cloned())
            .collect()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_keeps_stored_order() {
        let data = ResultData::parse(Some(r#"{"Hemoglobin": "135 g/l", "Glucose": 5.1}"#));
        assert_eq!(
            data,
            ResultData::Table(vec![
                ("Hemoglobin".to_string(), "135 g/l".to_string()),
                ("Glucose".to_string(), "5.1".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(
            ResultData::parse(Some("negative")),
            ResultData::Text("negative".to_string())
        );
    }

    #[test]
    fn test_parse_empty_values() {
        assert_eq!(ResultData::parse(None), ResultData::Empty);
        assert_eq!(ResultData::parse(Some("  ")), ResultData::Empty);
        assert_eq!(ResultData::parse(Some("{}")), ResultData::Empty);
    }

    #[test]
    fn test_ordered_follows_declared_parameters() {
        let data = ResultData::parse(Some(r#"{"A": 1, "B": 2, "C": 3}"#));
        let rows = data.ordered(Some("C, A, Missing"));
        assert_eq!(
            rows,
            vec![("C".to_string(), "3".to_string()), ("A".to_string(), "1".to_string())]
        );
        assert_eq!(data.ordered(None).len(), 3);
        assert_eq!(data.ordered(Some(" ")).len(), 3);
    }

    #[test]
    fn test_status_label_passthrough() {
        assert_eq!(status_label("sent"), "Sent");
        assert_eq!(status_label("archived"), "archived");
    }
}
