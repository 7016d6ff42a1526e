//! Patient DTOs and the flattened row used by reports.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::entities::patients;

/// Treatment status shown in the patient list.
pub mod status {
    pub const IN_TREATMENT: &str = "In treatment";
    pub const DISCHARGED: &str = "Discharged";

    pub const ALL: [&str; 2] = [IN_TREATMENT, DISCHARGED];
}

/// DTO for creating a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatient {
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub diagnosis: String,
    pub status: String,
    pub admitted_on: NaiveDate,
}

/// DTO for updating a patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatient {
    pub full_name: Option<String>,
    pub birth_date: Option<Option<NaiveDate>>,
    pub gender: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub diagnosis: Option<String>,
    pub status: Option<String>,
}

/// One row of report input.
///
/// Age is kept as text: rows may come from hand-edited sources and
/// report aggregation skips values that are not whole numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRow {
    pub id: String,
    pub name: String,
    pub age: String,
    pub diagnosis: String,
    pub date: String,
    pub status: String,
}

impl PatientRow {
    /// Flatten a stored patient, computing age on `today`.
    pub fn from_model(patient: &patients::Model, today: NaiveDate) -> Self {
        Self {
            id: patient.id.to_string(),
            name: patient.full_name.clone(),
            age: patient
                .birth_date
                .map(|birth| age_on(birth, today).to_string())
                .unwrap_or_default(),
            diagnosis: patient.diagnosis.clone(),
            date: patient.admitted_on.format("%Y-%m-%d").to_string(),
            status: patient.status.clone(),
        }
    }
}

/// Full years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        assert_eq!(age_on(date(1980, 6, 15), date(2024, 6, 14)), 43);
        assert_eq!(age_on(date(1980, 6, 15), date(2024, 6, 15)), 44);
    }

    #[test]
    fn test_row_without_birth_date_has_empty_age() {
        let model = patients::Model {
            id: 7,
            full_name: "Anna Petrova".to_string(),
            birth_date: None,
            gender: None,
            phone: None,
            email: None,
            address: None,
            diagnosis: "Flu".to_string(),
            status: status::IN_TREATMENT.to_string(),
            admitted_on: date(2024, 3, 26),
            created_at: date(2024, 3, 26).and_hms_opt(9, 0, 0).unwrap(),
        };

        let row = PatientRow::from_model(&model, date(2024, 4, 1));
        assert_eq!(row.id, "7");
        assert_eq!(row.age, "");
        assert_eq!(row.date, "2024-03-26");
    }
}
