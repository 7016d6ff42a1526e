//! Analysis result queries for viewing, export and mailing.

use chrono::NaiveDate;
use sea_orm::*;

use crate::entities::{analysis_results, analysis_types, prelude::*};
use crate::models::analysis::{AnalysisFilter, AnalysisResultRow, AnalysisStatus};

const RESULT_SELECT: &str = r#"
    SELECT ar.id, ar.result_date, ar.patient_id, p.full_name AS patient_name,
           p.email AS patient_email, p.birth_date, p.gender, p.phone,
           ar.analysis_type_id, at.name AS analysis_type, ar.result_data, ar.status,
           COALESCE(u.full_name, '') AS lab_technician, at.parameters
    FROM analysis_results ar
    JOIN patients p ON ar.patient_id = p.id
    JOIN analysis_types at ON ar.analysis_type_id = at.id
    LEFT JOIN users u ON ar.lab_user_id = u.id
"#;

/// List results matching `filter`, newest first.
pub async fn list_results(db: &DatabaseConnection, filter: &AnalysisFilter) -> Result<Vec<AnalysisResultRow>, DbErr> {
    let mut sql = format!("{RESULT_SELECT} WHERE 1 = 1");
    let mut values: Vec<Value> = Vec::new();

    if let Some(patient_id) = filter.patient_id {
        sql.push_str(" AND ar.patient_id = ?");
        values.push(patient_id.into());
    }
    if let Some(type_id) = filter.analysis_type_id {
        sql.push_str(" AND ar.analysis_type_id = ?");
        values.push(type_id.into());
    }
    if let Some(from) = filter.from_date {
        sql.push_str(" AND ar.result_date >= ?");
        values.push(from.into());
    }
    if let Some(to) = filter.to_date {
        sql.push_str(" AND ar.result_date <= ?");
        values.push(to.into());
    }
    if let Some(status) = filter.status {
        sql.push_str(" AND ar.status = ?");
        values.push(status.code().into());
    }
    sql.push_str(" ORDER BY ar.result_date DESC, ar.id DESC");

    AnalysisResultRow::find_by_statement(Statement::from_sql_and_values(DbBackend::Sqlite, sql, values))
        .all(db)
        .await
}

/// Get one joined result by ID.
pub async fn get_result(db: &DatabaseConnection, id: i32) -> Result<Option<AnalysisResultRow>, DbErr> {
    AnalysisResultRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Sqlite,
        format!("{RESULT_SELECT} WHERE ar.id = ?"),
        [id.into()],
    ))
    .one(db)
    .await
}

/// List analysis types ordered by name.
pub async fn list_types(db: &DatabaseConnection) -> Result<Vec<analysis_types::Model>, DbErr> {
    AnalysisTypes::find()
        .order_by_asc(analysis_types::Column::Name)
        .all(db)
        .await
}

/// Create an analysis type.
pub async fn create_type(
    db: &DatabaseConnection,
    name: &str,
    parameters: Option<&str>,
) -> Result<analysis_types::Model, DbErr> {
    analysis_types::ActiveModel {
        name: Set(name.to_string()),
        parameters: Set(parameters.map(str::to_string)),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Record a result.
pub async fn create_result(
    db: &DatabaseConnection,
    patient_id: i32,
    analysis_type_id: i32,
    lab_user_id: i32,
    result_date: NaiveDate,
    result_data: Option<String>,
    status: AnalysisStatus,
) -> Result<analysis_results::Model, DbErr> {
    analysis_results::ActiveModel {
        patient_id: Set(patient_id),
        analysis_type_id: Set(analysis_type_id),
        lab_user_id: Set(lab_user_id),
        result_date: Set(result_date),
        result_data: Set(result_data),
        status: Set(status.code().to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Set the status of a result. Returns false when it does not exist.
pub async fn set_status(db: &DatabaseConnection, id: i32, status: AnalysisStatus) -> Result<bool, DbErr> {
    let Some(model) = AnalysisResults::find_by_id(id).one(db).await? else {
        return Ok(false);
    };

    let mut active: analysis_results::ActiveModel = model.into();
    active.status = Set(status.code().to_string());
    active.update(db).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{patient, test_support};
    use crate::models::patient::{CreatePatient, status};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn seed(db: &DatabaseConnection) -> (i32, i32) {
        let patient = patient::create(
            db,
            CreatePatient {
                full_name: "Ivan Ivanov".to_string(),
                birth_date: None,
                gender: None,
                phone: None,
                email: Some("ivan@example.com".to_string()),
                address: None,
                diagnosis: "Anemia".to_string(),
                status: status::IN_TREATMENT.to_string(),
                admitted_on: date(1),
            },
        )
        .await
        .unwrap();
        let blood = create_type(db, "Complete blood count", Some("Hemoglobin,ESR"))
            .await
            .unwrap();
        (patient.id, blood.id)
    }

    #[tokio::test]
    async fn test_list_results_with_filters() {
        let (_dir, db) = test_support::open().await;
        let (patient_id, type_id) = seed(&db).await;

        create_result(&db, patient_id, type_id, 1, date(5), Some(r#"{"ESR": "10"}"#.to_string()), AnalysisStatus::Completed)
            .await
            .unwrap();
        create_result(&db, patient_id, type_id, 1, date(20), None, AnalysisStatus::Pending)
            .await
            .unwrap();

        let all = list_results(&db, &AnalysisFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].result_date, date(20));
        assert_eq!(all[0].patient_name, "Ivan Ivanov");
        assert_eq!(all[0].lab_technician, "");
        assert_eq!(all[1].parameters.as_deref(), Some("Hemoglobin,ESR"));

        let filter = AnalysisFilter {
            from_date: Some(date(1)),
            to_date: Some(date(10)),
            ..Default::default()
        };
        assert_eq!(list_results(&db, &filter).await.unwrap().len(), 1);

        let filter = AnalysisFilter {
            status: Some(AnalysisStatus::Pending),
            patient_id: Some(patient_id),
            ..Default::default()
        };
        let pending = list_results(&db, &filter).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].result_date, date(20));
    }

    #[tokio::test]
    async fn test_mark_sent() {
        let (_dir, db) = test_support::open().await;
        let (patient_id, type_id) = seed(&db).await;
        let result = create_result(&db, patient_id, type_id, 1, date(5), None, AnalysisStatus::Completed)
            .await
            .unwrap();

        assert!(set_status(&db, result.id, AnalysisStatus::Sent).await.unwrap());
        assert!(!set_status(&db, 999, AnalysisStatus::Sent).await.unwrap());

        let row = get_result(&db, result.id).await.unwrap().unwrap();
        assert_eq!(row.status, "sent");
        assert_eq!(row.patient_email.as_deref(), Some("ivan@example.com"));
    }
}
