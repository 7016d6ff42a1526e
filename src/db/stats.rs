//! Aggregate counts for the administrator's statistics view.

use chrono::NaiveDate;
use sea_orm::*;

use crate::models::user::Role;

/// Count for one group.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, FromQueryResult)]
struct Total {
    count: i64,
}

/// Counts over a date range, both ends inclusive.
#[derive(Debug, Clone, Default)]
pub struct SystemStatistics {
    pub users_by_role: Vec<LabelCount>,
    pub total_patients: i64,
    pub new_patients: i64,
    pub total_analyses: i64,
    pub analyses_by_type: Vec<LabelCount>,
    pub total_appointments: i64,
    pub appointments_by_status: Vec<LabelCount>,
}

/// Display label for an appointment status code.
pub fn appointment_status_label(code: &str) -> &str {
    match code {
        "scheduled" => "Scheduled",
        "completed" => "Completed",
        "cancelled" => "Cancelled",
        other => other,
    }
}

async fn total(db: &DatabaseConnection, sql: &str, values: Vec<Value>) -> Result<i64, DbErr> {
    let row = Total::find_by_statement(Statement::from_sql_and_values(DbBackend::Sqlite, sql, values))
        .one(db)
        .await?;
    Ok(row.map(|r| r.count).unwrap_or(0))
}

async fn grouped(db: &DatabaseConnection, sql: &str, values: Vec<Value>) -> Result<Vec<LabelCount>, DbErr> {
    LabelCount::find_by_statement(Statement::from_sql_and_values(DbBackend::Sqlite, sql, values))
        .all(db)
        .await
}

/// Collect all statistics for `from..=to`.
pub async fn collect(db: &DatabaseConnection, from: NaiveDate, to: NaiveDate) -> Result<SystemStatistics, DbErr> {
    let range = || vec![Value::from(from), Value::from(to)];

    let mut users_by_role = grouped(
        db,
        "SELECT role AS label, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
        vec![],
    )
    .await?;
    for entry in &mut users_by_role {
        if let Ok(role) = entry.label.parse::<Role>() {
            entry.label = role.display_name().to_string();
        }
    }

    let total_patients = total(db, "SELECT COUNT(*) AS count FROM patients", vec![]).await?;
    let new_patients = total(
        db,
        "SELECT COUNT(*) AS count FROM patients WHERE date(created_at) BETWEEN ? AND ?",
        range(),
    )
    .await?;

    let total_analyses = total(
        db,
        "SELECT COUNT(*) AS count FROM analysis_results WHERE date(result_date) BETWEEN ? AND ?",
        range(),
    )
    .await?;
    let analyses_by_type = grouped(
        db,
        "SELECT at.name AS label, COUNT(ar.id) AS count
         FROM analysis_results ar
         JOIN analysis_types at ON ar.analysis_type_id = at.id
         WHERE date(ar.result_date) BETWEEN ? AND ?
         GROUP BY at.name
         ORDER BY count DESC, at.name",
        range(),
    )
    .await?;

    let total_appointments = total(
        db,
        "SELECT COUNT(*) AS count FROM appointments WHERE date(appointment_date) BETWEEN ? AND ?",
        range(),
    )
    .await?;
    let mut appointments_by_status = grouped(
        db,
        "SELECT status AS label, COUNT(*) AS count
         FROM appointments
         WHERE date(appointment_date) BETWEEN ? AND ?
         GROUP BY status
         ORDER BY status",
        range(),
    )
    .await?;
    for entry in &mut appointments_by_status {
        entry.label = appointment_status_label(&entry.label).to_string();
    }

    Ok(SystemStatistics {
        users_by_role,
        total_patients,
        new_patients,
        total_analyses,
        analyses_by_type,
        total_appointments,
        appointments_by_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{analysis, test_support, user};
    use crate::models::analysis::AnalysisStatus;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_collect_statistics() {
        let (_dir, db) = test_support::open().await;
        user::seed_defaults_if_empty(&db).await.unwrap();

        db.execute_unprepared(
            "INSERT INTO patients (full_name, diagnosis, status, admitted_on, created_at) VALUES
             ('Ivan Ivanov', 'Flu', 'In treatment', '2024-03-01', '2024-03-01 09:00:00'),
             ('Petr Petrov', 'Cold', 'In treatment', '2024-01-10', '2024-01-10 09:00:00')",
        )
        .await
        .unwrap();
        db.execute_unprepared(
            "INSERT INTO appointments (patient_id, doctor_id, appointment_date, status) VALUES
             (1, 1, '2024-03-05 10:00:00', 'scheduled'),
             (1, 1, '2024-03-06 10:00:00', 'completed'),
             (2, 1, '2024-02-01 10:00:00', 'completed')",
        )
        .await
        .unwrap();

        let blood = analysis::create_type(&db, "Blood", None).await.unwrap();
        let urine = analysis::create_type(&db, "Urine", None).await.unwrap();
        for (type_id, day) in [(blood.id, 2), (blood.id, 3), (urine.id, 4)] {
            analysis::create_result(&db, 1, type_id, 3, date(3, day), None, AnalysisStatus::Completed)
                .await
                .unwrap();
        }

        let stats = collect(&db, date(3, 1), date(3, 31)).await.unwrap();

        assert_eq!(stats.users_by_role.len(), 3);
        assert!(stats.users_by_role.iter().any(|e| e.label == "Administrator" && e.count == 1));
        assert_eq!(stats.total_patients, 2);
        assert_eq!(stats.new_patients, 1);
        assert_eq!(stats.total_analyses, 3);
        assert_eq!(
            stats.analyses_by_type[0],
            LabelCount {
                label: "Blood".to_string(),
                count: 2
            }
        );
        assert_eq!(stats.total_appointments, 2);
        let labels: Vec<_> = stats.appointments_by_status.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Completed", "Scheduled"]);
    }

    #[test]
    fn test_appointment_status_label() {
        assert_eq!(appointment_status_label("cancelled"), "Cancelled");
        assert_eq!(appointment_status_label("no_show"), "no_show");
    }
}
