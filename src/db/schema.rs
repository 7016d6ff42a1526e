//! Schema bootstrap for the clinic database.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Statement};

const CREATE_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        full_name TEXT NOT NULL,
        email TEXT,
        role TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        last_login DATE
    )",
    "CREATE TABLE IF NOT EXISTS doctors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        specialization TEXT
    )",
    "CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        full_name TEXT NOT NULL,
        birth_date DATE,
        gender TEXT,
        phone TEXT,
        email TEXT,
        address TEXT,
        diagnosis TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'In treatment',
        admitted_on DATE NOT NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS analysis_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        parameters TEXT
    )",
    "CREATE TABLE IF NOT EXISTS analysis_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
        analysis_type_id INTEGER NOT NULL REFERENCES analysis_types(id),
        lab_user_id INTEGER NOT NULL,
        result_date DATE NOT NULL,
        result_data TEXT,
        status TEXT NOT NULL DEFAULT 'pending'
    )",
    "CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
        doctor_id INTEGER NOT NULL,
        appointment_date DATETIME NOT NULL,
        status TEXT NOT NULL DEFAULT 'scheduled'
    )",
    "CREATE INDEX IF NOT EXISTS idx_analysis_results_date ON analysis_results(result_date)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(appointment_date)",
];

/// Create missing tables and upgrade older databases in place.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in CREATE_TABLES {
        db.execute_unprepared(sql).await?;
    }

    // Databases created before gender was recorded lack the column.
    if !column_exists(db, "patients", "gender").await? {
        tracing::info!("Adding missing column patients.gender");
        db.execute_unprepared("ALTER TABLE patients ADD COLUMN gender TEXT").await?;
    }

    Ok(())
}

/// Whether `table` has a column named `column`.
pub async fn column_exists(db: &DatabaseConnection, table: &str, column: &str) -> Result<bool, DbErr> {
    let rows = db
        .query_all(Statement::from_string(
            DbBackend::Sqlite,
            format!("PRAGMA table_info({table})"),
        ))
        .await?;

    for row in rows {
        let name: String = row.try_get("", "name")?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
