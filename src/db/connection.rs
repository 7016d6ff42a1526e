//! Database connection pool and utility functions.

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, PaginatorTrait};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Create a new database connection with configured pool settings.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt).await
}

/// Test database connection by executing a simple query.
pub async fn test_connection(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared("SELECT 1").await?;
    Ok(())
}

/// Get record counts for the main tables.
pub async fn get_table_counts(db: &DatabaseConnection) -> Result<TableCounts, DbErr> {
    use crate::entities::prelude::*;
    use sea_orm::EntityTrait;

    let users = Users::find().count(db).await?;
    let patients = Patients::find().count(db).await?;
    let analysis_results = AnalysisResults::find().count(db).await?;
    let appointments = Appointments::find().count(db).await?;

    Ok(TableCounts {
        users,
        patients,
        analysis_results,
        appointments,
    })
}

/// Table record counts.
#[derive(Debug, Clone, Default)]
pub struct TableCounts {
    pub users: u64,
    pub patients: u64,
    pub analysis_results: u64,
    pub appointments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support;

    #[tokio::test]
    async fn test_counts_on_empty_database() {
        let (_dir, db) = test_support::open().await;
        test_connection(&db).await.unwrap();

        let counts = get_table_counts(&db).await.unwrap();
        assert_eq!(counts.users, 0);
        assert_eq!(counts.patients, 0);
        assert_eq!(counts.analysis_results, 0);
    }
}
