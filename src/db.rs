//! Database connection, schema bootstrap and repositories.

pub mod analysis;
pub mod connection;
pub mod patient;
pub mod schema;
pub mod stats;
pub mod user;

pub use connection::{TableCounts, connect, get_table_counts, test_connection};
pub use schema::ensure_schema;

#[cfg(test)]
pub(crate) mod test_support {
    use sea_orm::DatabaseConnection;
    use tempfile::TempDir;

    /// Fresh database file with the schema applied. Keep the `TempDir`
    /// alive for as long as the connection is used.
    pub async fn open() -> (TempDir, DatabaseConnection) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let db = super::connect(&url).await.unwrap();
        super::ensure_schema(&db).await.unwrap();
        (dir, db)
    }
}
