//! MySQL-backed canonical store.
//!
//! One table per conceptual collection, each `(id, doc JSON)`;
//! services never see SQL, only the [`DocumentStore`] trait.

use sqlx::mysql::MySqlPool;

use crate::error::StoreError;
use crate::store::collections;

mod mysql;

pub use mysql::MySqlStore;

/// Connect using `DATABASE_URL` and create tables idempotently.
pub async fn init_db() -> Result<MySqlPool, sqlx::Error> {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL not set in .env file");

    let pool = MySqlPool::connect(&database_url).await?;
    create_tables(&pool).await?;

    Ok(pool)
}

/// Create all collection tables
async fn create_tables(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for collection in collections::ALL {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(64) NOT NULL PRIMARY KEY,
                doc JSON NOT NULL
            )",
            collection
        );
        sqlx::raw_sql(&sql).execute(pool).await?;
    }
    Ok(())
}

/// Map a collection name onto its table. Only known collections pass;
/// this is also what keeps table names out of caller control.
pub(crate) fn table_for(collection: &str) -> Result<&'static str, StoreError> {
    collections::ALL
        .iter()
        .find(|known| **known == collection)
        .copied()
        .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
}

/// MySQL privilege failures are the degraded-backend signal; everything
/// else is an opaque backend error.
pub(crate) fn map_sqlx_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        // 1044/1045 access denied, 1142/1143 command denied, 1227 missing privilege
        if matches!(
            db.code().as_deref(),
            Some("1044") | Some("1045") | Some("1142") | Some("1143") | Some("1227")
        ) {
            return StoreError::PermissionDenied(db.message().to_string());
        }
    }
    if matches!(e, sqlx::Error::RowNotFound) {
        return StoreError::NotFound(e.to_string());
    }
    StoreError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_for_rejects_unknown_collections() {
        assert!(table_for("users").is_ok());
        assert!(matches!(
            table_for("users; DROP TABLE users"),
            Err(StoreError::UnknownCollection(_))
        ));
    }
}
