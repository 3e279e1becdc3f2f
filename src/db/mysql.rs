use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::store::{DocumentStore, StoreEvent, WriteOp};

use super::{map_sqlx_err, table_for};

/// Canonical store over MySQL. The change feed reflects writes made
/// through this instance; there is no cross-process feed at this layer.
pub struct MySqlStore {
    pool: MySqlPool,
    feeds: Mutex<HashMap<String, broadcast::Sender<StoreEvent>>>,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            feeds: Mutex::new(HashMap::new()),
        }
    }

    fn emit(&self, collection: &str, id: &str, deleted: bool) {
        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = feeds.get(collection) {
            let _ = tx.send(StoreEvent {
                collection: collection.to_string(),
                id: id.to_string(),
                deleted,
            });
        }
    }
}

async fn exec_set<'e, E>(executor: E, table: &str, id: &str, doc: &Value) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!(
        "INSERT INTO {} (id, doc) VALUES (?, ?) ON DUPLICATE KEY UPDATE doc = VALUES(doc)",
        table
    );
    sqlx::query(&sql)
        .bind(id)
        .bind(doc.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

async fn exec_update<'e, E>(
    executor: E,
    table: &str,
    id: &str,
    patch: &Value,
) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!(
        "UPDATE {} SET doc = JSON_MERGE_PATCH(doc, ?) WHERE id = ?",
        table
    );
    let result = sqlx::query(&sql)
        .bind(patch.to_string())
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

async fn exec_exists<'e, E>(executor: E, table: &str, id: &str) -> Result<bool, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    Ok(row.is_some())
}

async fn exec_delete<'e, E>(executor: E, table: &str, id: &str) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("DELETE FROM {} WHERE id = ?", table);
    sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for MySqlStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let table = table_for(collection)?;
        let sql = format!("SELECT CAST(doc AS CHAR) AS doc FROM {} WHERE id = ?", table);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        match row {
            Some(row) => {
                let raw: String = row.get("doc");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let table = table_for(collection)?;
        exec_set(&self.pool, table, id, &doc)
            .await
            .map_err(map_sqlx_err)?;
        self.emit(collection, id, false);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let table = table_for(collection)?;
        if !exec_exists(&self.pool, table, id)
            .await
            .map_err(map_sqlx_err)?
        {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }
        exec_update(&self.pool, table, id, &patch)
            .await
            .map_err(map_sqlx_err)?;
        self.emit(collection, id, false);
        Ok(())
    }

    async fn update_if_eq(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &str,
        patch: Value,
    ) -> Result<bool, StoreError> {
        let table = table_for(collection)?;
        let sql = format!(
            "UPDATE {} SET doc = JSON_MERGE_PATCH(doc, ?) \
             WHERE id = ? AND JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) = ?",
            table
        );
        let result = sqlx::query(&sql)
            .bind(patch.to_string())
            .bind(id)
            .bind(format!("$.{}", field))
            .bind(expected)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() > 0 {
            self.emit(collection, id, false);
            return Ok(true);
        }
        if !exec_exists(&self.pool, table, id)
            .await
            .map_err(map_sqlx_err)?
        {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }
        Ok(false)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let table = table_for(collection)?;
        exec_delete(&self.pool, table, id)
            .await
            .map_err(map_sqlx_err)?;
        self.emit(collection, id, true);
        Ok(())
    }

    async fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let table = table_for(collection)?;
        let expected = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let sql = format!(
            "SELECT id, CAST(doc AS CHAR) AS doc FROM {} \
             WHERE JSON_UNQUOTE(JSON_EXTRACT(doc, ?)) = ?",
            table
        );
        let rows = sqlx::query(&sql)
            .bind(format!("$.{}", field))
            .bind(expected)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let raw: String = row.get("doc");
            hits.push((id, serde_json::from_str(&raw)?));
        }
        Ok(hits)
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        for op in &ops {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    doc,
                } => {
                    let table = table_for(collection)?;
                    exec_set(&mut *tx, table, id, doc)
                        .await
                        .map_err(map_sqlx_err)?;
                }
                WriteOp::Update {
                    collection,
                    id,
                    patch,
                } => {
                    let table = table_for(collection)?;
                    if !exec_exists(&mut *tx, table, id)
                        .await
                        .map_err(map_sqlx_err)?
                    {
                        return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
                    }
                    exec_update(&mut *tx, table, id, patch)
                        .await
                        .map_err(map_sqlx_err)?;
                }
                WriteOp::Delete { collection, id } => {
                    let table = table_for(collection)?;
                    exec_delete(&mut *tx, table, id)
                        .await
                        .map_err(map_sqlx_err)?;
                }
            }
        }

        tx.commit().await.map_err(map_sqlx_err)?;

        for op in &ops {
            match op {
                WriteOp::Set { collection, id, .. } | WriteOp::Update { collection, id, .. } => {
                    self.emit(collection, id, false)
                }
                WriteOp::Delete { collection, id } => self.emit(collection, id, true),
            }
        }
        Ok(())
    }

    fn watch(&self, collection: &str) -> broadcast::Receiver<StoreEvent> {
        let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        feeds
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .subscribe()
    }
}
