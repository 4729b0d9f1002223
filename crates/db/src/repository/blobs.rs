//! Key-value blob repository functions.

use chrono::Utc;

use crate::{models::BlobRow, DbError, DbPool};

/// Insert or overwrite the blob stored under `key`.
pub async fn put_blob(pool: &DbPool, key: &str, data: &str) -> Result<BlobRow, DbError> {
    let now = Utc::now().timestamp_millis();

    let row = sqlx::query_as::<_, BlobRow>(
        r#"
        INSERT INTO workflow_blobs (key, data, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
        RETURNING key, data, updated_at
        "#,
    )
    .bind(key)
    .bind(data)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch the blob stored under `key`, if any.
pub async fn get_blob(pool: &DbPool, key: &str) -> Result<Option<BlobRow>, DbError> {
    let row = sqlx::query_as::<_, BlobRow>(
        r#"SELECT key, data, updated_at FROM workflow_blobs WHERE key = ?1"#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Delete the blob stored under `key`.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_blob(pool: &DbPool, key: &str) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM workflow_blobs WHERE key = ?1")
        .bind(key)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}

/// Return every key starting with `prefix`, sorted ascending.
pub async fn list_keys(pool: &DbPool, prefix: &str) -> Result<Vec<String>, DbError> {
    let keys = sqlx::query_scalar::<_, String>(
        r#"
        SELECT key FROM workflow_blobs
        WHERE substr(key, 1, length(?1)) = ?1
        ORDER BY key ASC
        "#,
    )
    .bind(prefix)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Length in bytes of the blob stored under `key`, or 0 when absent.
pub async fn blob_size(pool: &DbPool, key: &str) -> Result<u64, DbError> {
    let size = sqlx::query_scalar::<_, i64>(
        r#"SELECT length(CAST(data AS BLOB)) FROM workflow_blobs WHERE key = ?1"#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(size.map(|s| s.max(0) as u64).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, run_migrations};

    async fn memory_pool() -> DbPool {
        let pool = create_pool("sqlite::memory:", 1).await.expect("pool");
        run_migrations(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn put_then_get_returns_latest_data() {
        let pool = memory_pool().await;

        put_blob(&pool, "workflow_data", "{\"v\":1}").await.unwrap();
        put_blob(&pool, "workflow_data", "{\"v\":2}").await.unwrap();

        let row = get_blob(&pool, "workflow_data").await.unwrap().expect("row");
        assert_eq!(row.data, "{\"v\":2}");
        assert!(row.updated_at > 0);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let pool = memory_pool().await;
        assert!(get_blob(&pool, "nope").await.unwrap().is_none());
        assert_eq!(blob_size(&pool, "nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let pool = memory_pool().await;
        put_blob(&pool, "k", "x").await.unwrap();

        delete_blob(&pool, "k").await.unwrap();
        assert!(matches!(delete_blob(&pool, "k").await, Err(DbError::NotFound)));
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let pool = memory_pool().await;
        put_blob(&pool, "workflow_data", "a").await.unwrap();
        put_blob(&pool, "workflow_data_backup_2", "b").await.unwrap();
        put_blob(&pool, "workflow_data_backup_1", "c").await.unwrap();
        put_blob(&pool, "preferences", "d").await.unwrap();

        let keys = list_keys(&pool, "workflow_data_backup_").await.unwrap();
        assert_eq!(keys, vec!["workflow_data_backup_1", "workflow_data_backup_2"]);
    }

    #[tokio::test]
    async fn blob_size_counts_bytes() {
        let pool = memory_pool().await;
        put_blob(&pool, "k", "hello").await.unwrap();
        assert_eq!(blob_size(&pool, "k").await.unwrap(), 5);
    }
}
