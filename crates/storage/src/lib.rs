//! Storage layer: SQLite persistence for the local knowledge store.
//!
//! Holds DB pool setup, the migration runner and passage queries.

pub mod models;

use models::PassageRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// Opens (creating if missing) the SQLite database at `database_url`, which
/// may be a plain filesystem path or a `sqlite:` URL.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let opts = if database_url.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(database_url)?
    } else {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        SqliteConnectOptions::new().filename(path)
    }
    .create_if_missing(true);

    let mut pool_opts = SqlitePoolOptions::new();
    if database_url.contains("memory") {
        pool_opts = pool_opts.max_connections(1);
    } else {
        pool_opts = pool_opts.max_connections(5);
    }
    let pool = pool_opts.connect_with(opts).await?;
    debug!(database = %database_url, "sqlite pool opened");
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations.
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Inserts passages, keeping the first stored copy of any id.
pub async fn insert_passages(pool: &SqlitePool, rows: &[PassageRow]) -> anyhow::Result<u64> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for row in rows {
        let result = sqlx::query(
            r#"
            INSERT INTO passages (id, text, embedding_json, dim)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&row.id)
        .bind(&row.text)
        .bind(&row.embedding_json)
        .bind(row.dim)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

pub async fn existing_ids(pool: &SqlitePool, ids: &[String]) -> anyhow::Result<HashSet<String>> {
    let mut present = HashSet::new();
    for batch in ids.chunks(256) {
        let mut qb = sqlx::QueryBuilder::new("SELECT id FROM passages WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in batch {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        let found = qb.build_query_as::<(String,)>().fetch_all(pool).await?;
        present.extend(found.into_iter().map(|(id,)| id));
    }
    Ok(present)
}

pub async fn count_passages(pool: &SqlitePool) -> anyhow::Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages")
        .fetch_one(pool)
        .await?;
    Ok(count as u64)
}

pub async fn load_passages(pool: &SqlitePool) -> anyhow::Result<Vec<PassageRow>> {
    let rows = sqlx::query_as::<_, PassageRow>(
        "SELECT id, text, embedding_json, dim FROM passages ORDER BY id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
