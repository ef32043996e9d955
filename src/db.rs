use chrono::Utc;
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use tracing::warn;

use crate::config::FeedConfig;
use crate::error::StoreError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Feed {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_feed(&self, title: &str, url: &str) -> Result<Feed, StoreError> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() {
            return Err(StoreError::BlankTitle);
        }
        if url.is_empty() {
            return Err(StoreError::BlankUrl);
        }

        let now = Utc::now().to_rfc3339();
        let result = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (title, url, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(title)
        .bind(url)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(feed) => Ok(feed),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::DuplicateUrl(url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Register the feeds listed in configuration, refreshing titles of known urls.
    pub async fn sync_feeds(&self, configs: &[FeedConfig]) -> anyhow::Result<()> {
        for config in configs {
            let title = config.title.trim();
            let url = config.url.trim();
            if title.is_empty() || url.is_empty() {
                warn!("Skipping configured feed with blank title or url: {:?}", config);
                continue;
            }

            let now = Utc::now().to_rfc3339();
            sqlx::query(
                r#"
                INSERT INTO feeds (title, url, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(url) DO UPDATE SET
                    title = excluded.title,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(title)
            .bind(url)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn get_all_feeds(&self) -> anyhow::Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>("SELECT * FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(feeds)
    }

    pub async fn get_feed(&self, feed_id: i64) -> anyhow::Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    /// Urls of every registered feed, in registration order.
    pub async fn feed_urls(&self) -> anyhow::Result<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>("SELECT url FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }

    /// Returns false when no feed had this id.
    pub async fn delete_feed(&self, feed_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
