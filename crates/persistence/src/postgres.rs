use async_trait::async_trait;
use common::VideoId;
use domain::{AggregateRoot, Video};
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::{
    PersistenceError, Result,
    store::{ChangeSet, VideoStore},
};

/// PostgreSQL-backed video store implementation.
#[derive(Clone)]
pub struct PostgresVideoStore {
    pool: PgPool,
}

impl PostgresVideoStore {
    /// Creates a new PostgreSQL video store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoStore for PostgresVideoStore {
    #[tracing::instrument(skip(self), fields(video_id = %id))]
    async fn find(&self, id: VideoId) -> Result<Option<Video>> {
        let row = sqlx::query("SELECT document FROM videos WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let document: serde_json::Value = row.try_get("document")?;
                Ok(Some(serde_json::from_value(document)?))
            }
            None => Ok(None),
        }
    }

    #[tracing::instrument(
        skip(self, changes),
        fields(upserts = changes.upserts.len(), deletes = changes.deletes.len())
    )]
    async fn save_changes(&self, changes: ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls it back
        let mut tx = self.pool.begin().await?;

        for video in &changes.upserts {
            let expected = video.version();
            let mut saved = video.clone();
            saved.mark_saved();
            let document = serde_json::to_value(&saved)?;

            let result = if expected == 0 {
                sqlx::query(
                    r#"
                    INSERT INTO videos (id, document, version, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, NOW())
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(video.id().as_uuid())
                .bind(document)
                .bind(to_column(saved.version()))
                .bind(video.created_at())
                .execute(&mut *tx)
                .await?
            } else {
                sqlx::query(
                    r#"
                    UPDATE videos
                    SET document = $2, version = $3, updated_at = NOW()
                    WHERE id = $1 AND version = $4
                    "#,
                )
                .bind(video.id().as_uuid())
                .bind(document)
                .bind(to_column(saved.version()))
                .bind(to_column(expected))
                .execute(&mut *tx)
                .await?
            };

            if result.rows_affected() == 0 {
                return Err(conflict(&mut tx, video.id(), expected).await?);
            }
        }

        for deletion in &changes.deletes {
            let result = sqlx::query("DELETE FROM videos WHERE id = $1 AND version = $2")
                .bind(deletion.id.as_uuid())
                .bind(to_column(deletion.expected_version))
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                return Err(conflict(&mut tx, deletion.id, deletion.expected_version).await?);
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn to_column(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

/// Builds the conflict error for a write that matched no row.
async fn conflict(
    tx: &mut Transaction<'_, Postgres>,
    video_id: VideoId,
    expected: u64,
) -> Result<PersistenceError> {
    let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM videos WHERE id = $1")
        .bind(video_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;

    Ok(PersistenceError::ConcurrencyConflict {
        video_id,
        expected,
        actual: actual.map_or(0, |version| u64::try_from(version).unwrap_or(0)),
    })
}
