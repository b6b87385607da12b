use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::LearningSummaryQueueItem;
use crate::db::types::QueueStatus;
use crate::repositories;
use crate::services::learning_summary::LearningSummaryStore;

pub(crate) async fn claim_pending(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<LearningSummaryQueueItem>, sqlx::Error> {
    sqlx::query_as::<_, LearningSummaryQueueItem>(
        "WITH candidate AS (
            SELECT id FROM learning_summary_queue
            WHERE status = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        UPDATE learning_summary_queue q
        SET status = $3,
            processing_started_at = now()
        FROM candidate
        WHERE q.id = candidate.id
        RETURNING q.id, q.student_id, q.status, q.error_message, q.created_at, q.processed_at",
    )
    .bind(QueueStatus::Pending)
    .bind(limit)
    .bind(QueueStatus::Processing)
    .fetch_all(pool)
    .await
    .map(|mut items| {
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        items
    })
}

pub(crate) async fn delete(pool: &PgPool, item_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM learning_summary_queue WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn mark_failed(pool: &PgPool, item_id: &str, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE learning_summary_queue
         SET status = $2,
             error_message = $3,
             processed_at = now()
         WHERE id = $1",
    )
    .bind(item_id)
    .bind(QueueStatus::Failed)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn requeue_stale(pool: &PgPool, older_than_minutes: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE learning_summary_queue
         SET status = $1,
             processing_started_at = NULL
         WHERE status = $2
           AND processing_started_at < now() - make_interval(mins => $3::int)",
    )
    .bind(QueueStatus::Pending)
    .bind(QueueStatus::Processing)
    .bind(older_than_minutes)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Postgres-backed queue and student access for the summary processor.
#[derive(Debug, Clone)]
pub(crate) struct PgLearningSummaryStore {
    pool: PgPool,
}

impl PgLearningSummaryStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LearningSummaryStore for PgLearningSummaryStore {
    async fn claim_pending(&self, limit: i64) -> anyhow::Result<Vec<LearningSummaryQueueItem>> {
        claim_pending(&self.pool, limit).await.context("Failed to claim pending queue items")
    }

    async fn recent_reports(&self, student_id: &str, limit: i64) -> anyhow::Result<Vec<String>> {
        repositories::reports::list_recent_texts(&self.pool, student_id, limit)
            .await
            .context("Failed to fetch recent reports")
    }

    async fn student_name(&self, student_id: &str) -> anyhow::Result<Option<String>> {
        repositories::students::find_name(&self.pool, student_id)
            .await
            .context("Failed to fetch student")
    }

    async fn save_summary(&self, student_id: &str, summary: &str) -> anyhow::Result<()> {
        let updated = repositories::students::update_learning_summary(&self.pool, student_id, summary)
            .await
            .context("Failed to save learning summary")?;
        if updated == 0 {
            anyhow::bail!("student {student_id} disappeared before its summary was saved");
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> anyhow::Result<()> {
        delete(&self.pool, item_id).await.context("Failed to delete queue item")
    }

    async fn mark_failed(&self, item_id: &str, error: &str) -> anyhow::Result<()> {
        mark_failed(&self.pool, item_id, error).await.context("Failed to mark queue item failed")
    }

    async fn requeue_stale(&self, older_than_minutes: i64) -> anyhow::Result<u64> {
        requeue_stale(&self.pool, older_than_minutes).await.context("Failed to requeue stale items")
    }
}
