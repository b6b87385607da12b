use sqlx::PgPool;

use crate::db::types::QueueStatus;

pub(crate) async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Number of queue items still waiting for a worker.
pub(crate) async fn pending_queue_depth(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM learning_summary_queue WHERE status = $1")
        .bind(QueueStatus::Pending)
        .fetch_one(pool)
        .await
}
