use sqlx::PgPool;

use crate::db::models::BatchSummary;

pub(crate) async fn list_with_student_counts(
    pool: &PgPool,
    level: Option<i32>,
) -> Result<Vec<BatchSummary>, sqlx::Error> {
    sqlx::query_as::<_, BatchSummary>(
        "SELECT b.id, b.code, b.level, b.class_number, COUNT(s.id) AS student_count
         FROM batches b
         LEFT JOIN students s ON s.batch_id = b.id
         WHERE ($1::int IS NULL OR b.level = $1)
         GROUP BY b.id, b.code, b.level, b.class_number
         ORDER BY b.level ASC, b.code ASC",
    )
    .bind(level)
    .fetch_all(pool)
    .await
}
