use sqlx::PgPool;

/// Report bodies for one student, newest first.
pub(crate) async fn list_recent_texts(
    pool: &PgPool,
    student_id: &str,
    limit: i64,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT report_text
         FROM reports
         WHERE student_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2",
    )
    .bind(student_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
