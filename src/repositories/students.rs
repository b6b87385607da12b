use sqlx::PgPool;

use crate::db::models::StudentProfileRow;

pub(crate) async fn find_profile(
    pool: &PgPool,
    student_id: &str,
) -> Result<Option<StudentProfileRow>, sqlx::Error> {
    sqlx::query_as::<_, StudentProfileRow>(
        "SELECT gender, learning_styles, learning_summary
         FROM students
         WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_name(pool: &PgPool, student_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT name FROM students WHERE id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn update_learning_summary(
    pool: &PgPool,
    student_id: &str,
    summary: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE students
         SET learning_summary = $2,
             learning_summary_updated_at = now()
         WHERE id = $1",
    )
    .bind(student_id)
    .bind(summary)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
