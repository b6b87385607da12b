use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::CurriculumActivity;
use crate::services::reconciler::CurriculumStore;

const COLUMNS: &str = "id, level, class_number, activity_name, learning_area, sequence_number";

pub(crate) async fn list_sequenced(
    pool: &PgPool,
    level: i32,
    class_number: i32,
) -> Result<Vec<CurriculumActivity>, sqlx::Error> {
    sqlx::query_as::<_, CurriculumActivity>(&format!(
        "SELECT {COLUMNS}
         FROM curriculum_activities
         WHERE level = $1
           AND class_number = $2
           AND sequence_number IS NOT NULL
         ORDER BY sequence_number ASC"
    ))
    .bind(level)
    .bind(class_number)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_names(
    pool: &PgPool,
    level: i32,
    names: &[String],
) -> Result<Vec<CurriculumActivity>, sqlx::Error> {
    let lowered: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
    sqlx::query_as::<_, CurriculumActivity>(&format!(
        "SELECT {COLUMNS}
         FROM curriculum_activities
         WHERE level = $1
           AND lower(activity_name) = ANY($2)
         ORDER BY class_number ASC, sequence_number ASC NULLS LAST"
    ))
    .bind(level)
    .bind(&lowered)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone)]
pub(crate) struct PgCurriculumStore {
    pool: PgPool,
}

impl PgCurriculumStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurriculumStore for PgCurriculumStore {
    async fn sequenced_activities(
        &self,
        level: i32,
        class_number: i32,
    ) -> anyhow::Result<Vec<CurriculumActivity>> {
        list_sequenced(&self.pool, level, class_number)
            .await
            .context("Failed to fetch sequenced curriculum activities")
    }

    async fn activities_by_names(
        &self,
        level: i32,
        names: &[String],
    ) -> anyhow::Result<Vec<CurriculumActivity>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        list_by_names(&self.pool, level, names)
            .await
            .context("Failed to fetch curriculum activities by name")
    }
}
