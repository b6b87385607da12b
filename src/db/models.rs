use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::types::QueueStatus;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub(crate) struct CurriculumActivity {
    pub(crate) id: String,
    pub(crate) level: i32,
    pub(crate) class_number: i32,
    pub(crate) activity_name: String,
    pub(crate) learning_area: Option<String>,
    pub(crate) sequence_number: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct StudentProfileRow {
    pub(crate) gender: Option<String>,
    pub(crate) learning_styles: Vec<String>,
    pub(crate) learning_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchSummary {
    pub(crate) id: String,
    pub(crate) code: String,
    pub(crate) level: i32,
    pub(crate) class_number: i32,
    pub(crate) student_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct LearningSummaryQueueItem {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) status: QueueStatus,
    pub(crate) error_message: Option<String>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) processed_at: Option<OffsetDateTime>,
}
