use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::StudentProfileRow;

/// Grades arrive either pre-rendered or as activity/grade pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum ActivityGrades {
    Rendered(String),
    Pairs(Vec<ActivityGrade>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActivityGrade {
    pub(crate) activity: String,
    pub(crate) grade: String,
    #[serde(default)]
    pub(crate) learning_area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CurriculumContext {
    pub(crate) activity_name: String,
    #[serde(default)]
    pub(crate) learning_area: Option<String>,
    /// Accepted but never forwarded to the model.
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentProfile {
    #[serde(default)]
    pub(crate) gender: Option<String>,
    #[serde(default)]
    pub(crate) learning_styles: Vec<String>,
    #[serde(default)]
    pub(crate) learning_summary: Option<String>,
}

impl StudentProfile {
    pub(crate) fn is_empty(&self) -> bool {
        self.gender.as_deref().map_or(true, |value| value.trim().is_empty())
            && self.learning_styles.iter().all(|style| style.trim().is_empty())
            && self.learning_summary.as_deref().map_or(true, |value| value.trim().is_empty())
    }
}

impl From<StudentProfileRow> for StudentProfile {
    fn from(row: StudentProfileRow) -> Self {
        Self {
            gender: row.gender,
            learning_styles: row.learning_styles,
            learning_summary: row.learning_summary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportPayload {
    #[validate(length(min = 1, max = 255, message = "studentName must contain 1..255 characters"))]
    pub(crate) student_name: String,
    pub(crate) activity_grades: ActivityGrades,
    #[serde(default)]
    pub(crate) student_id: Option<String>,
    #[serde(default)]
    pub(crate) curriculum: Vec<CurriculumContext>,
    #[serde(default)]
    pub(crate) profile: Option<StudentProfile>,
    #[serde(default)]
    #[validate(length(max = 4000, message = "history must be at most 4000 characters"))]
    pub(crate) history: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchReportPayload {
    #[validate(length(min = 1, message = "students must not be empty"), nested)]
    pub(crate) students: Vec<ReportPayload>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportResponse {
    pub(crate) report: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchReportResponse {
    pub(crate) reports: Vec<String>,
    pub(crate) student_count: usize,
    pub(crate) reports_returned: usize,
    pub(crate) fallback_used: bool,
}
