use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::db::models::BatchSummary;
use crate::schemas::gradesheet::GradesheetExtraction;

/// Body of every call to the action endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ActionEnvelope {
    pub(crate) action: String,
    #[serde(default)]
    pub(crate) data: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExtractPayload {
    #[validate(length(min = 1, message = "image must not be empty"))]
    pub(crate) image: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum ExtractResponse {
    Parsed { parsed: bool, gradesheet: GradesheetExtraction },
    Unparsed { parsed: bool, raw: String },
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LearningSummaryPayload {
    #[validate(length(min = 1, max = 64, message = "studentId must contain 1..64 characters"))]
    pub(crate) student_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LearningSummaryResponse {
    pub(crate) student_id: String,
    pub(crate) status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) summary: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct FetchBatchesPayload {
    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "level must be in range 1..5"))]
    pub(crate) level: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FetchBatchesResponse {
    pub(crate) batches: Vec<BatchSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PingResponse {
    pub(crate) status: &'static str,
    pub(crate) service: String,
    pub(crate) version: String,
}
