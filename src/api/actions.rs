use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{enforce_ai_rate_limit, require_bearer};
use crate::core::security::Claims;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::actions::{
    ActionEnvelope, ExtractPayload, ExtractResponse, FetchBatchesPayload, FetchBatchesResponse,
    LearningSummaryPayload, LearningSummaryResponse, PingResponse,
};
use crate::schemas::report::{BatchReportPayload, ReportPayload, ReportResponse, StudentProfile};
use crate::services::extraction::{self, ExtractionOutcome};
use crate::services::learning_summary::{summarize_student, HistoryWindow, SummaryOutcome};
use crate::services::report_prompt::ReportRequest;
use crate::services::reports::{self, ReportLimits};
use crate::tasks::learning_summary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Ping,
    Extract,
    GenerateReport,
    GenerateReportsBatch,
    GenerateLearningSummary,
    ProcessLearningSummaryQueue,
    FetchBatches,
}

impl FromStr for Action {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ping" => Ok(Self::Ping),
            "extract" => Ok(Self::Extract),
            "generate_report" => Ok(Self::GenerateReport),
            "generate_reports_batch" => Ok(Self::GenerateReportsBatch),
            "generate_learning_summary" => Ok(Self::GenerateLearningSummary),
            "process_learning_summary_queue" => Ok(Self::ProcessLearningSummaryQueue),
            "fetch_batches" => Ok(Self::FetchBatches),
            _ => Err(ApiError::BadRequest("Invalid action".to_string())),
        }
    }
}

impl Action {
    fn calls_generation(self) -> bool {
        matches!(
            self,
            Self::Extract
                | Self::GenerateReport
                | Self::GenerateReportsBatch
                | Self::GenerateLearningSummary
        )
    }
}

pub(crate) async fn dispatch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ActionEnvelope>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(envelope) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let action: Action = envelope.action.parse()?;

    if action == Action::Ping {
        return Ok(ping(&state));
    }

    let claims = require_bearer(&headers, &state)?;
    if action.calls_generation() {
        enforce_ai_rate_limit(&state, &claims).await?;
    }

    tracing::info!(action = envelope.action.as_str(), subject = %claims.sub, "Handling action");

    match action {
        Action::Ping => Ok(ping(&state)),
        Action::Extract => extract(&state, envelope.data).await,
        Action::GenerateReport => generate_report(&state, envelope.data).await,
        Action::GenerateReportsBatch => generate_reports_batch(&state, envelope.data).await,
        Action::GenerateLearningSummary => generate_learning_summary(&state, envelope.data).await,
        Action::ProcessLearningSummaryQueue => process_queue(&state, &claims).await,
        Action::FetchBatches => fetch_batches(&state, envelope.data).await,
    }
}

fn ping(state: &AppState) -> Response {
    Json(PingResponse {
        status: "ok",
        service: state.settings().api().project_name.clone(),
        version: state.settings().api().version.clone(),
    })
    .into_response()
}

fn parse_data<T: DeserializeOwned + Validate>(data: Value) -> Result<T, ApiError> {
    let payload: T = serde_json::from_value(data)
        .map_err(|err| ApiError::BadRequest(format!("Invalid payload: {err}")))?;
    payload.validate()?;
    Ok(payload)
}

async fn extract(state: &AppState, data: Value) -> Result<Response, ApiError> {
    let payload: ExtractPayload = parse_data(data)?;
    let image =
        extraction::prepare_image(&payload.image, state.settings().extraction().max_image_bytes())?;

    tracing::info!(
        fingerprint = %image.fingerprint,
        mime = image.mime,
        bytes = image.byte_len,
        "Extracting gradesheet"
    );

    let request = extraction::extraction_request(&image, state.settings().ai().extract_max_tokens);
    let completion = state.generator().complete(request).await?;
    let outcome = extraction::normalize(&completion.content, state.curriculum()).await;

    metrics::counter!("extractions_total", "status" => outcome.status()).increment(1);

    let response = match outcome {
        ExtractionOutcome::Parsed(gradesheet) => ExtractResponse::Parsed { parsed: true, gradesheet },
        ExtractionOutcome::Unparsed(raw) => ExtractResponse::Unparsed { parsed: false, raw },
    };
    Ok(Json(response).into_response())
}

fn report_limits(state: &AppState) -> ReportLimits {
    ReportLimits {
        report_max_tokens: state.settings().ai().report_max_tokens,
        batch_tokens_per_student: state.settings().ai().batch_tokens_per_student,
    }
}

/// Stored profile for a student, used when the caller sent none.
/// Lookup failures degrade to no profile.
async fn stored_profile(state: &AppState, payload: &ReportPayload) -> Option<StudentProfile> {
    if payload.profile.is_some() {
        return None;
    }
    let student_id = payload.student_id.as_deref()?;

    match repositories::students::find_profile(state.db(), student_id).await {
        Ok(row) => row.map(StudentProfile::from),
        Err(err) => {
            tracing::warn!(student_id, error = %err, "Failed to load student profile; continuing without it");
            None
        }
    }
}

async fn generate_report(state: &AppState, data: Value) -> Result<Response, ApiError> {
    let payload: ReportPayload = parse_data(data)?;
    let profile = stored_profile(state, &payload).await;
    let request = ReportRequest::from_payload(payload, profile);

    let report = reports::generate_report(state.generator(), &request, report_limits(state)).await?;
    Ok(Json(ReportResponse { report }).into_response())
}

async fn generate_reports_batch(state: &AppState, data: Value) -> Result<Response, ApiError> {
    let payload: BatchReportPayload = parse_data(data)?;
    let max_students = state.settings().reports().max_batch_students;
    if payload.students.len() > max_students {
        return Err(ApiError::BadRequest(format!(
            "students must contain at most {max_students} entries"
        )));
    }

    let mut requests = Vec::with_capacity(payload.students.len());
    for student in payload.students {
        let profile = stored_profile(state, &student).await;
        requests.push(ReportRequest::from_payload(student, profile));
    }

    let response = reports::generate_batch(
        state.generator(),
        &requests,
        report_limits(state),
        state.settings().reports().mismatch_policy,
    )
    .await?;
    Ok(Json(response).into_response())
}

async fn generate_learning_summary(state: &AppState, data: Value) -> Result<Response, ApiError> {
    let payload: LearningSummaryPayload = parse_data(data)?;
    let outcome = summarize_student(
        state.learning(),
        state.generator(),
        &payload.student_id,
        HistoryWindow::Latest,
        state.settings().ai().summary_max_tokens,
    )
    .await?;

    let (status, summary) = match outcome {
        SummaryOutcome::Updated(summary) => ("updated", Some(summary)),
        SummaryOutcome::InsufficientHistory { .. } => ("insufficient_history", None),
    };
    Ok(Json(LearningSummaryResponse { student_id: payload.student_id, status, summary }).into_response())
}

async fn process_queue(state: &AppState, claims: &Claims) -> Result<Response, ApiError> {
    tracing::info!(subject = %claims.sub, "Queue run requested");
    let run = learning_summary::process_queue(
        state.learning(),
        state.generator(),
        state.settings().learning_summary().batch_size,
        state.settings().ai().summary_max_tokens,
    )
    .await
    .map_err(|err| ApiError::internal(format!("{err:#}"), "Failed to process learning summary queue"))?;
    Ok(Json(run).into_response())
}

async fn fetch_batches(state: &AppState, data: Value) -> Result<Response, ApiError> {
    let payload: FetchBatchesPayload =
        if data.is_null() { FetchBatchesPayload::default() } else { parse_data(data)? };

    let batches = repositories::batches::list_with_student_counts(state.db(), payload.level)
        .await
        .map_err(|err| ApiError::internal(err, "Failed to fetch batches"))?;
    Ok(Json(FetchBatchesResponse { batches }).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_is_rejected() {
        assert!(matches!("delete_everything".parse::<Action>(), Err(ApiError::BadRequest(_))));
        assert_eq!("fetch_batches".parse::<Action>().ok(), Some(Action::FetchBatches));
    }

    #[test]
    fn only_generation_actions_are_rate_limited() {
        assert!(Action::Extract.calls_generation());
        assert!(Action::GenerateLearningSummary.calls_generation());
        assert!(!Action::FetchBatches.calls_generation());
        assert!(!Action::ProcessLearningSummaryQueue.calls_generation());
    }
}
