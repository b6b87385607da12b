use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::schemas::gradesheet::{GradeCode, GradesheetExtraction, StudentGradeRecord};
use crate::services::openai::{ChatRequest, ContentPart, RequestKind};
use crate::services::reconciler::{self, CurriculumStore};

pub(crate) const EXTRACTION_PROMPT: &str = "You are reading a photographed PlayPack gradesheet. \
Return ONLY a JSON object, with no markdown and no commentary, in this shape:
{
  \"sessionNumber\": \"class number printed on the sheet, or null\",
  \"level\": \"curriculum level printed on the sheet, or null\",
  \"batchCode\": \"batch code printed on the sheet, or null\",
  \"activities\": [\"activity column headers, left to right\"],
  \"students\": [
    {\"rollNumber\": \"roll number digits, or null if unreadable\", \"name\": \"student name\", \"grades\": [\"one grade per activity column\"]}
  ]
}
Rules:
- Every grade is exactly one of A (Excellent), B (Good), C (Needs Practice), X (Absent), or an empty string when unreadable.
- Each student's grades list has one entry per activity, in the same order as the activity headers.
- Copy names and activity headers as written; do not correct spelling.
- Do not guess values you cannot read.";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ImageError {
    #[error("Image payload is empty")]
    Empty,
    #[error("Image exceeds the {limit_mb} MB size limit")]
    TooLarge { limit_mb: u64 },
    #[error("Image is not valid base64")]
    InvalidEncoding,
}

/// A decoded, size-checked image ready to send to the vision model.
#[derive(Debug, Clone)]
pub(crate) struct PreparedImage {
    pub(crate) mime: &'static str,
    pub(crate) byte_len: usize,
    pub(crate) fingerprint: String,
    encoded: String,
}

impl PreparedImage {
    pub(crate) fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.encoded)
    }
}

/// Base64 length of `max_bytes` raw bytes, padding included.
pub(crate) fn max_encoded_len(max_bytes: usize) -> usize {
    max_bytes.div_ceil(3).saturating_mul(4)
}

/// Validates an inbound image before any external call is made.
///
/// The length check runs on the encoded string so oversized payloads are
/// rejected without decoding them.
pub(crate) fn prepare_image(raw: &str, max_bytes: usize) -> Result<PreparedImage, ImageError> {
    let payload = strip_data_url_prefix(raw.trim());
    if payload.is_empty() {
        return Err(ImageError::Empty);
    }

    let limit_mb = (max_bytes / (1024 * 1024)) as u64;
    if payload.len() > max_encoded_len(max_bytes) {
        return Err(ImageError::TooLarge { limit_mb });
    }

    let bytes = STANDARD.decode(payload).map_err(|_| ImageError::InvalidEncoding)?;
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge { limit_mb });
    }

    Ok(PreparedImage {
        mime: sniff_mime(&bytes),
        byte_len: bytes.len(),
        fingerprint: hex::encode(Sha256::digest(&bytes)),
        encoded: payload.to_string(),
    })
}

fn strip_data_url_prefix(value: &str) -> &str {
    if value.starts_with("data:") {
        if let Some((_, rest)) = value.split_once(',') {
            return rest;
        }
    }
    value
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

pub(crate) fn extraction_request(image: &PreparedImage, max_tokens: u32) -> ChatRequest {
    ChatRequest {
        kind: RequestKind::Extraction,
        system: None,
        user: vec![
            ContentPart::Text(EXTRACTION_PROMPT.to_string()),
            ContentPart::ImageDataUrl(image.data_url()),
        ],
        max_tokens,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExtractionOutcome {
    Parsed(GradesheetExtraction),
    /// The model text, untouched, for a human to review.
    Unparsed(String),
}

impl ExtractionOutcome {
    pub(crate) fn status(&self) -> &'static str {
        match self {
            Self::Parsed(extraction) if extraction.malformed => "malformed",
            Self::Parsed(_) => "parsed",
            Self::Unparsed(_) => "unparsed",
        }
    }
}

/// Removes a surrounding markdown fence such as "```json ... ```".
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => strip_inline_info_string(rest),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Drops a language tag such as `json` when the fenced JSON shares its line.
fn strip_inline_info_string(rest: &str) -> &str {
    let body = rest.trim_start_matches(|ch: char| ch.is_ascii_alphanumeric());
    if body.trim_start().starts_with(['{', '[']) {
        body
    } else {
        rest
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGradesheet {
    #[serde(default)]
    session_number: Option<Value>,
    #[serde(default)]
    class_number: Option<Value>,
    #[serde(default)]
    level: Option<Value>,
    #[serde(default)]
    batch_code: Option<Value>,
    activities: Vec<Value>,
    students: Vec<RawStudent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudent {
    #[serde(default)]
    roll_number: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    grades: Vec<Value>,
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Parses model text into a gradesheet, recording defects instead of failing.
/// Returns `None` when the text is not a gradesheet-shaped JSON object.
pub(crate) fn parse_gradesheet(raw: &str) -> Option<GradesheetExtraction> {
    let sheet: RawGradesheet = serde_json::from_str(strip_code_fence(raw)).ok()?;
    let mut defects = Vec::new();

    let activities: Vec<String> = sheet
        .activities
        .iter()
        .enumerate()
        .map(|(index, value)| {
            scalar_text(Some(value)).unwrap_or_else(|| {
                defects.push(format!("Activity {} has no readable label", index + 1));
                String::new()
            })
        })
        .collect();

    let students = sheet
        .students
        .iter()
        .enumerate()
        .map(|(row, student)| {
            let row_number = row + 1;
            let name = scalar_text(student.name.as_ref()).unwrap_or_else(|| {
                defects.push(format!("Student row {row_number} has no readable name"));
                String::new()
            });

            let roll_number = scalar_text(student.roll_number.as_ref()).and_then(|roll| {
                if roll.chars().all(|ch| ch.is_ascii_digit()) {
                    Some(roll)
                } else {
                    defects.push(format!(
                        "Student row {row_number} has non-numeric roll number \"{roll}\""
                    ));
                    None
                }
            });

            let grades = student
                .grades
                .iter()
                .enumerate()
                .map(|(column, value)| {
                    let text = match value {
                        Value::Null => Some(String::new()),
                        Value::String(text) => Some(text.clone()),
                        _ => None,
                    };
                    match text.as_deref().and_then(GradeCode::parse) {
                        Some(code) => code,
                        None => {
                            defects.push(format!(
                                "Student row {row_number} column {} has invalid grade {value}",
                                column + 1
                            ));
                            GradeCode::Illegible
                        }
                    }
                })
                .collect::<Vec<_>>();

            if grades.len() != activities.len() {
                defects.push(format!(
                    "Student row {row_number} has {} grades for {} activities",
                    grades.len(),
                    activities.len()
                ));
            }

            StudentGradeRecord { roll_number, name, grades }
        })
        .collect();

    let session_number = scalar_text(sheet.session_number.as_ref())
        .or_else(|| scalar_text(sheet.class_number.as_ref()));

    Some(GradesheetExtraction {
        session_number,
        level: scalar_text(sheet.level.as_ref()),
        batch_code: scalar_text(sheet.batch_code.as_ref()),
        activities,
        students,
        malformed: !defects.is_empty(),
        defects,
        reconciliation: None,
    })
}

/// Parses the vision response and reconciles activities when the sheet names
/// a numeric level and class.
pub(crate) async fn normalize(raw: &str, curriculum: &dyn CurriculumStore) -> ExtractionOutcome {
    let Some(mut extraction) = parse_gradesheet(raw) else {
        tracing::warn!(raw_len = raw.len(), "Gradesheet response was not valid JSON");
        return ExtractionOutcome::Unparsed(raw.to_string());
    };

    if let Some((level, class_number)) = extraction.curriculum_coordinates() {
        let reconciliation =
            reconciler::reconcile(curriculum, level, class_number, &extraction.activities).await;
        extraction.reconciliation = Some(reconciliation);
    }

    tracing::info!(
        activities = extraction.activities.len(),
        students = extraction.students.len(),
        defects = extraction.defects.len(),
        reconciled = extraction.reconciliation.is_some(),
        "Gradesheet normalized"
    );

    ExtractionOutcome::Parsed(extraction)
}
