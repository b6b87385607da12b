use crate::schemas::gradesheet::GradeCode;
use crate::schemas::report::{ActivityGrades, ReportPayload, StudentProfile};
use crate::services::openai::{ChatRequest, ContentPart, RequestKind};

/// Marker line between student bodies in batch prompts and batch responses.
pub(crate) const STUDENT_SEPARATOR: &str = "===STUDENT_SEPARATOR===";

pub(crate) const REPORT_SYSTEM_PROMPT: &str = "You are a teaching assistant for a preschool \
enrichment programme. Teachers rate each child's classroom activities as Excellent (A), Good (B), \
Needs Practice (C) or Absent (X). Turn those ratings into warm, supportive feedback for parents, \
with short home activities that use the PlayPack kit: beads, playdoh and number tiles (dominoes \
showing numerals instead of dots). Focus the activities on areas where the child needs practice, \
and add one that builds on a strength. Do not ask the parent to prepare anything beyond the kit.
Safety: nothing goes in the mouth, no climbing, nothing that could put the child or others in danger.
Writing style: British English spelling, plain words, active voice, calm confidence, no adverbs or \
buzzwords. No greeting and no sign-off. Never use long dashes; use colons instead.";

const REPORT_INSTRUCTIONS: &str = "For this child, write:
1. A 3-4 line summary in a friendly tone.
2. 3-4 fun, 15-minute home activities.
Keep the reply under 200 words.";

/// One student's report inputs, resolved and ready for prompting.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReportRequest {
    pub(crate) student_name: String,
    pub(crate) grades_text: String,
    pub(crate) learning_areas: Vec<String>,
    pub(crate) profile: Option<StudentProfile>,
    pub(crate) history: Option<String>,
}

impl ReportRequest {
    /// `stored_profile` is used only when the payload carries no profile.
    pub(crate) fn from_payload(payload: ReportPayload, stored_profile: Option<StudentProfile>) -> Self {
        let mut areas = Vec::new();
        if let ActivityGrades::Pairs(pairs) = &payload.activity_grades {
            areas.extend(pairs.iter().filter_map(|pair| pair.learning_area.clone()));
        }
        areas.extend(payload.curriculum.iter().filter_map(|entry| entry.learning_area.clone()));

        let profile = payload.profile.or(stored_profile).filter(|profile| !profile.is_empty());

        Self {
            student_name: payload.student_name.trim().to_string(),
            grades_text: render_grades(&payload.activity_grades),
            learning_areas: dedupe_learning_areas(areas),
            profile,
            history: payload.history.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()),
        }
    }
}

pub(crate) fn render_grades(grades: &ActivityGrades) -> String {
    match grades {
        ActivityGrades::Rendered(text) => text.trim().to_string(),
        ActivityGrades::Pairs(pairs) => pairs
            .iter()
            .map(|pair| {
                let rating: &str = match GradeCode::parse(&pair.grade) {
                    Some(code) => code.label(),
                    None => pair.grade.trim(),
                };
                format!("- {}: {rating}", pair.activity.trim())
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Case-insensitive dedupe keeping first-seen order and spelling.
pub(crate) fn dedupe_learning_areas<I>(areas: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut unique = Vec::new();
    for area in areas {
        let trimmed = area.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        unique.push(trimmed.to_string());
    }
    unique
}

pub(crate) fn render_student_body(request: &ReportRequest) -> String {
    let mut sections = vec![format!("Child: {}", request.student_name)];

    if let Some(profile) = &request.profile {
        let mut lines = Vec::new();
        if let Some(gender) = profile.gender.as_deref().filter(|value| !value.trim().is_empty()) {
            lines.push(format!("Gender: {}", gender.trim()));
        }
        let styles: Vec<&str> = profile
            .learning_styles
            .iter()
            .map(|style| style.trim())
            .filter(|style| !style.is_empty())
            .collect();
        if !styles.is_empty() {
            lines.push(format!("Learning styles: {}", styles.join(", ")));
        }
        if let Some(summary) =
            profile.learning_summary.as_deref().filter(|value| !value.trim().is_empty())
        {
            lines.push(format!("Learning progress so far: {}", summary.trim()));
        }
        if !lines.is_empty() {
            sections.push(lines.join("\n"));
        }
    }

    sections.push(format!("Activity Ratings:\n{}", request.grades_text));

    if !request.learning_areas.is_empty() {
        sections.push(format!("Learning areas covered: {}", request.learning_areas.join(", ")));
    }

    if let Some(history) = &request.history {
        sections.push(format!("Recent classes:\n{history}"));
    }

    sections.join("\n\n")
}

pub(crate) fn single_report_request(request: &ReportRequest, max_tokens: u32) -> ChatRequest {
    ChatRequest {
        kind: RequestKind::Report,
        system: Some(REPORT_SYSTEM_PROMPT.to_string()),
        user: vec![ContentPart::Text(format!(
            "{}\n\n{REPORT_INSTRUCTIONS}",
            render_student_body(request)
        ))],
        max_tokens,
    }
}

/// One request covering every student, separated by [`STUDENT_SEPARATOR`].
/// The output allowance grows linearly with the number of students.
pub(crate) fn batch_report_request(requests: &[ReportRequest], tokens_per_student: u32) -> ChatRequest {
    let count = requests.len();
    let header = format!(
        "Write exactly {count} separate reports, one for each child below, in the same order. \
Each report follows these rules:\n{REPORT_INSTRUCTIONS}\n\
Put a line containing only {STUDENT_SEPARATOR} between consecutive reports. \
Do not add headers, numbers or the child's name above a report, \
and do not write the separator anywhere else."
    );
    let bodies = requests
        .iter()
        .map(render_student_body)
        .collect::<Vec<_>>()
        .join(&format!("\n{STUDENT_SEPARATOR}\n"));

    let max_tokens = u32::try_from(count).unwrap_or(u32::MAX).saturating_mul(tokens_per_student);

    ChatRequest {
        kind: RequestKind::BatchReport,
        system: Some(REPORT_SYSTEM_PROMPT.to_string()),
        user: vec![ContentPart::Text(format!("{header}\n\n{bodies}"))],
        max_tokens,
    }
}
