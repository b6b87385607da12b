use serde::{Serialize, Serializer};

/// Rating alphabet used on the paper gradesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum GradeCode {
    Excellent,
    Good,
    NeedsPractice,
    Absent,
    Illegible,
}

impl GradeCode {
    pub(crate) const ALL: [GradeCode; 5] =
        [Self::Excellent, Self::Good, Self::NeedsPractice, Self::Absent, Self::Illegible];

    /// Accepts `A`, `B`, `C`, `X` or the empty string, ignoring case and padding.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::Excellent),
            "B" => Some(Self::Good),
            "C" => Some(Self::NeedsPractice),
            "X" => Some(Self::Absent),
            "" => Some(Self::Illegible),
            _ => None,
        }
    }

    pub(crate) fn as_code(self) -> &'static str {
        match self {
            Self::Excellent => "A",
            Self::Good => "B",
            Self::NeedsPractice => "C",
            Self::Absent => "X",
            Self::Illegible => "",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::NeedsPractice => "Needs Practice",
            Self::Absent => "Absent",
            Self::Illegible => "Unreadable",
        }
    }
}

impl Serialize for GradeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_code())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentGradeRecord {
    pub(crate) roll_number: Option<String>,
    pub(crate) name: String,
    pub(crate) grades: Vec<GradeCode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradesheetExtraction {
    pub(crate) session_number: Option<String>,
    pub(crate) level: Option<String>,
    pub(crate) batch_code: Option<String>,
    pub(crate) activities: Vec<String>,
    pub(crate) students: Vec<StudentGradeRecord>,
    pub(crate) defects: Vec<String>,
    pub(crate) malformed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reconciliation: Option<Reconciliation>,
}

impl GradesheetExtraction {
    /// Level and class number, when both read as whole numbers.
    pub(crate) fn curriculum_coordinates(&self) -> Option<(i32, i32)> {
        let level = self.level.as_deref()?.trim().parse::<i32>().ok()?;
        let class_number = self.session_number.as_deref()?.trim().parse::<i32>().ok()?;
        Some((level, class_number))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActivityMapping {
    pub(crate) ocr_label: String,
    pub(crate) activity_name: Option<String>,
    pub(crate) learning_area: Option<String>,
    pub(crate) sequence: usize,
    pub(crate) warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MatchedActivity {
    pub(crate) activity_name: String,
    pub(crate) learning_area: Option<String>,
    pub(crate) sequence: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub(crate) enum Reconciliation {
    Positional { mappings: Vec<ActivityMapping>, warnings: Vec<String> },
    NameLookup { matched: Vec<MatchedActivity> },
    Unavailable { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_codes_parse_case_insensitively() {
        assert_eq!(GradeCode::parse("a"), Some(GradeCode::Excellent));
        assert_eq!(GradeCode::parse(" X "), Some(GradeCode::Absent));
        assert_eq!(GradeCode::parse(""), Some(GradeCode::Illegible));
        assert_eq!(GradeCode::parse("D"), None);
        assert_eq!(GradeCode::parse("AB"), None);
    }

    #[test]
    fn every_code_reparses_to_itself() {
        for code in GradeCode::ALL {
            assert_eq!(GradeCode::parse(code.as_code()), Some(code));
        }
    }

    #[test]
    fn coordinates_require_numeric_level_and_class() {
        let mut extraction = GradesheetExtraction {
            session_number: Some("12".to_string()),
            level: Some("2".to_string()),
            batch_code: None,
            activities: Vec::new(),
            students: Vec::new(),
            defects: Vec::new(),
            malformed: false,
            reconciliation: None,
        };
        assert_eq!(extraction.curriculum_coordinates(), Some((2, 12)));

        extraction.session_number = Some("A".to_string());
        assert_eq!(extraction.curriculum_coordinates(), None);
    }

    #[test]
    fn reconciliation_serializes_with_mode_tag() {
        let value = serde_json::to_value(Reconciliation::Unavailable {
            reason: "curriculum lookup failed".to_string(),
        })
        .expect("serialize");
        assert_eq!(value["mode"], "unavailable");

        let value = serde_json::to_value(Reconciliation::NameLookup { matched: Vec::new() })
            .expect("serialize");
        assert_eq!(value["mode"], "name_lookup");
    }
}
