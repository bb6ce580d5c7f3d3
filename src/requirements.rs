use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::{Row, Table};
use crate::normalize::title_case_field;

/// Admissions-criteria survey fields classified per institution.
pub const REQUIREMENT_FIELDS: [&str; 12] = [
    "secondary_school_gpa",
    "secondary_school_rank",
    "secondary_school_record",
    "completion_of_college_preparatory_program",
    "recommendations",
    "formal_demonstration_of_competencies",
    "work_experience",
    "personal_statement_or_essay",
    "legacy_status",
    "admission_test_scores",
    "english_proficiency_test",
    "other_test_wonderlic_wisc_iii_etc",
];

pub const TEST_SCORES_LABEL: &str = "Admission Test Scores";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Required,
    Considered,
    NotConsidered,
}

/// Bucket one survey answer. The substring rules run in precedence order;
/// text matching none of them defaults to not-considered.
pub fn classify_answer(answer: &str) -> Bucket {
    let t = answer.to_lowercase();
    if t.contains("not considered") {
        Bucket::NotConsidered
    } else if t.contains("required to be considered") {
        Bucket::Required
    } else if t.contains("not required") && t.contains("considered") {
        Bucket::Considered
    } else if t.contains("required") {
        Bucket::Required
    } else if t.contains("considered") {
        Bucket::Considered
    } else {
        Bucket::NotConsidered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestPolicy {
    #[serde(rename = "Required")]
    Required,
    #[serde(rename = "Test flexible")]
    TestFlexible,
    #[serde(rename = "Test optional")]
    TestOptional,
}

/// One institution's classified admissions criteria.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementProfile {
    pub unitid: u32,
    pub required: Vec<String>,
    pub considered: Vec<String>,
    pub not_considered: Vec<String>,
    pub test_policy: TestPolicy,
}

impl RequirementProfile {
    fn from_row(row: &Row, fields: &[&str]) -> Option<RequirementProfile> {
        let unitid = row.u32("unitid")?;

        let mut required = Vec::new();
        let mut considered = Vec::new();
        let mut not_considered = Vec::new();
        for field in fields {
            // an unanswered field carries no signal and is left out entirely
            let Some(answer) = row.get(field) else {
                continue;
            };
            let label = title_case_field(field);
            match classify_answer(answer) {
                Bucket::Required => required.push(label),
                Bucket::Considered => considered.push(label),
                Bucket::NotConsidered => not_considered.push(label),
            }
        }
        required.sort();
        considered.sort();
        not_considered.sort();

        let test_policy = if required.iter().any(|l| l == TEST_SCORES_LABEL) {
            TestPolicy::Required
        } else if considered.iter().any(|l| l == TEST_SCORES_LABEL) {
            TestPolicy::TestFlexible
        } else {
            TestPolicy::TestOptional
        };

        Some(RequirementProfile {
            unitid,
            required,
            considered,
            not_considered,
            test_policy,
        })
    }
}

/// Classify the admissions-criteria answers of every institution in the
/// latest survey extract.
pub fn derive_requirements(table: &Table) -> Vec<RequirementProfile> {
    let present: Vec<&str> = REQUIREMENT_FIELDS
        .iter()
        .copied()
        .filter(|f| table.has_column(f))
        .collect();
    debug!(fields = present.len(), "classifying requirement survey fields");

    table
        .rows
        .iter()
        .filter_map(|row| RequirementProfile::from_row(row, &present))
        .collect()
}
