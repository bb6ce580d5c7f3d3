use serde::Serialize;

use crate::loader::Table;
use crate::normalize::{iround, pct};

/// One institution-year of admissions statistics. Recognized columns only;
/// a field the year's extract does not carry stays `None` and is omitted
/// from the serialized record rather than null-filled.
///
/// Percentage fields hold integer-rounded values; counts and percentile
/// scores are integers in the source; the student:faculty ratio keeps
/// source precision.
#[derive(Debug, Clone, Serialize)]
pub struct YearlyMetrics {
    pub unitid: u32,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicants_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admissions_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_admitted_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admissions_yield_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_rate_bachelor_degree_within_6_years_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_time_retention_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_to_faculty_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_enrollment: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_of_total_enrollment_that_are_u_s_nonresident: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_first_time_degree_certificate_seeking_students_submitting_sat_scores: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_of_first_time_degree_certificate_seeking_students_submitting_sat_scores:
        Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_first_time_degree_certificate_seeking_students_submitting_act_scores: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_of_first_time_degree_certificate_seeking_students_submitting_act_scores:
        Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_evidence_based_reading_and_writing_25th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_evidence_based_reading_and_writing_50th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_evidence_based_reading_and_writing_75th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_math_25th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_math_50th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat_math_75th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_composite_25th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_composite_50th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_composite_75th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_english_25th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_english_50th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_english_75th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_math_25th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_math_50th_percentile_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub act_math_75th_percentile_score: Option<i64>,
    /// applicants × admit-rate/100, derived over the whole series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admitted_est: Option<i64>,
    /// admits × yield/100, derived over the whole series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_est: Option<i64>,
}

/// Extract one survey year's rows. Admit rate and yield are derived from
/// the counts only when the extract omits the rate column itself.
pub fn load_year(table: &Table, year: i32) -> Vec<YearlyMetrics> {
    let has_admit_rate = table.has_column("percent_admitted_total");
    let has_yield = table.has_column("admissions_yield_total");

    let mut records = Vec::new();
    for row in &table.rows {
        let Some(unitid) = row.u32("unitid") else {
            continue;
        };

        let applicants_total = row.i64("applicants_total");
        let admissions_total = row.i64("admissions_total");
        let enrolled_total = row.i64("enrolled_total");

        let percent_admitted_total = if has_admit_rate {
            iround(row.f64("percent_admitted_total"))
        } else {
            iround(pct(
                admissions_total.map(|v| v as f64),
                applicants_total.map(|v| v as f64),
            ))
        };
        let admissions_yield_total = if has_yield {
            iround(row.f64("admissions_yield_total"))
        } else {
            iround(pct(
                enrolled_total.map(|v| v as f64),
                admissions_total.map(|v| v as f64),
            ))
        };

        records.push(YearlyMetrics {
            unitid,
            year,
            applicants_total,
            admissions_total,
            enrolled_total,
            percent_admitted_total,
            admissions_yield_total,
            graduation_rate_bachelor_degree_within_6_years_total: iround(
                row.f64("graduation_rate_bachelor_degree_within_6_years_total"),
            ),
            full_time_retention_rate: iround(row.f64("full_time_retention_rate")),
            student_to_faculty_ratio: row.f64("student_to_faculty_ratio"),
            total_enrollment: row.i64("total_enrollment"),
            percent_of_total_enrollment_that_are_u_s_nonresident: iround(
                row.f64("percent_of_total_enrollment_that_are_u_s_nonresident"),
            ),
            number_of_first_time_degree_certificate_seeking_students_submitting_sat_scores: row
                .i64("number_of_first_time_degree_certificate_seeking_students_submitting_sat_scores"),
            percent_of_first_time_degree_certificate_seeking_students_submitting_sat_scores:
                iround(row.f64(
                    "percent_of_first_time_degree_certificate_seeking_students_submitting_sat_scores",
                )),
            number_of_first_time_degree_certificate_seeking_students_submitting_act_scores: row
                .i64("number_of_first_time_degree_certificate_seeking_students_submitting_act_scores"),
            percent_of_first_time_degree_certificate_seeking_students_submitting_act_scores:
                iround(row.f64(
                    "percent_of_first_time_degree_certificate_seeking_students_submitting_act_scores",
                )),
            sat_evidence_based_reading_and_writing_25th_percentile_score: row
                .i64("sat_evidence_based_reading_and_writing_25th_percentile_score"),
            sat_evidence_based_reading_and_writing_50th_percentile_score: row
                .i64("sat_evidence_based_reading_and_writing_50th_percentile_score"),
            sat_evidence_based_reading_and_writing_75th_percentile_score: row
                .i64("sat_evidence_based_reading_and_writing_75th_percentile_score"),
            sat_math_25th_percentile_score: row.i64("sat_math_25th_percentile_score"),
            sat_math_50th_percentile_score: row.i64("sat_math_50th_percentile_score"),
            sat_math_75th_percentile_score: row.i64("sat_math_75th_percentile_score"),
            act_composite_25th_percentile_score: row.i64("act_composite_25th_percentile_score"),
            act_composite_50th_percentile_score: row.i64("act_composite_50th_percentile_score"),
            act_composite_75th_percentile_score: row.i64("act_composite_75th_percentile_score"),
            act_english_25th_percentile_score: row.i64("act_english_25th_percentile_score"),
            act_english_50th_percentile_score: row.i64("act_english_50th_percentile_score"),
            act_english_75th_percentile_score: row.i64("act_english_75th_percentile_score"),
            act_math_25th_percentile_score: row.i64("act_math_25th_percentile_score"),
            act_math_50th_percentile_score: row.i64("act_math_50th_percentile_score"),
            act_math_75th_percentile_score: row.i64("act_math_75th_percentile_score"),
            admitted_est: None,
            enrolled_est: None,
        });
    }
    records
}

/// Concatenate the survey years into one long-form series and compute the
/// estimated counts where both operands exist.
pub fn build_series(years: Vec<Vec<YearlyMetrics>>) -> Vec<YearlyMetrics> {
    let mut series: Vec<YearlyMetrics> = years.into_iter().flatten().collect();
    for record in &mut series {
        record.admitted_est = estimate(record.applicants_total, record.percent_admitted_total);
        record.enrolled_est = estimate(record.admissions_total, record.admissions_yield_total);
    }
    series
}

fn estimate(count: Option<i64>, rate: Option<i64>) -> Option<i64> {
    match (count, rate) {
        (Some(c), Some(r)) => Some((c as f64 * r as f64 / 100.0).round() as i64),
        _ => None,
    }
}
