use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EtlConfig;
use crate::loader::Table;
use crate::metrics::YearlyMetrics;
use crate::normalize::{iround, normalize_url, simplify_control, simplify_level};
use crate::requirements::{RequirementProfile, TestPolicy};
use crate::tuition::TuitionRecord;

/// Base identity of one institution, loaded before any statistics join.
#[derive(Debug, Clone)]
pub struct Institution {
    pub unitid: u32,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub control: Option<String>,
    pub level: Option<String>,
    pub carnegie_basic: Option<String>,
    pub website: Option<String>,
    pub admissions_url: Option<String>,
    pub application_url: Option<String>,
    pub financial_aid_url: Option<String>,
}

/// Base table plus the count of rows dropped for missing identity.
#[derive(Debug, Default)]
pub struct BaseLoad {
    pub institutions: Vec<Institution>,
    pub rejected: usize,
}

struct MergedIdentity {
    state: Option<String>,
    city: Option<String>,
    website: Option<String>,
    admissions_url: Option<String>,
}

/// Load base identity from the characteristics extract, reconciled by
/// unitid against the merged extract for state, city and URL fallbacks.
/// Rows without a resolvable unitid or name are rejected, not defaulted.
pub fn load_base(info: &Table, merged: &Table) -> BaseLoad {
    let mut merged_by_id: HashMap<u32, MergedIdentity> = HashMap::new();
    for row in &merged.rows {
        let Some(unitid) = row.u32("unitid") else {
            continue;
        };
        merged_by_id.entry(unitid).or_insert(MergedIdentity {
            state: row.get("stabbr").map(str::to_string),
            city: row.get("city").map(str::to_string),
            website: row.get("insturl").map(str::to_string),
            admissions_url: row.get("admurl").map(str::to_string),
        });
    }

    let mut load = BaseLoad::default();
    for row in &info.rows {
        let (Some(unitid), Some(name)) = (row.u32("unitid"), row.get("institution_name")) else {
            load.rejected += 1;
            continue;
        };
        let identity = merged_by_id.get(&unitid);

        let website = identity
            .and_then(|m| m.website.as_deref())
            .or_else(|| row.get("institution_internet_website_address"));
        let admissions_url = identity
            .and_then(|m| m.admissions_url.as_deref())
            .or_else(|| row.get("admissions_office_web_address"));

        load.institutions.push(Institution {
            unitid,
            name: name.to_string(),
            city: identity.and_then(|m| m.city.clone()),
            state: identity.and_then(|m| m.state.clone()),
            control: row.get("control_of_institution").map(simplify_control),
            level: row.get("level_of_institution").map(simplify_level),
            carnegie_basic: row.get("carnegie_classification_2021_basic").map(str::to_string),
            website: website.and_then(normalize_url),
            admissions_url: admissions_url.and_then(normalize_url),
            application_url: row
                .get("online_application_web_address")
                .and_then(normalize_url),
            financial_aid_url: row
                .get("financial_aid_office_web_address")
                .and_then(normalize_url),
        });
    }

    if load.rejected > 0 {
        warn!(rejected = load.rejected, "dropped base rows missing unitid or name");
    }
    load
}

/// The canonical per-institution output record. Statistically undefined
/// numeric fields serialize as explicit nulls, never zero and never
/// missing keys.
#[derive(Debug, Clone, Serialize)]
pub struct InstitutionRecord {
    pub unitid: u32,
    pub name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub control: Option<String>,
    pub level: Option<String>,
    pub carnegie_basic: Option<String>,
    pub acceptance_rate: Option<i64>,
    #[serde(rename = "yield")]
    pub yield_rate: Option<i64>,
    pub tuition_2023_24: Option<f64>,
    pub tuition_2023_24_in_state: Option<f64>,
    pub tuition_2023_24_out_of_state: Option<f64>,
    pub grad_rate_6yr: Option<i64>,
    pub intl_enrollment_pct: Option<i64>,
    pub full_time_retention_rate: Option<i64>,
    pub student_to_faculty_ratio: Option<i64>,
    pub total_enrollment: Option<i64>,
    pub website: Option<String>,
    pub admissions_url: Option<String>,
    pub application_url: Option<String>,
    pub financial_aid_url: Option<String>,
    pub test_policy: TestPolicy,
    pub major_families: Vec<String>,
}

/// Left-outer join anchored on the base table: latest-year metrics, latest
/// tuition, test policy (default Test optional), major families (default
/// empty).
pub fn build_records(
    base: &[Institution],
    series: &[YearlyMetrics],
    tuition: &[TuitionRecord],
    requirements: &[RequirementProfile],
    major_families: &HashMap<u32, Vec<String>>,
    config: &EtlConfig,
) -> Vec<InstitutionRecord> {
    let latest_year = series.iter().map(|m| m.year).max();
    let mut latest_metrics: HashMap<u32, &YearlyMetrics> = HashMap::new();
    for record in series.iter().filter(|m| Some(m.year) == latest_year) {
        // first match wins; real duplicates are a data-quality signal
        match latest_metrics.entry(record.unitid) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(_) => {
                warn!(unitid = record.unitid, year = record.year, "duplicate metrics row for latest year; keeping first");
            }
        }
    }

    let mut latest_tuition: HashMap<u32, &TuitionRecord> = HashMap::new();
    for record in tuition.iter().filter(|t| t.tuition_year == config.latest_tuition_label) {
        latest_tuition.entry(record.unitid).or_insert(record);
    }

    let policies: HashMap<u32, TestPolicy> = requirements
        .iter()
        .map(|profile| (profile.unitid, profile.test_policy))
        .collect();

    let records: Vec<InstitutionRecord> = base
        .iter()
        .map(|inst| {
            let metrics = latest_metrics.get(&inst.unitid);
            let tuition_row = latest_tuition.get(&inst.unitid);
            InstitutionRecord {
                unitid: inst.unitid,
                name: inst.name.clone(),
                city: inst.city.clone(),
                state: inst.state.clone(),
                control: inst.control.clone(),
                level: inst.level.clone(),
                carnegie_basic: inst.carnegie_basic.clone(),
                acceptance_rate: metrics.and_then(|m| m.percent_admitted_total),
                yield_rate: metrics.and_then(|m| m.admissions_yield_total),
                tuition_2023_24: tuition_row.and_then(|t| t.tuition_and_fees),
                tuition_2023_24_in_state: tuition_row.and_then(|t| t.tuition_in_state),
                tuition_2023_24_out_of_state: tuition_row.and_then(|t| t.tuition_out_of_state),
                grad_rate_6yr: metrics
                    .and_then(|m| m.graduation_rate_bachelor_degree_within_6_years_total),
                intl_enrollment_pct: metrics
                    .and_then(|m| m.percent_of_total_enrollment_that_are_u_s_nonresident),
                full_time_retention_rate: metrics.and_then(|m| m.full_time_retention_rate),
                student_to_faculty_ratio: metrics
                    .and_then(|m| iround(m.student_to_faculty_ratio)),
                total_enrollment: metrics.and_then(|m| m.total_enrollment),
                website: inst.website.clone(),
                admissions_url: inst.admissions_url.clone(),
                application_url: inst.application_url.clone(),
                financial_aid_url: inst.financial_aid_url.clone(),
                test_policy: policies
                    .get(&inst.unitid)
                    .copied()
                    .unwrap_or(TestPolicy::TestOptional),
                major_families: major_families.get(&inst.unitid).cloned().unwrap_or_default(),
            }
        })
        .collect();

    debug!(records = records.len(), latest_year = ?latest_year, "built canonical records");
    records
}
