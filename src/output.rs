use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::cip::{CipCatalog, CipMembership};
use crate::error::Result;
use crate::institutions::InstitutionRecord;
use crate::metrics::YearlyMetrics;
use crate::requirements::{RequirementProfile, TestPolicy};
use crate::tuition::TuitionRecord;

/// Every artifact is a single pretty-printed full-content write.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Lightweight search-index entry consumed by the explorer's typeahead.
#[derive(Debug, Clone, Serialize)]
pub struct IndexEntry {
    pub unitid: u32,
    pub name: String,
    pub state: Option<String>,
    pub city: Option<String>,
}

pub fn build_search_index(records: &[InstitutionRecord]) -> Vec<IndexEntry> {
    records
        .iter()
        .map(|record| IndexEntry {
            unitid: record.unitid,
            name: record.name.clone(),
            state: record.state.clone(),
            city: record.city.clone(),
        })
        .collect()
}

/// Shard key for an institution name: the lower-cased first letter when it
/// is ASCII `a–z`, otherwise the fixed `misc` bucket.
pub fn shard_key(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
        .filter(char::is_ascii_lowercase)
        .map(String::from)
        .unwrap_or_else(|| "misc".to_string())
}

/// Write the alphabetic index shards plus their manifest; returns the
/// sorted shard keys.
pub fn write_index_shards(dir: &Path, index: &[IndexEntry]) -> Result<Vec<String>> {
    fs::create_dir_all(dir)?;

    let mut shards: BTreeMap<String, Vec<&IndexEntry>> = BTreeMap::new();
    for entry in index {
        shards.entry(shard_key(&entry.name)).or_default().push(entry);
    }

    for (key, entries) in &shards {
        write_json(&dir.join(format!("{key}.json")), entries)?;
    }

    let manifest: Vec<String> = shards.keys().cloned().collect();
    write_json(&dir.join("manifest.json"), &manifest)?;
    debug!(shards = manifest.len(), "wrote index shards");
    Ok(manifest)
}

/// Editorially maintained free-text notes; the pipeline only reserves the
/// block, it never fills it.
#[derive(Debug, Default, Serialize)]
struct SupportNotes {
    international_cost: Option<String>,
    scholarships: Option<String>,
    support_services: Option<String>,
    deadlines: Option<String>,
}

#[derive(Debug, Serialize)]
struct TuitionSummary {
    sticker: Option<f64>,
    in_state: Option<f64>,
    out_of_state: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Outcomes {
    acceptance_rate: Option<i64>,
    #[serde(rename = "yield")]
    yield_rate: Option<i64>,
    grad_rate_6yr: Option<i64>,
    retention_full_time: Option<i64>,
    student_faculty_ratio: Option<i64>,
    total_enrollment: Option<i64>,
}

#[derive(Debug, Serialize)]
struct Profile<'a> {
    unitid: u32,
    name: &'a str,
    city: Option<&'a str>,
    state: Option<&'a str>,
    control: Option<&'a str>,
    level: Option<&'a str>,
    carnegie_basic: Option<&'a str>,
    website: Option<&'a str>,
    admissions_url: Option<&'a str>,
    application_url: Option<&'a str>,
    financial_aid_url: Option<&'a str>,
    test_policy: TestPolicy,
    major_families: &'a [String],
    intl_enrollment_pct: Option<i64>,
    tuition_summary: TuitionSummary,
    outcomes: Outcomes,
}

#[derive(Debug, Serialize)]
struct RequirementBreakdown<'a> {
    required: &'a [String],
    considered: &'a [String],
    not_considered: &'a [String],
    test_policy: TestPolicy,
}

const EMPTY_LABELS: &[String] = &[];

#[derive(Debug, Serialize)]
struct DetailFile<'a> {
    profile: Profile<'a>,
    requirements: RequirementBreakdown<'a>,
    support_notes: SupportNotes,
}

#[derive(Debug, Serialize)]
struct MetricsFile<'a> {
    unitid: u32,
    metrics: Vec<&'a YearlyMetrics>,
    tuition: Vec<&'a TuitionRecord>,
}

/// Write one detail file and one metrics/tuition time-series file per
/// canonical record. Returns the number of files written.
pub fn write_institution_files(
    out_dir: &Path,
    records: &[InstitutionRecord],
    series: &[YearlyMetrics],
    tuition: &[TuitionRecord],
    requirements: &[RequirementProfile],
) -> Result<usize> {
    let details_dir = out_dir.join("institutions");
    let metrics_dir = out_dir.join("metrics");
    fs::create_dir_all(&details_dir)?;
    fs::create_dir_all(&metrics_dir)?;

    let mut series_by_id: HashMap<u32, Vec<&YearlyMetrics>> = HashMap::new();
    for record in series {
        series_by_id.entry(record.unitid).or_default().push(record);
    }
    for rows in series_by_id.values_mut() {
        rows.sort_by_key(|m| m.year);
    }

    let mut tuition_by_id: HashMap<u32, Vec<&TuitionRecord>> = HashMap::new();
    for record in tuition {
        tuition_by_id.entry(record.unitid).or_default().push(record);
    }
    for rows in tuition_by_id.values_mut() {
        rows.sort_by(|a, b| a.tuition_year.cmp(&b.tuition_year));
    }

    let requirements_by_id: HashMap<u32, &RequirementProfile> =
        requirements.iter().map(|r| (r.unitid, r)).collect();

    let mut files = 0;
    for record in records {
        let requirement = requirements_by_id.get(&record.unitid);
        let detail = DetailFile {
            profile: Profile {
                unitid: record.unitid,
                name: &record.name,
                city: record.city.as_deref(),
                state: record.state.as_deref(),
                control: record.control.as_deref(),
                level: record.level.as_deref(),
                carnegie_basic: record.carnegie_basic.as_deref(),
                website: record.website.as_deref(),
                admissions_url: record.admissions_url.as_deref(),
                application_url: record.application_url.as_deref(),
                financial_aid_url: record.financial_aid_url.as_deref(),
                test_policy: record.test_policy,
                major_families: &record.major_families,
                intl_enrollment_pct: record.intl_enrollment_pct,
                tuition_summary: TuitionSummary {
                    sticker: record.tuition_2023_24,
                    in_state: record.tuition_2023_24_in_state,
                    out_of_state: record.tuition_2023_24_out_of_state,
                },
                outcomes: Outcomes {
                    acceptance_rate: record.acceptance_rate,
                    yield_rate: record.yield_rate,
                    grad_rate_6yr: record.grad_rate_6yr,
                    retention_full_time: record.full_time_retention_rate,
                    student_faculty_ratio: record.student_to_faculty_ratio,
                    total_enrollment: record.total_enrollment,
                },
            },
            requirements: RequirementBreakdown {
                required: requirement.map(|r| r.required.as_slice()).unwrap_or(EMPTY_LABELS),
                considered: requirement
                    .map(|r| r.considered.as_slice())
                    .unwrap_or(EMPTY_LABELS),
                not_considered: requirement
                    .map(|r| r.not_considered.as_slice())
                    .unwrap_or(EMPTY_LABELS),
                test_policy: requirement
                    .map(|r| r.test_policy)
                    .unwrap_or(TestPolicy::TestOptional),
            },
            support_notes: SupportNotes::default(),
        };
        write_json(&details_dir.join(format!("{}.json", record.unitid)), &detail)?;
        files += 1;

        let metrics_file = MetricsFile {
            unitid: record.unitid,
            metrics: series_by_id.get(&record.unitid).cloned().unwrap_or_default(),
            tuition: tuition_by_id.get(&record.unitid).cloned().unwrap_or_default(),
        };
        write_json(&metrics_dir.join(format!("{}.json", record.unitid)), &metrics_file)?;
        files += 1;
    }

    info!(files, "wrote per-institution artifacts");
    Ok(files)
}

/// Flat artifacts consumed whole by the presentation layer and the
/// relational-store loader.
pub fn write_flat_artifacts(
    out_dir: &Path,
    records: &[InstitutionRecord],
    index: &[IndexEntry],
    series: &[YearlyMetrics],
    tuition: &[TuitionRecord],
    requirements: &[RequirementProfile],
    catalog: &CipCatalog,
) -> Result<usize> {
    fs::create_dir_all(out_dir)?;

    write_json(&out_dir.join("institutions.json"), &records)?;
    write_json(&out_dir.join("institutions_index.json"), &index)?;
    write_json(&out_dir.join("metrics_by_year.json"), &series)?;
    write_json(&out_dir.join("requirements.json"), &requirements)?;

    let mut tuition_sorted: Vec<&TuitionRecord> = tuition.iter().collect();
    tuition_sorted.sort_by(|a, b| {
        a.unitid
            .cmp(&b.unitid)
            .then_with(|| a.tuition_year.cmp(&b.tuition_year))
    });
    write_json(&out_dir.join("tuition_timeseries.json"), &tuition_sorted)?;

    write_json(&out_dir.join("majors_meta.json"), catalog)?;
    let by_institution: BTreeMap<String, &CipMembership> = catalog
        .memberships()
        .iter()
        .map(|(unitid, membership)| (unitid.to_string(), membership))
        .collect();
    write_json(&out_dir.join("majors_by_institution.json"), &by_institution)?;

    Ok(7)
}
