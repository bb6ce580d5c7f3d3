use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::institutions::{build_records, load_base};
use crate::loader::Table;
use crate::majors::derive_major_families;
use crate::metrics::{build_series, load_year};
use crate::output;
use crate::requirements::derive_requirements;
use crate::tuition::load_tuition;

/// One full ETL run over a folder of source extracts.
pub struct Etl {
    pub src_dir: PathBuf,
    pub out_dir: PathBuf,
    pub config: EtlConfig,
}

/// Result of a complete pipeline run.
#[derive(Debug, Serialize)]
pub struct EtlSummary {
    pub institutions: usize,
    pub rejected_records: usize,
    pub years: Vec<i32>,
    pub shards: usize,
    pub files_written: usize,
    pub finished_at: DateTime<Utc>,
}

impl Etl {
    /// Load and derive everything, then write every artifact. All source
    /// tables materialize before the first output byte, so a fatal load
    /// error leaves no partially updated output set.
    pub fn run(&self) -> Result<EtlSummary> {
        let config = &self.config;

        info!("loading institution characteristics");
        let info = Table::read(&self.src_dir.join(&config.info_file))?;
        let merged = Table::read(&self.src_dir.join(&config.merged_file))?;
        let base = load_base(&info, &merged);
        info!(
            institutions = base.institutions.len(),
            rejected = base.rejected,
            "base identity loaded"
        );

        info!("loading admissions survey years");
        let mut year_tables = Vec::new();
        for source in &config.admissions_files {
            let table = Table::read(&self.src_dir.join(&source.file))?;
            year_tables.push((source.year, table));
        }
        let series = build_series(
            year_tables
                .iter()
                .map(|(year, table)| load_year(table, *year))
                .collect(),
        );
        info!(records = series.len(), "metrics series built");

        let latest_year = config
            .latest_year()
            .ok_or_else(|| EtlError::Config("no admissions survey years configured".to_string()))?;
        let requirements = year_tables
            .iter()
            .find(|(year, _)| *year == latest_year)
            .map(|(_, table)| derive_requirements(table))
            .unwrap_or_default();
        info!(profiles = requirements.len(), year = latest_year, "requirement profiles classified");

        info!("loading tuition extract");
        let tuition_table = Table::read(&self.src_dir.join(&config.tuition_file))?;
        let tuition = load_tuition(&tuition_table, &merged, config);

        info!("aggregating major families");
        let offerings = Table::read(&self.src_dir.join(&config.offerings_file))?;
        let majors = derive_major_families(&offerings);

        let records = build_records(
            &base.institutions,
            &series,
            &tuition,
            &requirements,
            &majors.families_by_institution,
            config,
        );

        info!("writing artifacts");
        let index = output::build_search_index(&records);
        let mut files_written = output::write_flat_artifacts(
            &self.out_dir,
            &records,
            &index,
            &series,
            &tuition,
            &requirements,
            &majors.catalog,
        )?;
        let manifest = output::write_index_shards(&self.out_dir.join("indexes"), &index)?;
        files_written += manifest.len() + 1;
        files_written += output::write_institution_files(
            &self.out_dir,
            &records,
            &series,
            &tuition,
            &requirements,
        )?;

        let summary = EtlSummary {
            institutions: records.len(),
            rejected_records: base.rejected,
            years: year_tables.iter().map(|(year, _)| *year).collect(),
            shards: manifest.len(),
            files_written,
            finished_at: Utc::now(),
        };
        info!(
            institutions = summary.institutions,
            rejected = summary.rejected_records,
            files = summary.files_written,
            "pipeline finished"
        );
        Ok(summary)
    }
}
