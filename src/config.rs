use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{EtlError, Result};

/// Source-file layout for one pipeline run.
///
/// Every field has a default mirroring the production extract names, so a
/// plain `run --src … --out …` works without a config file. A TOML file can
/// override any subset, which the tests use to point at small fixtures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Institutional characteristics extract (identity, control, level, URLs).
    pub info_file: String,
    /// College-Scorecard-style merged extract (state, city, URL and tuition
    /// fallbacks), reconciled by unitid.
    pub merged_file: String,
    /// Wide tuition-and-fees extract.
    pub tuition_file: String,
    /// Program-offering extract (CIP codes, optional headcounts and titles).
    pub offerings_file: String,
    /// Admissions/enrollment/graduation survey extracts, one per year. The
    /// max year drives the latest-statistics join and the requirement survey.
    pub admissions_files: Vec<YearSource>,
    /// Academic-year labels recognized in the tuition extract, oldest first.
    pub tuition_year_labels: Vec<String>,
    /// Label whose tuition row carries the in-state/out-of-state split and
    /// feeds the canonical record.
    pub latest_tuition_label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YearSource {
    pub year: i32,
    pub file: String,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            info_file: "2023_uni_information.csv".to_string(),
            merged_file: "MERGED2022_23_PP.csv".to_string(),
            tuition_file: "2023_tuition.csv".to_string(),
            offerings_file: "2023 - degree offerings coded.csv".to_string(),
            admissions_files: vec![
                YearSource {
                    year: 2022,
                    file: "2022_Admissions_Enrollment_Graduation.csv".to_string(),
                },
                YearSource {
                    year: 2023,
                    file: "2023_Admissions_Enrollment_Graduation.csv".to_string(),
                },
            ],
            tuition_year_labels: vec![
                "2020_21".to_string(),
                "2021_22".to_string(),
                "2022_23".to_string(),
                "2023_24".to_string(),
            ],
            latest_tuition_label: "2023_24".to_string(),
        }
    }
}

impl EtlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: EtlConfig = toml::from_str(&content)?;
        if config.admissions_files.is_empty() {
            return Err(EtlError::Config(
                "at least one admissions survey year is required".to_string(),
            ));
        }
        Ok(config)
    }

    /// The most recent survey year configured.
    pub fn latest_year(&self) -> Option<i32> {
        self.admissions_files.iter().map(|y| y.year).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_sources() {
        let config = EtlConfig::default();
        assert_eq!(config.admissions_files.len(), 2);
        assert_eq!(config.latest_year(), Some(2023));
        assert_eq!(config.latest_tuition_label, "2023_24");
        assert_eq!(config.tuition_year_labels.last().unwrap(), "2023_24");
    }

    #[test]
    fn toml_overrides_subset_of_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.toml");
        fs::write(
            &path,
            r#"
info_file = "info.csv"

[[admissions_files]]
year = 2023
file = "adm_2023.csv"
"#,
        )
        .unwrap();

        let config = EtlConfig::load(&path).unwrap();
        assert_eq!(config.info_file, "info.csv");
        assert_eq!(config.merged_file, "MERGED2022_23_PP.csv");
        assert_eq!(config.latest_year(), Some(2023));
    }

    #[test]
    fn empty_year_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.toml");
        fs::write(&path, "admissions_files = []\n").unwrap();
        assert!(EtlConfig::load(&path).is_err());
    }
}
