use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::config::EtlConfig;
use crate::loader::Table;

/// The wide tuition extract carries one derived column per academic year,
/// e.g. `drvic2023_tuition_and_fees_2023_24`. Columns are matched on this
/// marker so the derived-table vintage prefix does not matter.
const TUITION_COLUMN_MARKER: &str = "tuition_and_fees_";

/// Sticker tuition for one institution and academic year. The in-state and
/// out-of-state split exists only for the most recent label, sourced from
/// the merged extract.
#[derive(Debug, Clone, Serialize)]
pub struct TuitionRecord {
    pub unitid: u32,
    pub tuition_year: String,
    pub tuition_and_fees: Option<f64>,
    pub tuition_in_state: Option<f64>,
    pub tuition_out_of_state: Option<f64>,
}

/// Melt the wide tuition extract into long-form records for the configured
/// year labels, then attach the in-state/out-of-state figures from the
/// merged extract to the most recent label.
pub fn load_tuition(table: &Table, merged: &Table, config: &EtlConfig) -> Vec<TuitionRecord> {
    let year_columns: Vec<(String, String)> = config
        .tuition_year_labels
        .iter()
        .filter_map(|label| {
            table
                .columns
                .iter()
                .find(|c| {
                    c.ends_with(&format!("{TUITION_COLUMN_MARKER}{label}"))
                        || c.as_str() == label.as_str()
                })
                .map(|column| (label.clone(), column.clone()))
        })
        .collect();
    debug!(years = year_columns.len(), "melting tuition extract");

    let mut state_split: HashMap<u32, (Option<f64>, Option<f64>)> = HashMap::new();
    for row in &merged.rows {
        let Some(unitid) = row.u32("unitid") else {
            continue;
        };
        let in_state = row.f64("tuitionfee_in");
        let out_of_state = row.f64("tuitionfee_out");
        if in_state.is_some() || out_of_state.is_some() {
            state_split.entry(unitid).or_insert((in_state, out_of_state));
        }
    }

    let mut records = Vec::new();
    for row in &table.rows {
        let Some(unitid) = row.u32("unitid") else {
            continue;
        };
        for (label, column) in &year_columns {
            let is_latest = *label == config.latest_tuition_label;
            let (tuition_in_state, tuition_out_of_state) = if is_latest {
                state_split.get(&unitid).copied().unwrap_or((None, None))
            } else {
                (None, None)
            };
            records.push(TuitionRecord {
                unitid,
                tuition_year: label.clone(),
                tuition_and_fees: row.f64(column),
                tuition_in_state,
                tuition_out_of_state,
            });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Row;

    fn tuition_table() -> Table {
        Table {
            columns: vec![
                "unitid".to_string(),
                "drvic2023_tuition_and_fees_2022_23".to_string(),
                "drvic2023_tuition_and_fees_2023_24".to_string(),
            ],
            rows: vec![Row::from_pairs(&[
                ("unitid", "100"),
                ("drvic2023_tuition_and_fees_2022_23", "52000"),
                ("drvic2023_tuition_and_fees_2023_24", "54790"),
            ])],
        }
    }

    fn merged_table() -> Table {
        Table {
            columns: vec![
                "unitid".to_string(),
                "tuitionfee_in".to_string(),
                "tuitionfee_out".to_string(),
            ],
            rows: vec![Row::from_pairs(&[
                ("unitid", "100"),
                ("tuitionfee_in", "12000"),
                ("tuitionfee_out", "34000"),
            ])],
        }
    }

    #[test]
    fn wide_columns_melt_into_long_records() {
        let records = load_tuition(&tuition_table(), &merged_table(), &EtlConfig::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tuition_year, "2022_23");
        assert_eq!(records[0].tuition_and_fees, Some(52000.0));
        assert_eq!(records[1].tuition_year, "2023_24");
        assert_eq!(records[1].tuition_and_fees, Some(54790.0));
    }

    #[test]
    fn state_split_attaches_to_the_latest_label_only() {
        let records = load_tuition(&tuition_table(), &merged_table(), &EtlConfig::default());
        let latest = records.iter().find(|r| r.tuition_year == "2023_24").unwrap();
        assert_eq!(latest.tuition_in_state, Some(12000.0));
        assert_eq!(latest.tuition_out_of_state, Some(34000.0));

        let earlier = records.iter().find(|r| r.tuition_year == "2022_23").unwrap();
        assert_eq!(earlier.tuition_in_state, None);
        assert_eq!(earlier.tuition_out_of_state, None);
    }

    #[test]
    fn unmatched_labels_produce_no_records() {
        let table = Table {
            columns: vec!["unitid".to_string()],
            rows: vec![Row::from_pairs(&[("unitid", "100")])],
        };
        let records = load_tuition(&table, &merged_table(), &EtlConfig::default());
        assert!(records.is_empty());
    }
}
