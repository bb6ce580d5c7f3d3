use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cip::{cip_family, parse_cip, CipCatalog};
use crate::loader::Table;

/// Headcount columns recognized as program weight, in preference order.
const WEIGHT_COLUMNS: [&str; 3] = ["ctotalt", "ctotalb", "ctotalm"];

/// Program-code column variants across extract vintages.
const CODE_COLUMNS: [&str; 2] = ["cipcode", "cip_code_2020_classification"];

const TITLE_COLUMNS: [&str; 2] = ["ciptitle", "cip_title"];

/// At most this many family labels survive per institution.
pub const TOP_FAMILIES: usize = 4;

/// Result of one pass over the program-offering extract: ranked family
/// labels per institution plus the CIP title catalog.
#[derive(Debug, Default)]
pub struct MajorAggregation {
    pub families_by_institution: HashMap<u32, Vec<String>>,
    pub catalog: CipCatalog,
}

/// Accumulate per-program weight into family totals and keep each
/// institution's top families by descending weight. Rows whose root is not
/// in the family table contribute nothing; institutions with no resolvable
/// rows end up with an empty list.
pub fn derive_major_families(table: &Table) -> MajorAggregation {
    let Some(code_column) = CODE_COLUMNS.iter().copied().find(|c| table.has_column(c)) else {
        warn!("offerings extract has no program-code column; no families derived");
        return MajorAggregation::default();
    };
    if !table.has_column("unitid") {
        warn!("offerings extract has no unitid column; no families derived");
        return MajorAggregation::default();
    }
    let weight_column = WEIGHT_COLUMNS.iter().copied().find(|c| table.has_column(c));
    let title_column = TITLE_COLUMNS.iter().copied().find(|c| table.has_column(c));

    // Vec keeps first-seen order so equal weights tie-break stably
    let mut totals: HashMap<u32, Vec<(String, f64)>> = HashMap::new();
    let mut catalog = CipCatalog::default();

    for row in &table.rows {
        let Some(unitid) = row.u32("unitid") else {
            continue;
        };
        let Some(code) = row.get(code_column) else {
            continue;
        };
        let levels = parse_cip(code);
        catalog.observe(unitid, &levels, title_column.and_then(|c| row.get(c)));

        let Some(family) = cip_family(code) else {
            continue;
        };
        let weight = match weight_column {
            Some(column) => row.f64(column).unwrap_or(0.0),
            None => 1.0,
        };

        let families = totals.entry(unitid).or_default();
        match families.iter_mut().find(|(name, _)| name == family) {
            Some((_, total)) => *total += weight,
            None => families.push((family.to_string(), weight)),
        }
    }

    let families_by_institution = totals
        .into_iter()
        .map(|(unitid, mut families)| {
            families.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            let top: Vec<String> = families
                .into_iter()
                .take(TOP_FAMILIES)
                .map(|(name, _)| name)
                .collect();
            (unitid, top)
        })
        .collect();

    debug!(
        institutions = catalog.memberships().len(),
        "aggregated major families"
    );
    MajorAggregation {
        families_by_institution,
        catalog,
    }
}
