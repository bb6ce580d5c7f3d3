use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;
use serde::Serialize;

/// Broad subject-area labels keyed by 2-digit CIP root. Roots outside this
/// table resolve to no family and contribute no aggregation weight.
pub static CIP_FAMILY_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("01", "Agriculture & Natural Resources"),
        ("03", "Natural Resources & Conservation"),
        ("04", "Architecture & Planning"),
        ("05", "Area, Ethnic & Cultural Studies"),
        ("09", "Communication & Journalism"),
        ("10", "Communications Technologies"),
        ("11", "Computer & Information Sciences"),
        ("12", "Personal & Culinary Services"),
        ("13", "Education"),
        ("14", "Engineering"),
        ("15", "Engineering Technologies"),
        ("16", "Foreign Languages & Linguistics"),
        ("19", "Family & Consumer Sciences"),
        ("22", "Legal Studies"),
        ("23", "English Language & Literature"),
        ("24", "Liberal Arts & Humanities"),
        ("25", "Library Science"),
        ("26", "Biological & Biomedical Sciences"),
        ("27", "Mathematics & Statistics"),
        ("29", "Military Technologies"),
        ("30", "Multidisciplinary Studies"),
        ("31", "Parks, Recreation & Fitness"),
        ("38", "Philosophy & Religious Studies"),
        ("39", "Theology & Religious Vocations"),
        ("40", "Physical Sciences"),
        ("41", "Science Technologies"),
        ("42", "Psychology"),
        ("43", "Homeland Security & Law Enforcement"),
        ("44", "Public Administration & Social Service"),
        ("45", "Social Sciences"),
        ("46", "Construction Trades"),
        ("47", "Mechanic & Repair Technologies"),
        ("48", "Precision Production"),
        ("49", "Transportation & Materials Moving"),
        ("50", "Visual & Performing Arts"),
        ("51", "Health Professions"),
        ("52", "Business, Management & Marketing"),
        ("54", "History"),
    ])
});

/// The three granularities of one CIP code. `two` is present for every
/// non-empty code; `four` and `six` only when the code carries enough
/// fractional digits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CipLevels {
    pub two: Option<String>,
    pub four: Option<String>,
    pub six: Option<String>,
}

fn zero_pad_left(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        value.to_string()
    } else {
        format!("{}{}", "0".repeat(width - len), value)
    }
}

/// Split a raw program-classification code into its 2/4/6-digit levels.
///
/// `"14"` → two only; `"14.08"` → two + four; `"14.0801"` → all three.
/// Fractional parts shorter than two digits are zero-padded on the left
/// (`"14.8"` → `"14.08"`); six-digit fractions shorter than four digits are
/// padded on the right.
pub fn parse_cip(raw: &str) -> CipLevels {
    let code = raw.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if code.is_empty() {
        return CipLevels::default();
    }

    let Some((head, tail)) = code.split_once('.') else {
        return CipLevels {
            two: Some(zero_pad_left(code, 2)),
            four: None,
            six: None,
        };
    };

    let head = zero_pad_left(head, 2);
    let tail = tail.trim();
    let tail_len = tail.chars().count();

    if tail_len <= 2 {
        let four = format!("{}.{}", head, zero_pad_left(tail, 2));
        return CipLevels {
            two: Some(head),
            four: Some(four),
            six: None,
        };
    }

    let four_frac: String = tail.chars().take(2).collect();
    let mut six_frac: String = tail.chars().take(4).collect();
    while six_frac.chars().count() < 4 {
        six_frac.push('0');
    }
    CipLevels {
        four: Some(format!("{}.{}", head, four_frac)),
        six: Some(format!("{}.{}", head, six_frac)),
        two: Some(head),
    }
}

/// Look up the fixed family label for a code's 2-digit root.
pub fn cip_family(raw: &str) -> Option<&'static str> {
    let root = parse_cip(raw).two?;
    CIP_FAMILY_MAP.get(root.as_str()).copied()
}

/// Normalize a program title: strip balanced surrounding quotes repeatedly,
/// then remove stray quote and asterisk characters.
pub fn clean_title(raw: &str) -> String {
    let mut s = raw.trim();
    while s.chars().count() >= 2 {
        let first = s.chars().next().unwrap();
        let last = s.chars().last().unwrap();
        if first != last || (first != '"' && first != '\'') {
            break;
        }
        s = s[first.len_utf8()..s.len() - last.len_utf8()].trim();
    }
    s.replace(['"', '\'', '*'], "").trim().to_string()
}

/// Global CIP title maps plus per-institution level membership, accumulated
/// across the program-offering extract. Titles attach at first sighting per
/// level; later duplicates never overwrite.
#[derive(Debug, Default, Serialize)]
pub struct CipCatalog {
    pub two_digit: BTreeMap<String, String>,
    pub four_digit: BTreeMap<String, String>,
    pub six_digit: BTreeMap<String, String>,
    #[serde(skip)]
    memberships: BTreeMap<u32, CipMembership>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CipMembership {
    pub two_digit: BTreeSet<String>,
    pub four_digit: BTreeSet<String>,
    pub six_digit: BTreeSet<String>,
}

impl CipCatalog {
    pub fn observe(&mut self, unitid: u32, levels: &CipLevels, title: Option<&str>) {
        let membership = self.memberships.entry(unitid).or_default();
        let cleaned = title.map(clean_title).filter(|t| !t.is_empty());

        if let Some(two) = &levels.two {
            membership.two_digit.insert(two.clone());
            if let Some(t) = &cleaned {
                self.two_digit.entry(two.clone()).or_insert_with(|| t.clone());
            }
        }
        if let Some(four) = &levels.four {
            membership.four_digit.insert(four.clone());
            if let Some(t) = &cleaned {
                self.four_digit.entry(four.clone()).or_insert_with(|| t.clone());
            }
        }
        if let Some(six) = &levels.six {
            membership.six_digit.insert(six.clone());
            if let Some(t) = &cleaned {
                self.six_digit.entry(six.clone()).or_insert_with(|| t.clone());
            }
        }
    }

    pub fn memberships(&self) -> &BTreeMap<u32, CipMembership> {
        &self.memberships
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_digit_code_yields_root_only() {
        let levels = parse_cip("14");
        assert_eq!(levels.two.as_deref(), Some("14"));
        assert_eq!(levels.four, None);
        assert_eq!(levels.six, None);
    }

    #[test]
    fn four_digit_code_yields_two_levels() {
        let levels = parse_cip("14.08");
        assert_eq!(levels.two.as_deref(), Some("14"));
        assert_eq!(levels.four.as_deref(), Some("14.08"));
        assert_eq!(levels.six, None);
    }

    #[test]
    fn six_digit_code_yields_all_levels() {
        let levels = parse_cip("14.0801");
        assert_eq!(levels.two.as_deref(), Some("14"));
        assert_eq!(levels.four.as_deref(), Some("14.08"));
        assert_eq!(levels.six.as_deref(), Some("14.0801"));
    }

    #[test]
    fn empty_code_yields_nothing() {
        assert_eq!(parse_cip(""), CipLevels::default());
        assert_eq!(parse_cip("  "), CipLevels::default());
    }

    #[test]
    fn short_head_and_fraction_are_padded() {
        let levels = parse_cip("1.8");
        assert_eq!(levels.two.as_deref(), Some("01"));
        assert_eq!(levels.four.as_deref(), Some("01.08"));

        let levels = parse_cip("14.080");
        assert_eq!(levels.four.as_deref(), Some("14.08"));
        assert_eq!(levels.six.as_deref(), Some("14.0800"));
    }

    #[test]
    fn longer_fractions_are_truncated_to_six_digit() {
        let levels = parse_cip("51.380101");
        assert_eq!(levels.four.as_deref(), Some("51.38"));
        assert_eq!(levels.six.as_deref(), Some("51.3801"));
    }

    #[test]
    fn quoted_codes_are_unwrapped() {
        assert_eq!(parse_cip("'14.0801'").six.as_deref(), Some("14.0801"));
    }

    #[test]
    fn family_lookup_uses_the_root() {
        assert_eq!(cip_family("11.0701"), Some("Computer & Information Sciences"));
        assert_eq!(cip_family("99.99"), None);
        assert_eq!(cip_family("1"), Some("Agriculture & Natural Resources"));
    }

    #[test]
    fn titles_attach_first_and_never_overwrite() {
        let mut catalog = CipCatalog::default();
        catalog.observe(100, &parse_cip("11.0701"), Some("Computer Science"));
        catalog.observe(200, &parse_cip("11.0701"), Some("Informatics"));

        assert_eq!(catalog.six_digit.get("11.0701").unwrap(), "Computer Science");
        assert_eq!(catalog.memberships().len(), 2);
        assert!(catalog.memberships()[&200].two_digit.contains("11"));
    }

    #[test]
    fn titles_are_cleaned() {
        assert_eq!(clean_title("'Computer Science*'"), "Computer Science");
        assert_eq!(clean_title("\"\"Nested\"\""), "Nested");
        assert_eq!(clean_title("  plain  "), "plain");
    }
}
