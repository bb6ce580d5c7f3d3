use url::Url;

/// Collapse the survey's verbose control-of-institution text into the three
/// canonical labels. Unrecognized text passes through unchanged.
pub fn simplify_control(raw: &str) -> String {
    let t = raw.to_lowercase();
    if t.contains("public") {
        "Public".to_string()
    } else if t.contains("private not-for-profit") || t.contains("private not for profit") {
        "Private nonprofit".to_string()
    } else if t.contains("private for-profit") || t.contains("private for profit") {
        "Private for-profit".to_string()
    } else {
        raw.to_string()
    }
}

/// Collapse level-of-institution text into 4-year / 2-year / <2-year.
/// The "less than 2" check runs before the generic 2-year match so
/// sub-associate programs classify correctly.
pub fn simplify_level(raw: &str) -> String {
    let t = raw.to_lowercase();
    if t.contains("four or more years") || t.contains("4-year") {
        "4-year".to_string()
    } else if t.contains("less than 2") || t.contains("<2") {
        "<2-year".to_string()
    } else if t.contains('2') && t.contains("year") {
        "2-year".to_string()
    } else {
        raw.to_string()
    }
}

/// num/den as a percentage. Absent operands or a zero denominator are
/// statistically undefined and stay absent.
pub fn pct(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d * 100.0),
        _ => None,
    }
}

/// Round an optional float to the nearest integer.
pub fn iround(value: Option<f64>) -> Option<i64> {
    value.filter(|v| v.is_finite()).map(|v| v.round() as i64)
}

/// `secondary_school_gpa` → `Secondary School Gpa`, matching the survey's
/// human-readable criterion labels.
pub fn title_case_field(field: &str) -> String {
    field
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clean an official URL: prepend https when the scheme is missing,
/// lower-case scheme and host, collapse duplicate slashes in the path.
/// Input the parser rejects passes through trimmed rather than being lost.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_lowercase();
    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&with_scheme) {
        Ok(mut parsed) => {
            let collapsed = collapse_slashes(parsed.path());
            if collapsed != parsed.path() {
                parsed.set_path(&collapsed);
            }
            Some(parsed.to_string())
        }
        Err(_) => Some(with_scheme),
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}
