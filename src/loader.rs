use std::collections::HashMap;
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{EtlError, Result};

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

/// Collapse a raw header into the canonical form shared by every extract:
/// BOM stripped, trimmed, lower-cased, runs of non-alphanumeric characters
/// become a single underscore, edge underscores dropped.
pub fn normalize_column(raw: &str) -> String {
    let trimmed = raw.replace('\u{feff}', "");
    let collapsed = NON_ALNUM.replace_all(trimmed.trim(), "_");
    collapsed.trim_matches('_').to_lowercase()
}

/// Text encodings attempted when reading an extract, in preference order.
/// Windows-1252 rejects the five code points the encoding leaves undefined;
/// Latin-1 accepts any byte and is the final fallback.
#[derive(Debug, Clone, Copy)]
enum TextEncoding {
    Utf8,
    Utf8Bom,
    Windows1252,
    Latin1,
}

const ENCODING_CANDIDATES: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Utf8Bom,
    TextEncoding::Windows1252,
    TextEncoding::Latin1,
];

fn decode(bytes: &[u8], encoding: TextEncoding) -> Option<String> {
    match encoding {
        TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
        TextEncoding::Utf8Bom => bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF])
            .and_then(|rest| std::str::from_utf8(rest).ok())
            .map(str::to_owned),
        TextEncoding::Windows1252 => bytes.iter().map(|&b| windows_1252_char(b)).collect(),
        TextEncoding::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
    }
}

fn windows_1252_char(byte: u8) -> Option<char> {
    match byte {
        0x80 => Some('\u{20AC}'),
        0x82 => Some('\u{201A}'),
        0x83 => Some('\u{0192}'),
        0x84 => Some('\u{201E}'),
        0x85 => Some('\u{2026}'),
        0x86 => Some('\u{2020}'),
        0x87 => Some('\u{2021}'),
        0x88 => Some('\u{02C6}'),
        0x89 => Some('\u{2030}'),
        0x8A => Some('\u{0160}'),
        0x8B => Some('\u{2039}'),
        0x8C => Some('\u{0152}'),
        0x8E => Some('\u{017D}'),
        0x91 => Some('\u{2018}'),
        0x92 => Some('\u{2019}'),
        0x93 => Some('\u{201C}'),
        0x94 => Some('\u{201D}'),
        0x95 => Some('\u{2022}'),
        0x96 => Some('\u{2013}'),
        0x97 => Some('\u{2014}'),
        0x98 => Some('\u{02DC}'),
        0x99 => Some('\u{2122}'),
        0x9A => Some('\u{0161}'),
        0x9B => Some('\u{203A}'),
        0x9C => Some('\u{0153}'),
        0x9E => Some('\u{017E}'),
        0x9F => Some('\u{0178}'),
        // undefined in Windows-1252
        0x81 | 0x8D | 0x8F | 0x90 | 0x9D => None,
        other => Some(other as char),
    }
}

/// Pick the header delimiter by counting candidates on the first line.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .map(|d| (header.matches(d as char).count(), d))
        .max_by_key(|(count, _)| *count)
        .filter(|(count, _)| *count > 0)
        .map(|(_, d)| d)
        .unwrap_or(b',')
}

/// One parsed row, keyed by normalized column name. Empty and
/// whitespace-only cells are not stored, so a missing key means "absent".
#[derive(Debug, Clone, Default)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Numeric coercion: unparseable values are treated as absent.
    pub fn f64(&self, column: &str) -> Option<f64> {
        self.get(column)?.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    pub fn i64(&self, column: &str) -> Option<i64> {
        self.f64(column).map(|v| v.round() as i64)
    }

    pub fn u32(&self, column: &str) -> Option<u32> {
        let value = self.f64(column)?;
        if value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64 {
            Some(value as u32)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Row {
        let cells = pairs
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.to_string(), v.trim().to_string()))
            .collect();
        Row { cells }
    }
}

/// A fully materialized extract with normalized column names.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Read a delimited extract, trying each encoding candidate until one
    /// decodes and parses. A file that defeats all candidates is fatal.
    pub fn read(path: &Path) -> Result<Table> {
        let bytes = fs::read(path).map_err(|e| EtlError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut last_error = String::from("no encoding candidate matched");
        for encoding in ENCODING_CANDIDATES {
            let Some(text) = decode(&bytes, encoding) else {
                continue;
            };
            match parse_table(&text) {
                Ok(table) => {
                    debug!(path = %path.display(), encoding = ?encoding, columns = table.columns.len(), rows = table.rows.len(), "read extract");
                    return Ok(table);
                }
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(EtlError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: last_error,
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

fn parse_table(text: &str) -> std::result::Result<Table, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .delimiter(sniff_delimiter(text))
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_column).collect();

    // Keep the first occurrence of each name, and drop `_1` variants left
    // behind by an upstream join when the base column is also present.
    let mut kept: Vec<(usize, String)> = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if name.is_empty() || kept.iter().any(|(_, k)| k == name) {
            continue;
        }
        if let Some(base) = name.strip_suffix("_1") {
            if headers.iter().any(|h| h == base) {
                continue;
            }
        }
        kept.push((idx, name.clone()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut cells = HashMap::new();
        for (idx, name) in &kept {
            if let Some(value) = record.get(*idx) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    cells.insert(name.clone(), trimmed.to_string());
                }
            }
        }
        rows.push(Row { cells });
    }

    Ok(Table {
        columns: kept.into_iter().map(|(_, name)| name).collect(),
        rows,
    })
}
