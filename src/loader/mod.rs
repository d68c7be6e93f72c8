//! CSV loading with encoding and delimiter trial.
//!
//! Input files come from many export pipelines: the encoding and the field
//! delimiter are not guaranteed. The loader tries a deterministic ordered
//! list of encodings crossed with delimiters and accepts the *first*
//! combination that decodes cleanly and parses as a well-formed delimited
//! table. Column types are inferred afterwards, per column.
//!
//! Trial order: `utf-8`, `latin-1`, `utf-16` (BOM required), `utf-16le`,
//! `utf-16be`, each crossed with `,`, `;` and tab. The order is part of the
//! contract: a file that parses under more than one combination gets the
//! earliest one.

use std::collections::HashSet;
use std::path::Path;

use encoding_rs::{UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::table::{Column, Dtype, RawTable, Value};

// =============================================================================
// Trial Tables
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Codec {
    Utf8,
    Latin1,
    /// UTF-16 with mandatory byte-order mark; BOM-less streams are covered
    /// by the two explicit variants that follow in the trial order.
    Utf16Bom,
    Utf16Le,
    Utf16Be,
}

const CODECS: &[Codec] = &[
    Codec::Utf8,
    Codec::Latin1,
    Codec::Utf16Bom,
    Codec::Utf16Le,
    Codec::Utf16Be,
];

const DELIMITERS: &[(char, u8)] = &[(',', b','), (';', b';'), ('\t', b'\t')];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

impl Codec {
    fn name(self) -> &'static str {
        match self {
            Codec::Utf8 => "utf-8",
            Codec::Latin1 => "latin-1",
            Codec::Utf16Bom => "utf-16",
            Codec::Utf16Le => "utf-16le",
            Codec::Utf16Be => "utf-16be",
        }
    }

    /// Strict decode: any malformed sequence rejects the candidate.
    ///
    /// A decoded text containing NUL is also rejected: 16-bit encodings of
    /// 8-bit text decode "successfully" under utf-8 and latin-1 as text
    /// riddled with NULs, which would shadow the utf-16 trials entirely.
    fn decode(self, bytes: &[u8]) -> Option<String> {
        let (text, had_errors) = match self {
            Codec::Utf8 => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                UTF_8.decode_without_bom_handling(body)
            }
            Codec::Latin1 => WINDOWS_1252.decode_without_bom_handling(bytes),
            Codec::Utf16Bom => match bytes {
                [0xFF, 0xFE, rest @ ..] => UTF_16LE.decode_without_bom_handling(rest),
                [0xFE, 0xFF, rest @ ..] => UTF_16BE.decode_without_bom_handling(rest),
                _ => return None,
            },
            Codec::Utf16Le => UTF_16LE.decode_without_bom_handling(bytes),
            Codec::Utf16Be => UTF_16BE.decode_without_bom_handling(bytes),
        };
        if had_errors || text.contains('\u{0}') {
            return None;
        }
        Some(text.into_owned())
    }
}

// =============================================================================
// LoadedTable
// =============================================================================

/// A parsed table together with the accepted format combination,
/// reported back to the user for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub table: RawTable,
    pub encoding: &'static str,
    pub delimiter: char,
}

// =============================================================================
// Loading
// =============================================================================

/// Load a delimited text file from raw bytes.
pub fn load_bytes(bytes: &[u8]) -> LoadResult<LoadedTable> {
    if bytes.is_empty() {
        return Err(LoadError::EmptyFile);
    }
    for &codec in CODECS {
        let Some(text) = codec.decode(bytes) else {
            debug!(encoding = codec.name(), "decoding rejected");
            continue;
        };
        for &(delimiter, byte) in DELIMITERS {
            let Some((headers, rows)) = try_parse(&text, byte) else {
                debug!(
                    encoding = codec.name(),
                    delimiter = %delimiter,
                    "combination rejected"
                );
                continue;
            };
            let table = build_table(headers, &rows)?;
            info!(
                encoding = codec.name(),
                delimiter = %delimiter,
                rows = table.n_rows(),
                columns = table.n_columns(),
                "file loaded"
            );
            return Ok(LoadedTable {
                table,
                encoding: codec.name(),
                delimiter,
            });
        }
    }
    Err(LoadError::NoViableFormat {
        tried: CODECS.len() * DELIMITERS.len(),
    })
}

/// Load a delimited text file from disk.
pub fn load_path(path: impl AsRef<Path>) -> LoadResult<LoadedTable> {
    let bytes = std::fs::read(path)?;
    load_bytes(&bytes)
}

/// Parse the decoded text under one delimiter. `None` on a missing header
/// row or ragged record lengths; the caller moves on to the next candidate.
fn try_parse(text: &str, delimiter: u8) -> Option<(Vec<String>, Vec<csv::StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(record) => record.iter().map(str::to_string).collect(),
        Err(_) => return None,
    };
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return None;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(record),
            Err(_) => return None,
        }
    }
    Some((headers, rows))
}

fn build_table(headers: Vec<String>, rows: &[csv::StringRecord]) -> LoadResult<RawTable> {
    let headers = dedup_headers(headers);
    let columns = headers
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let cells: Vec<&str> = rows.iter().map(|r| r.get(index).unwrap_or("")).collect();
            infer_column(name, &cells)
        })
        .collect();
    Ok(RawTable::new(columns)?)
}

/// Make header names unique and non-empty so every column stays addressable
/// by name. Empty headers become `unnamed`; repeats get `_2`, `_3`, ...
fn dedup_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut out = Vec::with_capacity(headers.len());
    for raw in headers {
        let base = if raw.trim().is_empty() {
            warn!("empty header named 'unnamed'");
            "unnamed".to_string()
        } else {
            raw
        };
        let mut name = base.clone();
        let mut n = 1;
        while !seen.insert(name.clone()) {
            n += 1;
            name = format!("{base}_{n}");
        }
        if name != base {
            warn!(header = %base, renamed = %name, "duplicate header made unique");
        }
        out.push(name);
    }
    out
}

// =============================================================================
// Type Inference
// =============================================================================

/// Textual markers read as a missing cell, besides the empty field.
const NA_MARKERS: &[&str] = &["na", "n/a", "nan", "null", "none"];

fn is_missing_marker(cell: &str) -> bool {
    let trimmed = cell.trim();
    trimmed.is_empty() || NA_MARKERS.contains(&trimmed.to_lowercase().as_str())
}

/// Column dtype ladder over the non-missing cells: all `i64` makes an `Int`
/// column, else all finite `f64` makes `Float`, else `Text`. A column with
/// no values at all is numeric-missing (`Float`).
fn infer_column(name: String, cells: &[&str]) -> Column {
    let mut all_int = true;
    let mut all_float = true;
    let mut any_value = false;
    for cell in cells {
        if is_missing_marker(cell) {
            continue;
        }
        any_value = true;
        let trimmed = cell.trim();
        if trimmed.parse::<i64>().is_err() {
            all_int = false;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => {}
            _ => all_float = false,
        }
    }
    let dtype = if !any_value {
        Dtype::Float
    } else if all_int {
        Dtype::Int
    } else if all_float {
        Dtype::Float
    } else {
        Dtype::Text
    };
    let values = cells
        .iter()
        .map(|cell| {
            if is_missing_marker(cell) {
                return Value::Missing;
            }
            let trimmed = cell.trim();
            match dtype {
                Dtype::Int => trimmed.parse::<i64>().map(Value::Int).unwrap_or(Value::Missing),
                Dtype::Float => trimmed
                    .parse::<f64>()
                    .map(Value::Float)
                    .unwrap_or(Value::Missing),
                Dtype::Text => Value::Text((*cell).to_string()),
            }
        })
        .collect();
    Column::new(name, dtype, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn utf16le_bytes(text: &str, bom: bool) -> Vec<u8> {
        let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        bytes.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
        bytes
    }

    fn utf16be_bytes(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    #[test]
    fn test_load_utf8_comma_with_type_inference() {
        let loaded = load_bytes(b"jaar,sector,aantal\n2021,Zorg,50\n2022,,12.5\n").unwrap();
        assert_eq!(loaded.encoding, "utf-8");
        assert_eq!(loaded.delimiter, ',');

        let table = &loaded.table;
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.column("jaar").unwrap().dtype, Dtype::Int);
        assert_eq!(table.column("sector").unwrap().dtype, Dtype::Text);
        assert_eq!(table.column("aantal").unwrap().dtype, Dtype::Float);
        assert_eq!(
            table.column("sector").unwrap().values[1],
            Value::Missing
        );
        assert_eq!(
            table.column("aantal").unwrap().values,
            vec![Value::Float(50.0), Value::Float(12.5)]
        );
    }

    #[test]
    fn test_semicolon_detected_when_comma_parse_is_ragged() {
        let loaded = load_bytes(b"naam;aantal\nJansen, Piet;5\nVries;6\n").unwrap();
        assert_eq!(loaded.encoding, "utf-8");
        assert_eq!(loaded.delimiter, ';');
        assert_eq!(loaded.table.n_columns(), 2);
        assert_eq!(
            loaded.table.column("naam").unwrap().values[0],
            Value::Text("Jansen, Piet".into())
        );
    }

    #[test]
    fn test_tab_detected_when_comma_and_semicolon_fail() {
        let loaded =
            load_bytes(b"naam\taantal\nde Vries, Jan; directeur\t5\nx\t6\n").unwrap();
        assert_eq!(loaded.delimiter, '\t');
        assert_eq!(loaded.table.n_columns(), 2);
    }

    #[test]
    fn test_first_success_wins_even_as_single_column() {
        // No commas anywhere, so the very first trial parses the whole
        // line as one column. Earliest combination wins, by contract.
        let loaded = load_bytes(b"a;b\n1;2\n").unwrap();
        assert_eq!(loaded.delimiter, ',');
        assert_eq!(loaded.table.n_columns(), 1);
        assert_eq!(loaded.table.column_names(), vec!["a;b"]);
    }

    #[test]
    fn test_latin1_fallback() {
        let loaded = load_bytes(b"sector,aantal\nZorg \xE9n Welzijn,5\n").unwrap();
        assert_eq!(loaded.encoding, "latin-1");
        assert_eq!(
            loaded.table.column("sector").unwrap().values[0],
            Value::Text("Zorg én Welzijn".into())
        );
    }

    #[test]
    fn test_utf16_with_bom() {
        let bytes = utf16le_bytes("jaar,aantal\n2021,5\n", true);
        let loaded = load_bytes(&bytes).unwrap();
        assert_eq!(loaded.encoding, "utf-16");
        assert_eq!(loaded.delimiter, ',');
        assert_eq!(loaded.table.column("jaar").unwrap().values[0], Value::Int(2021));
    }

    #[test]
    fn test_utf16le_without_bom() {
        let bytes = utf16le_bytes("jaar,aantal\n2021,5\n", false);
        let loaded = load_bytes(&bytes).unwrap();
        assert_eq!(loaded.encoding, "utf-16le");
        assert_eq!(loaded.delimiter, ',');
        assert_eq!(loaded.table.column("aantal").unwrap().values[0], Value::Int(5));
    }

    #[test]
    fn test_utf16be_without_bom() {
        let mut bytes = utf16be_bytes("jaar,aantal\n2021,");
        // U+00D8 U+4100: valid big-endian text whose byte stream is a lone
        // surrogate when misread as little-endian, so the le trial rejects.
        bytes.extend([0x00, 0xD8, 0x41, 0x00, 0x00, 0x0A]);
        let loaded = load_bytes(&bytes).unwrap();
        assert_eq!(loaded.encoding, "utf-16be");
        assert_eq!(
            loaded.table.column("aantal").unwrap().values[0],
            Value::Text("\u{D8}\u{4100}".into())
        );
    }

    #[test]
    fn test_utf16be_ascii_is_claimed_by_the_le_trial() {
        // All-ASCII big-endian bytes decode without error as little-endian
        // high-plane characters, and the le trial comes first. The garbage
        // single-column parse wins; this mirrors the trial-order contract.
        let bytes = utf16be_bytes("jaar,aantal\n2021,5\n");
        let loaded = load_bytes(&bytes).unwrap();
        assert_eq!(loaded.encoding, "utf-16le");
        assert_eq!(loaded.table.n_columns(), 1);
    }

    #[test]
    fn test_no_viable_format() {
        // Ragged under every delimiter; odd byte length kills the utf-16
        // trials as well.
        let err = load_bytes(b"a,b;c\td\n1,2,3;4;5\t6\t7\nx").unwrap_err();
        assert!(matches!(err, LoadError::NoViableFormat { tried: 15 }));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(load_bytes(b"").unwrap_err(), LoadError::EmptyFile));
    }

    #[test]
    fn test_header_only_file_is_an_empty_table() {
        let loaded = load_bytes(b"jaar,aantal\n").unwrap();
        assert_eq!(loaded.table.n_rows(), 0);
        assert_eq!(loaded.table.n_columns(), 2);
    }

    #[test]
    fn test_duplicate_and_empty_headers_renamed() {
        let loaded = load_bytes(b"a,a,,b\n1,2,3,4\n").unwrap();
        assert_eq!(loaded.table.column_names(), vec!["a", "a_2", "unnamed", "b"]);
    }

    #[test]
    fn test_na_markers_and_all_missing_column() {
        let loaded = load_bytes(b"x,leeg\nNA,\n5,\n").unwrap();
        let x = loaded.table.column("x").unwrap();
        assert_eq!(x.dtype, Dtype::Int);
        assert_eq!(x.values, vec![Value::Missing, Value::Int(5)]);
        let leeg = loaded.table.column("leeg").unwrap();
        assert_eq!(leeg.dtype, Dtype::Float);
        assert!(leeg.values.iter().all(Value::is_missing));
    }

    #[test]
    fn test_load_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"jaar,aantal\n2021,5\n").unwrap();
        let loaded = load_path(file.path()).unwrap();
        assert_eq!(loaded.table.n_rows(), 1);
        assert_eq!(loaded.encoding, "utf-8");
    }
}
