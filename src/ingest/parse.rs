//! CSV and JSON table parsing
//!
//! The upstream pipeline's tables come out of pandas and hand-rerun
//! notebook stages, so this parser is tolerant where tolerance is safe
//! and strict where it is not:
//!
//! * **Tolerant**: ragged rows, stray whitespace, UTF-8 BOMs, unnamed
//!   index columns, columns that appear mid-season. Header names are
//!   normalized to ASCII lowercase so `Label` and `label` are one column.
//! * **Strict**: malformed CSV structure, invalid JSON, and empty files
//!   are parse errors. A classified file that fails to parse aborts the
//!   whole batch upstream, so these errors carry the detail a user needs.
//!
//! Cell typing is best effort: a trimmed field becomes `Num` when it
//! parses as a finite `f64`, an empty field becomes absence (no key in
//! the row), anything else stays `Text`. `NaN`/`inf` spellings parse as
//! floats but are not finite, so they stay text and read as absent
//! numbers downstream.

use crate::ingest::classify::TableKind;
use crate::store::{Cell, Row, Table};
use thiserror::Error;

/// Why a classified file could not be turned into a table.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file is empty")]
    Empty,
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a json object of scalar stats")]
    NotAnObject,
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn type_field(field: &str) -> Option<Cell> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Some(Cell::Num(n)),
        _ => Some(Cell::Text(trimmed.to_string())),
    }
}

/// Parse CSV text into a table of the given kind.
///
/// The first record is the header. Columns with an empty header name
/// (pandas writes its index that way) are dropped. Rows shorter than the
/// header simply lack those keys; fields beyond the header are ignored.
pub fn parse_csv(kind: TableKind, text: &str) -> Result<Table, ParseError> {
    let text = strip_bom(text);
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            if header.is_empty() {
                continue;
            }
            if let Some(cell) = type_field(field) {
                row.set(header.clone(), cell);
            }
        }
        rows.push(row);
    }
    Ok(Table::new(kind, rows))
}

/// Parse a basic-stats JSON object into a row of scalar cells.
///
/// Only top-level scalars are kept: numbers (finite), strings, and bools
/// (as `"true"`/`"false"` text). Nulls and nested values are dropped.
pub fn parse_basic_stats(text: &str) -> Result<Row, ParseError> {
    let text = strip_bom(text);
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let value: serde_json::Value = serde_json::from_str(text)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let mut row = Row::new();
    for (key, value) in object {
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        match value {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64().filter(|f| f.is_finite()) {
                    row.set_num(key, f);
                }
            }
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    row.set_text(key, trimmed);
                }
            }
            serde_json::Value::Bool(b) => {
                row.set_text(key, if *b { "true" } else { "false" });
            }
            _ => {}
        }
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // CSV PARSING TESTS
    // ==========================================================================

    #[test]
    fn parses_a_distribution_table() {
        let table = parse_csv(
            TableKind::DanmakuEmoDist,
            "label,count,ratio\njoy,10,0.5\nanger,4,0.2\n",
        )
        .unwrap();

        assert_eq!(table.kind, TableKind::DanmakuEmoDist);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].text("label"), Some("joy"));
        assert_eq!(table.rows[0].num("count"), Some(10.0));
        assert_eq!(table.rows[1].num("ratio"), Some(0.2));
    }

    #[test]
    fn headers_are_trimmed_and_lowercased() {
        let table = parse_csv(
            TableKind::TopTermsDanmaku,
            " Term , COUNT \nhello,12\n",
        )
        .unwrap();
        assert_eq!(table.rows[0].text("term"), Some("hello"));
        assert_eq!(table.rows[0].num("count"), Some(12.0));
    }

    #[test]
    fn empty_fields_are_absent_not_zero() {
        let table = parse_csv(TableKind::DanmakuEmoDist, "label,ratio\njoy,\n").unwrap();
        assert_eq!(table.rows[0].num("ratio"), None);
        assert_eq!(table.rows[0].num_or("ratio", 0.0), 0.0);
    }

    #[test]
    fn non_finite_numbers_stay_text() {
        let table = parse_csv(
            TableKind::MinuteEmoCurve,
            "minute,total\nNaN,inf\n3,1e3\n",
        )
        .unwrap();
        assert_eq!(table.rows[0].num("minute"), None);
        assert_eq!(table.rows[0].text("minute"), Some("NaN"));
        assert_eq!(table.rows[0].num("total"), None);
        // scientific notation is a normal float
        assert_eq!(table.rows[1].num("total"), Some(1000.0));
    }

    #[test]
    fn numeric_looking_labels_become_numbers_with_canonical_labels() {
        // Best-effort typing turns "03" into Num(3.0); the canonical label
        // form is what category matching reads.
        let table = parse_csv(TableKind::DanmakuFuncDist, "label,ratio\n03,0.4\n").unwrap();
        assert_eq!(table.rows[0].text("label"), None);
        assert_eq!(table.rows[0].label("label"), Some("3".to_string()));
    }

    #[test]
    fn ragged_rows_are_tolerated() {
        let table = parse_csv(
            TableKind::Burst2s,
            "start_s,text,count\n10,hello\n12,bye,3,EXTRA\n",
        )
        .unwrap();
        assert_eq!(table.rows[0].num("start_s"), Some(10.0));
        assert_eq!(table.rows[0].num("count"), None);
        assert_eq!(table.rows[1].num("count"), Some(3.0));
        assert_eq!(table.rows[1].len(), 3);
    }

    #[test]
    fn unnamed_index_column_is_dropped() {
        let table = parse_csv(TableKind::TopTermsComment, ",term,count\n0,hi,4\n").unwrap();
        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[0].text("term"), Some("hi"));
    }

    #[test]
    fn header_only_file_is_a_valid_empty_table() {
        let table = parse_csv(TableKind::DanmakuEmoDist, "label,count,ratio\n").unwrap();
        assert!(table.rows.is_empty());
    }

    #[test]
    fn empty_and_bom_inputs() {
        assert!(matches!(
            parse_csv(TableKind::DanmakuEmoDist, "   \n"),
            Err(ParseError::Empty)
        ));
        let table = parse_csv(
            TableKind::DanmakuEmoDist,
            "\u{feff}label,ratio\njoy,0.5\n",
        )
        .unwrap();
        assert_eq!(table.rows[0].text("label"), Some("joy"));
    }

    // ==========================================================================
    // JSON BASIC-STATS TESTS
    // ==========================================================================

    #[test]
    fn keeps_top_level_scalars_only() {
        let row = parse_basic_stats(
            r#"{
                "danmaku_total": 5321,
                "avg_per_minute": 12.5,
                "source": "bilibili",
                "has_comments": true,
                "missing": null,
                "per_part": [1, 2],
                "nested": {"a": 1}
            }"#,
        )
        .unwrap();

        assert_eq!(row.num("danmaku_total"), Some(5321.0));
        assert_eq!(row.num("avg_per_minute"), Some(12.5));
        assert_eq!(row.text("source"), Some("bilibili"));
        assert_eq!(row.text("has_comments"), Some("true"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get("per_part"), None);
        assert_eq!(row.get("nested"), None);
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn rejects_non_object_and_invalid_json() {
        assert!(matches!(
            parse_basic_stats("[1, 2, 3]"),
            Err(ParseError::NotAnObject)
        ));
        assert!(matches!(
            parse_basic_stats("{broken"),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(parse_basic_stats("  "), Err(ParseError::Empty)));
    }
}
