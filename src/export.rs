use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Columns whose values spreadsheets would otherwise coerce to numbers or
/// dates; a leading apostrophe forces text interpretation.
const TEXT_FORCED_COLUMNS: [&str; 2] = ["control_id", "view_level"];

/// Convert a JSON array file into an always-quoted CSV written next to it
/// (`<input>.csv`). Returns the path written.
pub fn json_to_csv(input: &Path) -> Result<PathBuf> {
    let data = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let rows: Vec<Map<String, Value>> = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a JSON array of objects", input.display()))?;

    let output = PathBuf::from(format!("{}.csv", input.display()));
    write_csv(&rows, &output)?;
    Ok(output)
}

fn write_csv(rows: &[Map<String, Value>], output: &Path) -> Result<()> {
    // Column set: union of keys across all rows, first-seen order.
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_path(output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|col| cell_value(col, row.get(col)))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Render one cell, applying the spreadsheet fixups.
fn cell_value(column: &str, value: Option<&Value>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    if column == "applicable_profiles" {
        if let Value::Array(profiles) = value {
            return flatten_profiles(profiles);
        }
    }

    let mut text = render_scalar(value);
    if TEXT_FORCED_COLUMNS.contains(&column) {
        text.insert(0, '\'');
    }
    text
}

/// Comma-join profile titles; profiles without a title are dropped.
fn flatten_profiles(profiles: &[Value]) -> String {
    profiles
        .iter()
        .filter_map(|p| p.get("title").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Residual arrays/objects keep their compact JSON form.
        other => other.to_string(),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profiles_flatten_to_titles() {
        let profiles = vec![json!({"title": "A"}), json!({"title": "B"}), json!({"foo": "x"})];
        assert_eq!(flatten_profiles(&profiles), "A, B");
    }

    #[test]
    fn column_union_keeps_first_seen_order() {
        let rows: Vec<Map<String, Value>> = serde_json::from_value(json!([
            {"b": 1, "a": 2},
            {"a": 3, "c": 4}
        ]))
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rows.csv");
        write_csv(&rows, &out).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, r#""b","a","c""#);
    }

    #[test]
    fn round_trip_preserves_rows_and_prefixes_ids() {
        let records = json!([
            {
                "control_id": "16.5",
                "view_level": "L1",
                "title": "First",
                "applicable_profiles": [{"title": "A"}, {"title": "B"}, {"foo": "x"}]
            },
            {
                "control_id": "2.1",
                "view_level": "L2",
                "title": "Second",
                "applicable_profiles": []
            }
        ]);

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("mapping.json");
        std::fs::write(&input, serde_json::to_string_pretty(&records).unwrap()).unwrap();

        let output = json_to_csv(&input).unwrap();
        assert_eq!(output, dir.path().join("mapping.json.csv"));

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.get(0).unwrap().starts_with('\'')));
        assert_eq!(rows[0].get(3).unwrap(), "A, B");
        assert_eq!(rows[1].get(3).unwrap(), "");
    }

    #[test]
    fn every_field_is_quoted() {
        let rows: Vec<Map<String, Value>> =
            serde_json::from_value(json!([{"control_id": "7", "n": 3, "none": null}])).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("rows.csv");
        write_csv(&rows, &out).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().nth(1).unwrap(), r#""'7","3","""#);
    }

    #[test]
    fn nested_values_render_as_json() {
        assert_eq!(cell_value("x", Some(&json!({"k": 1}))), r#"{"k":1}"#);
        assert_eq!(cell_value("x", Some(&json!(null))), "");
        assert_eq!(cell_value("x", None), "");
        assert_eq!(cell_value("view_level", Some(&json!("L1"))), "'L1");
    }
}
