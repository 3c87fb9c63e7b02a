use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::warn;

use crate::record::{recommendation_url, ControlRecord};

/// Only rows mapped against this controls version are kept.
const VERSION_MARKER: &str = "Version 8";

/// A qualifying row carries id, title, three IG columns, and the
/// linked-recommendations cell.
const MIN_CELLS: usize = 6;

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static SPAN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span").unwrap());
static MODAL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("wb-recommendations-linked-to-control-modal").unwrap());

static CIS_INFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CIS Control:\s*([\d.]+)\s*(.*)").unwrap());
static VERSION_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(Version \d+\)").unwrap());

/// Extract one record per (control row, linked recommendation) from a saved
/// workbench mapping page. Output follows document order of rows, then array
/// order within each row's recommendations attribute.
pub fn parse_control_table(html: &str) -> Vec<ControlRecord> {
    let doc = Html::parse_document(html);
    let mut records = Vec::new();

    for row in doc.select(&ROW_SEL) {
        let cells: Vec<ElementRef> = row.select(&CELL_SEL).collect();
        if cells.len() < MIN_CELLS {
            continue;
        }

        let control_id = cell_text(&cells[0]);
        let control_title = cell_text(&cells[1]);

        // IG1..IG3: a nested <span> marks the tier as applicable.
        let ig: Vec<&str> = cells[2..5]
            .iter()
            .map(|c| {
                if c.select(&SPAN_SEL).next().is_some() {
                    "o"
                } else {
                    "-"
                }
            })
            .collect();

        let Some(modal) = cells[5].select(&MODAL_SEL).next() else {
            continue;
        };
        let Some(raw) = modal.value().attr("recommendations") else {
            continue;
        };
        if !modal
            .value()
            .attr("title")
            .unwrap_or("")
            .contains(VERSION_MARKER)
        {
            continue;
        }

        // The attribute holds entity-escaped JSON; entities are already
        // decoded by the HTML parser.
        let recommendations: Vec<Value> = match serde_json::from_str(raw) {
            Ok(recs) => recs,
            Err(e) => {
                warn!("row {}: bad recommendations JSON, skipping: {}", control_id, e);
                continue;
            }
        };

        for rec in &recommendations {
            records.push(build_record(&control_id, &control_title, &ig, rec));
        }
    }

    records
}

fn build_record(control_id: &str, control_title: &str, ig: &[&str], rec: &Value) -> ControlRecord {
    let field = |key: &str| rec.get(key).cloned().unwrap_or(Value::Null);
    let pivot = |key: &str| {
        rec.get("pivot")
            .and_then(|p| p.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let section_id = field("section_id");
    let pivot_recommendation_id = pivot("recommendation_id");
    let url = recommendation_url(&section_id, &pivot_recommendation_id);

    ControlRecord {
        control_id: control_id.to_string(),
        control_title: control_title.to_string(),
        ig1: ig[0].to_string(),
        ig2: ig[1].to_string(),
        ig3: ig[2].to_string(),
        section_id,
        recommendation_id: field("id"),
        view_level: field("view_level"),
        title: field("title"),
        pivot_control_id: pivot("control_id"),
        pivot_recommendation_id,
        url,
    }
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Split a control title like
/// `"CIS Control: 16.5 Use Up-to-Date Components (Version 8)"` into its
/// segment and cleaned title. Best effort: anything that does not match the
/// expected shape yields `(None, None)`.
pub fn extract_cis_info(control_title: &str) -> (Option<String>, Option<String>) {
    if control_title.is_empty() {
        return (None, None);
    }
    match CIS_INFO_RE.captures(control_title) {
        Some(caps) => {
            let segment = caps[1].to_string();
            let title = VERSION_SUFFIX_RE
                .replace_all(&caps[2], "")
                .trim()
                .to_string();
            (Some(segment), Some(title))
        }
        None => (None, None),
    }
}

// ── Tests ──
