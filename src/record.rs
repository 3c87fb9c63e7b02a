use serde::{Deserialize, Serialize};
use serde_json::Value;

const WORKBENCH_BASE: &str = "https://workbench.cisecurity.org";

/// One (control, linked recommendation) pair from the mapping table.
///
/// Recommendation ids arrive as JSON numbers or strings depending on the
/// workbench export, so they are carried through as raw values; a missing
/// nested field (e.g. no `pivot` object) is null, never a row failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRecord {
    pub control_id: String,
    pub control_title: String,
    #[serde(rename = "IG1")]
    pub ig1: String,
    #[serde(rename = "IG2")]
    pub ig2: String,
    #[serde(rename = "IG3")]
    pub ig3: String,
    pub section_id: Value,
    pub recommendation_id: Value,
    pub view_level: Value,
    pub title: Value,
    pub pivot_control_id: Value,
    pub pivot_recommendation_id: Value,
    pub url: String,
}

/// Detail-page fields fetched per recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationDetail {
    pub assessment_status: String,
    pub applicable_profiles: Vec<Value>,
    pub description: String,
    pub rationale_statement: String,
    pub impact_statement: String,
    pub audit_procedure: String,
    pub remediation_procedure: String,
    pub default_value: String,
}

/// Shallow merge of a record and its optional detail: both flatten into one
/// JSON object, detail fields last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub control: ControlRecord,
    #[serde(flatten)]
    pub detail: Option<RecommendationDetail>,
}

/// Detail-page URL for a recommendation, with numeric ids rendered bare.
pub fn recommendation_url(section_id: &Value, pivot_recommendation_id: &Value) -> String {
    format!(
        "{}/sections/{}/recommendations/{}",
        WORKBENCH_BASE,
        scalar_to_string(section_id),
        scalar_to_string(pivot_recommendation_id),
    )
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
