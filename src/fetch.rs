use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::info;

use crate::record::{ControlRecord, MergedRecord, RecommendationDetail};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

/// Request configuration for workbench pages, resolved once at startup.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub cookie: String,
    pub user_agent: &'static str,
}

impl FetchConfig {
    /// Read the session cookie from the `COOKIE` environment variable.
    pub fn from_env() -> Result<Self> {
        let cookie = std::env::var("COOKIE")
            .context("COOKIE environment variable must be set for workbench requests")?;
        Ok(Self {
            cookie,
            user_agent: USER_AGENT,
        })
    }
}

/// Fetch one recommendation detail page. One GET per call, no caching, no
/// retries; network errors propagate.
pub async fn fetch_recommendation(
    client: &reqwest::Client,
    cfg: &FetchConfig,
    url: &str,
) -> Result<RecommendationDetail> {
    let html = client
        .get(url)
        .header(reqwest::header::COOKIE, &cfg.cookie)
        .header(reqwest::header::USER_AGENT, cfg.user_agent)
        .send()
        .await?
        .text()
        .await?;
    parse_recommendation(&html)
}

/// Extract the fixed detail fields from a recommendation page. Every field is
/// required; the first missing element fails the page.
pub fn parse_recommendation(html: &str) -> Result<RecommendationDetail> {
    let doc = Html::parse_document(html);

    let text_field = |id: &str| -> Result<String> {
        let sel = Selector::parse(&format!("#{id}-recommendation-data")).unwrap();
        doc.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .ok_or_else(|| anyhow!("missing element #{}-recommendation-data", id))
    };
    let profiles_sel = Selector::parse("wb-recommendation-profiles").unwrap();
    let profiles_raw = doc
        .select(&profiles_sel)
        .next()
        .and_then(|el| el.value().attr("profiles"))
        .ok_or_else(|| anyhow!("missing wb-recommendation-profiles profiles attribute"))?;
    let applicable_profiles: Vec<Value> =
        serde_json::from_str(profiles_raw).context("profiles attribute is not valid JSON")?;

    Ok(RecommendationDetail {
        assessment_status: text_field("automated_scoring")?,
        applicable_profiles,
        description: text_field("description")?,
        rationale_statement: text_field("rationale_statement")?,
        impact_statement: text_field("impact_statement")?,
        audit_procedure: text_field("audit_procedure")?,
        remediation_procedure: text_field("remediation_procedure")?,
        default_value: text_field("default_value")?,
    })
}

/// Fetch the detail page for every record, sequentially, merging results.
/// A single failed page aborts the run with that URL in context.
pub async fn enrich_records(
    client: &reqwest::Client,
    cfg: &FetchConfig,
    records: Vec<ControlRecord>,
) -> Result<Vec<MergedRecord>> {
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut merged = Vec::with_capacity(records.len());
    for record in records {
        info!("fetching {}", record.url);
        let detail = fetch_recommendation(client, cfg, &record.url)
            .await
            .with_context(|| format!("failed to enrich {}", record.url))?;
        merged.push(MergedRecord {
            control: record,
            detail: Some(detail),
        });
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(merged)
}

// ── Tests ──
