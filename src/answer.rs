use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};

use crate::store::Passage;

const OLLAMA_URL: &str = "http://localhost:11434/api/generate";
const MODEL: &str = "llama3.2";

/// Generation on a local model can be slow; one fixed timeout, no retries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Answer a query from retrieved passages via the local Ollama model.
/// Returns the generated text; a missing or unreachable server is an error.
pub async fn answer_query(query: &str, passages: &[Passage]) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let body = json!({
        "model": MODEL,
        "prompt": build_prompt(query, passages),
        "stream": false,
    });

    let response: Value = client
        .post(OLLAMA_URL)
        .json(&body)
        .send()
        .await
        .context("request to local Ollama server failed")?
        .json()
        .await
        .context("Ollama response is not valid JSON")?;

    response
        .get("response")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("Ollama response has no 'response' field"))
}

fn build_prompt(query: &str, passages: &[Passage]) -> String {
    let mut prompt = String::from("Answer the question using only the context below.\n\n");
    for (i, passage) in passages.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n\n", i + 1, passage.body));
    }
    prompt.push_str(&format!("Question: {}\nAnswer:", query));
    prompt
}
