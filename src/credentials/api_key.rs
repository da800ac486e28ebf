use crate::gcp::client::Endpoints;
use crate::gcp::http::{with_query, GcpHttpClient};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;

/// Call the Natural Language API with an API key instead of OAuth credentials
pub async fn authenticate_with_api_key(
    w: &mut impl Write,
    endpoints: &Endpoints,
    api_key: &str,
) -> Result<Value> {
    let http = GcpHttpClient::new()?;
    let text = "Hello, world!";

    let url = with_query(
        &format!("{}/v1/documents:analyzeSentiment", endpoints.language),
        &[("key", api_key)],
    );
    let body = json!({
        "document": {
            "content": text,
            "type": "PLAIN_TEXT",
        },
        "encodingType": "UTF8",
    });

    let response = http
        .post_unauthenticated(&url, &body)
        .await
        .context("AnalyzeSentiment")?;

    let sentiment = response.get("documentSentiment").cloned().unwrap_or(Value::Null);
    let score = sentiment.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let magnitude = sentiment
        .get("magnitude")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    writeln!(w, "Text: {}", text)?;
    writeln!(w, "Sentiment: {}, {}", score, magnitude)?;
    writeln!(w, "Successfully authenticated using the API key.")?;
    Ok(response)
}
