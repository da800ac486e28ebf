//! Generative AI snippets on Vertex AI
//!
//! `image` drives Imagen and Gemini image generation over REST; `live` holds
//! the OpenAI-compatible structured output call and the Live API audio
//! conversation over WebSocket.

pub mod image;
pub mod live;

use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

/// `projects/{project}/locations/{location}/publishers/google/models/{model}`
pub fn publisher_model(project: &str, location: &str, model: &str) -> String {
    format!(
        "projects/{}/locations/{}/publishers/google/models/{}",
        project, location, model
    )
}

/// Call `:generateContent` and return the parts of the first candidate
pub(crate) async fn generate_content(
    client: &GcpClient,
    project: &str,
    location: &str,
    model: &str,
    contents: Value,
    generation_config: Value,
) -> Result<Vec<Value>> {
    let url = client.aiplatform_url(
        location,
        "v1",
        &format!("{}:generateContent", publisher_model(project, location, model)),
    );
    debug!("Generating content with {}", model);

    let body = json!({
        "contents": contents,
        "generationConfig": generation_config,
    });
    let response = client
        .post(&url, Some(&body))
        .await
        .context("failed to generate content")?;

    Ok(response
        .pointer("/candidates/0/content/parts")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default())
}

/// Decoded bytes of an `inlineData` part
pub(crate) fn inline_data(part: &Value) -> Result<Option<Vec<u8>>> {
    match part.pointer("/inlineData/data").and_then(|v| v.as_str()) {
        Some(data) if !data.is_empty() => {
            let bytes = STANDARD
                .decode(data)
                .context("inline data is not valid base64")?;
            Ok(Some(bytes))
        }
        _ => Ok(None),
    }
}

/// Write bytes to `path`, creating parent directories
pub(crate) fn save_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inline_data() {
        let part = json!({"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}});
        assert_eq!(inline_data(&part).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(inline_data(&json!({"text": "hi"})).unwrap(), None);
        assert!(inline_data(&json!({"inlineData": {"data": "@@"}})).is_err());
    }

    #[test]
    fn test_publisher_model() {
        assert_eq!(
            publisher_model("p", "global", "gemini-2.5-flash-image"),
            "projects/p/locations/global/publishers/google/models/gemini-2.5-flash-image"
        );
    }
}
