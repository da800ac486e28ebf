//! HTTP utilities for GCP REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull `error.message` out of a Google API error body
fn google_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    // OAuth endpoints return {"error": "invalid_grant", "error_description": "..."}
    if let Some(code) = error.as_str() {
        let description = value
            .get("error_description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        return Some(format!("{} {}", code, description).trim().to_string());
    }
    error
        .get("message")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Append query parameters to a URL, percent-encoding the values
pub fn with_query(url: &str, params: &[(&str, &str)]) -> String {
    let query_parts: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gcp-snippets/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Underlying reqwest client, for calls that need a custom request shape
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url).bearer_auth(token)).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        tracing::debug!("POST {}", url);

        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<Value> {
        tracing::debug!("PATCH {}", url);
        self.send(self.client.patch(url).bearer_auth(token).json(body))
            .await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url).bearer_auth(token)).await
    }

    /// POST JSON without a bearer token. API-key calls carry the key in the query.
    pub async fn post_unauthenticated(&self, url: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST (no auth) {}", url.split('?').next().unwrap_or(url));
        self.send(self.client.post(url).json(body)).await
    }

    /// POST an `application/x-www-form-urlencoded` body without a bearer token.
    /// Used for OAuth2 and STS token exchanges.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        basic_auth: Option<(&str, &str)>,
    ) -> Result<Value> {
        tracing::debug!("POST (form) {}", url);

        let mut request = self.client.post(url).form(form);
        if let Some((user, password)) = basic_auth {
            request = request.basic_auth(user, Some(password));
        }
        self.send(request).await
    }

    /// GET without a bearer token and return the raw body.
    /// Used for the metadata server, which answers in plain text.
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String> {
        tracing::debug!("GET (raw) {}", url);

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        Ok(body)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(match google_error_message(&body) {
                Some(message) => anyhow::anyhow!("API request failed: {}: {}", status, message),
                None => anyhow::anyhow!("API request failed: {}", status),
            });
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format a GCP API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_gcp_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);

    if error_str.contains("403") {
        return "Permission denied. Check your GCP IAM permissions.".to_string();
    }
    if error_str.contains("401") {
        return "Authentication failed. Run 'gcloud auth application-default login'.".to_string();
    }
    if error_str.contains("404") {
        return "Resource not found.".to_string();
    }
    if error_str.contains("429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("400") {
        return "Invalid request. Check your parameters.".to_string();
    }
    if error_str.contains("500") || error_str.contains("503") {
        return "GCP service temporarily unavailable. Please try again.".to_string();
    }
    if error_str.contains("409") {
        return "Resource conflict. The resource may already exist or be in use.".to_string();
    }

    if error_str.contains("API request failed") {
        return "Request failed. Check your network connection and try again.".to_string();
    }

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(MAX_LOG_BODY_LENGTH)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_encodes_values() {
        let url = with_query(
            "https://example.com/v1/things",
            &[("filter", "labels.a = b"), ("pageSize", "10")],
        );
        assert_eq!(
            url,
            "https://example.com/v1/things?filter=labels.a%20%3D%20b&pageSize=10"
        );
        assert_eq!(
            with_query("https://example.com/x?a=1", &[("b", "2")]),
            "https://example.com/x?a=1&b=2"
        );
        assert_eq!(with_query("https://example.com/x", &[]), "https://example.com/x");
    }

    #[test]
    fn test_google_error_message_shapes() {
        let api = r#"{"error": {"code": 404, "message": "The resource was not found"}}"#;
        assert_eq!(
            google_error_message(api).as_deref(),
            Some("The resource was not found")
        );

        let oauth = r#"{"error": "invalid_grant", "error_description": "Bad assertion"}"#;
        assert_eq!(
            google_error_message(oauth).as_deref(),
            Some("invalid_grant Bad assertion")
        );

        assert_eq!(google_error_message("not json"), None);
    }

    #[test]
    fn test_sanitize_for_log_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
        assert_eq!(sanitize_for_log("a\nb"), "ab");
    }

    #[test]
    fn test_format_gcp_error_maps_status_codes() {
        let err = anyhow::anyhow!("API request failed: 403 Forbidden: nope");
        assert_eq!(
            format_gcp_error(&err),
            "Permission denied. Check your GCP IAM permissions."
        );
        let err = anyhow::anyhow!("something short");
        assert_eq!(format_gcp_error(&err), "something short");
    }
}
