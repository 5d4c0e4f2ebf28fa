//! HTTP plumbing shared by the PharmGuard backend client.

use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use tracing::warn;

use crate::error::PharmGuardError;

pub(crate) mod pharmguard;

const ERROR_BODY_MAX_BYTES: usize = 2048;
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("pharmguard-cli/", env!("CARGO_PKG_VERSION"));

static PROBE_HTTP_CLIENT: OnceLock<ClientWithMiddleware> = OnceLock::new();

pub(crate) fn env_base(default: &'static str, env_var: &str) -> Cow<'static, str> {
    std::env::var(env_var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(Cow::Owned)
        .unwrap_or_else(|| Cow::Borrowed(default))
}

/// Parses a whole-seconds timeout from `env_var`; unset, empty, zero or garbage means none.
pub(crate) fn env_timeout(env_var: &str) -> Option<Duration> {
    let raw = std::env::var(env_var).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!(env_var, value = raw, "Ignoring non-numeric timeout override");
            None
        }
    }
}

/// Returns a shared client for idempotent probes (`GET /health`).
///
/// - Retry: 3 attempts with exponential backoff for transient errors
/// - Timeout: 10s per attempt
pub(crate) fn probe_client() -> Result<ClientWithMiddleware, PharmGuardError> {
    if let Some(client) = PROBE_HTTP_CLIENT.get() {
        return Ok(client.clone());
    }

    let base_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .user_agent(USER_AGENT)
        .build()
        .map_err(PharmGuardError::HttpClientInit)?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
    let client = ClientBuilder::new(base_client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

    match PROBE_HTTP_CLIENT.set(client.clone()) {
        Ok(()) => Ok(client),
        Err(_) => PROBE_HTTP_CLIENT
            .get()
            .cloned()
            .ok_or_else(|| PharmGuardError::Api {
                api: "http-client".into(),
                message: "Probe HTTP client initialization race".into(),
            }),
    }
}

/// Returns a plain client for multipart uploads.
///
/// Multipart bodies cannot be cloned, so uploads never pass through retry middleware.
/// `timeout` of `None` leaves the request unbounded once connected.
pub(crate) fn upload_client(timeout: Option<Duration>) -> Result<reqwest::Client, PharmGuardError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(PharmGuardError::HttpClientInit)
}

pub(crate) fn body_excerpt(bytes: &[u8]) -> String {
    let full = String::from_utf8_lossy(bytes);

    let truncated: &str = if full.len() > ERROR_BODY_MAX_BYTES {
        let mut end = ERROR_BODY_MAX_BYTES;
        while end > 0 && !full.is_char_boundary(end) {
            end -= 1;
        }
        &full[..end]
    } else {
        full.as_ref()
    };

    let mut s = truncated.trim().replace(['\n', '\r', '\t'], " ");
    if full.len() > ERROR_BODY_MAX_BYTES {
        s.push_str(" …");
    }
    s
}

pub(crate) fn ensure_json_content_type(
    api: &str,
    content_type: Option<&HeaderValue>,
    body: &[u8],
) -> Result<(), PharmGuardError> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    let raw = match content_type.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            warn!(
                source = api,
                "Response content-type header was not valid UTF-8; attempting JSON parse"
            );
            return Ok(());
        }
    };
    if raw.is_empty() {
        return Ok(());
    }

    let media_type = raw
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_html = matches!(media_type.as_str(), "text/html" | "application/xhtml+xml");
    if is_html {
        return Err(PharmGuardError::Api {
            api: api.to_string(),
            message: format!(
                "Unexpected HTML response (content-type: {raw}): {}",
                body_excerpt(body)
            ),
        });
    }

    let is_json = media_type == "application/json"
        || media_type == "text/json"
        || media_type.ends_with("+json");
    if !is_json {
        warn!(
            source = api,
            content_type = raw,
            "Unexpected non-JSON content type; attempting JSON parse for compatibility"
        );
    }

    Ok(())
}

pub(crate) async fn read_limited_body(
    mut resp: reqwest::Response,
    api: &str,
) -> Result<Vec<u8>, PharmGuardError> {
    let mut body: Vec<u8> = Vec::new();

    while let Some(chunk) = resp.chunk().await? {
        let next_len = body.len().saturating_add(chunk.len());
        if next_len > DEFAULT_MAX_BODY_BYTES {
            return Err(PharmGuardError::Api {
                api: api.to_string(),
                message: format!("Response body exceeded {DEFAULT_MAX_BODY_BYTES} bytes"),
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_login_page_is_rejected_before_json_parsing() {
        let err = ensure_json_content_type(
            "pharmguard",
            Some(&HeaderValue::from_static("text/html; charset=utf-8")),
            b"<!DOCTYPE html><html><body><form action=\"/login\"></form></body></html>",
        )
        .expect_err("html should be rejected");
        let msg = err.to_string();
        assert!(msg.contains("pharmguard"));
        assert!(msg.contains("HTML"));
    }

    #[test]
    fn backend_error_envelope_passes_content_type_check() {
        let body = br#"{"success": false, "error": "Validation Error - vcf_file: File must be a .vcf", "code": 400}"#;
        let ok = ensure_json_content_type(
            "pharmguard",
            Some(&HeaderValue::from_static("application/json")),
            body,
        );
        assert!(ok.is_ok());
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value["code"], 400);
    }

    #[test]
    fn analysis_json_served_as_text_plain_is_still_accepted() {
        let body = br#"{"drug_analyses": [{"drug": "CODEINE", "risk_assessment": {"risk_label": "Toxic"}}]}"#;
        let ok = ensure_json_content_type(
            "pharmguard",
            Some(&HeaderValue::from_static("text/plain; charset=utf-8")),
            body,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn missing_content_type_defers_to_json_parse() {
        assert!(ensure_json_content_type("pharmguard", None, b"{\"status\": \"healthy\"}").is_ok());
    }

    #[test]
    fn backend_error_excerpt_keeps_message_on_one_line() {
        let excerpt = body_excerpt(b"{\n  \"success\": false,\n  \"error\": \"Internal server error\"\n}\n");
        assert_eq!(
            excerpt,
            r#"{   "success": false,   "error": "Internal server error" }"#
        );
    }

    #[test]
    fn body_excerpt_flattens_whitespace_and_truncates() {
        assert_eq!(body_excerpt(b"  line one\nline\ttwo \r\n"), "line one line two");

        let long = "x".repeat(ERROR_BODY_MAX_BYTES + 10);
        let excerpt = body_excerpt(long.as_bytes());
        assert!(excerpt.ends_with(" …"));
        assert_eq!(excerpt.chars().filter(|c| *c == 'x').count(), ERROR_BODY_MAX_BYTES);
    }

    #[test]
    fn env_base_falls_back_when_unset_or_blank() {
        let base = env_base("http://127.0.0.1:5000", "PHARMGUARD_TEST_UNSET_BASE");
        assert_eq!(base, "http://127.0.0.1:5000");
    }

    #[test]
    fn env_timeout_is_none_when_unset() {
        assert_eq!(env_timeout("PHARMGUARD_TEST_UNSET_TIMEOUT"), None);
    }

    #[test]
    fn upload_client_builds_with_and_without_timeout() {
        assert!(upload_client(None).is_ok());
        assert!(upload_client(Some(Duration::from_secs(5))).is_ok());
    }
}
