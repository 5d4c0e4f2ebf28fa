use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entities::submission::{AnalysisTransport, Submission};
use crate::error::PharmGuardError;

const PHARMGUARD_BASE: &str = "http://127.0.0.1:5000";
const PHARMGUARD_API: &str = "pharmguard";
const PHARMGUARD_BASE_ENV: &str = "PHARMGUARD_BASE_URL";
const PHARMGUARD_TIMEOUT_ENV: &str = "PHARMGUARD_TIMEOUT_SECS";
const VCF_MIME: &str = "text/x-vcf";

/// Drug names the reference backend accepts. The client does not enforce this list.
pub const SUPPORTED_DRUGS: &[&str] = &[
    "CODEINE",
    "WARFARIN",
    "CLOPIDOGREL",
    "SIMVASTATIN",
    "AZATHIOPRINE",
    "FLUOROURACIL",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct PharmGuardClient {
    upload: reqwest::Client,
    base: Cow<'static, str>,
}

impl PharmGuardClient {
    /// Explicit values win over `PHARMGUARD_BASE_URL` / `PHARMGUARD_TIMEOUT_SECS`.
    ///
    /// An explicit zero timeout disables the overall timeout even when the environment sets one.
    pub fn with_options(
        base: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, PharmGuardError> {
        let base = match base.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()) {
            Some(base) => Cow::Owned(base),
            None => crate::sources::env_base(PHARMGUARD_BASE, PHARMGUARD_BASE_ENV),
        };
        let timeout =
            resolve_timeout(timeout, || crate::sources::env_timeout(PHARMGUARD_TIMEOUT_ENV));
        Ok(Self {
            upload: crate::sources::upload_client(timeout)?,
            base,
        })
    }

    #[cfg(test)]
    fn new_for_test(base: String) -> Result<Self, PharmGuardError> {
        Ok(Self {
            upload: crate::sources::upload_client(None)?,
            base: Cow::Owned(base),
        })
    }

    pub fn base(&self) -> &str {
        self.base.as_ref()
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_ref().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn multipart_form(
        submission: &Submission,
    ) -> Result<reqwest::multipart::Form, PharmGuardError> {
        let file = reqwest::multipart::Part::bytes(submission.vcf_file.bytes.clone())
            .file_name(submission.vcf_file.file_name.clone())
            .mime_str(VCF_MIME)?;
        Ok(reqwest::multipart::Form::new()
            .text("patient_id", submission.patient_id.clone())
            .text("drug", submission.drug.clone())
            .part("vcf_file", file))
    }

    /// Posts one submission to `/analyze` and returns the decoded JSON body.
    ///
    /// Sent once; multipart bodies are not replayed.
    pub async fn analyze(
        &self,
        submission: &Submission,
    ) -> Result<serde_json::Value, PharmGuardError> {
        let url = self.endpoint("analyze");
        let form = Self::multipart_form(submission)?;
        debug!(url = %url, "POST analyze");

        let resp = self.upload.post(&url).multipart(form).send().await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, PHARMGUARD_API).await?;

        if !status.is_success() {
            return Err(PharmGuardError::Api {
                api: PHARMGUARD_API.to_string(),
                message: error_message(status, &bytes),
            });
        }

        crate::sources::ensure_json_content_type(PHARMGUARD_API, content_type.as_ref(), &bytes)?;
        serde_json::from_slice(&bytes).map_err(|source| PharmGuardError::ApiJson {
            api: PHARMGUARD_API.to_string(),
            source,
        })
    }

    /// Queries `GET /health` through the retrying probe client.
    pub async fn health(&self) -> Result<BackendHealth, PharmGuardError> {
        let url = self.endpoint("health");
        let resp = crate::sources::probe_client()?
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        let content_type = resp.headers().get(reqwest::header::CONTENT_TYPE).cloned();
        let bytes = crate::sources::read_limited_body(resp, PHARMGUARD_API).await?;

        if !status.is_success() {
            return Err(PharmGuardError::Api {
                api: PHARMGUARD_API.to_string(),
                message: error_message(status, &bytes),
            });
        }

        crate::sources::ensure_json_content_type(PHARMGUARD_API, content_type.as_ref(), &bytes)?;
        serde_json::from_slice(&bytes).map_err(|source| PharmGuardError::ApiJson {
            api: PHARMGUARD_API.to_string(),
            source,
        })
    }
}

#[async_trait]
impl AnalysisTransport for PharmGuardClient {
    async fn post_analyze(
        &self,
        submission: &Submission,
    ) -> Result<serde_json::Value, PharmGuardError> {
        self.analyze(submission).await
    }
}

fn resolve_timeout(
    explicit: Option<Duration>,
    from_env: impl FnOnce() -> Option<Duration>,
) -> Option<Duration> {
    match explicit {
        Some(timeout) if timeout.is_zero() => None,
        Some(timeout) => Some(timeout),
        None => from_env(),
    }
}

/// Prefers the backend's `{"error": ...}` message over a raw body excerpt.
fn error_message(status: reqwest::StatusCode, bytes: &[u8]) -> String {
    let backend_error = serde_json::from_slice::<BackendErrorBody>(bytes)
        .ok()
        .and_then(|body| body.error)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());
    match backend_error {
        Some(error) => format!("HTTP {}: {error}", status.as_u16()),
        None => format!("HTTP {status}: {}", crate::sources::body_excerpt(bytes)),
    }
}
