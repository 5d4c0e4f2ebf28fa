use std::time::Instant;

use crate::error::PharmGuardError;
use crate::sources::pharmguard::PharmGuardClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub base_url: String,
    pub status: String,
    pub latency_ms: u128,
    /// Backend-reported status or failure reason when not healthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# PharmGuard Health Check\n\n");
        out.push_str(&format!("Backend: {}\n", self.base_url));
        out.push_str(&format!("Status: {}\n", self.status));
        out.push_str(&format!("Latency: {}ms\n", self.latency_ms));
        if let Some(detail) = &self.detail {
            out.push_str(&format!("Detail: {detail}\n"));
        }
        out
    }
}

fn failure_reason(err: &PharmGuardError) -> String {
    match err {
        PharmGuardError::Http(e) if e.is_timeout() => "timeout".to_string(),
        PharmGuardError::Http(e) if e.is_connect() => "connect".to_string(),
        PharmGuardError::HttpMiddleware(_) => "connect".to_string(),
        PharmGuardError::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Probes the configured backend's `/health` endpoint.
///
/// Probe failures are folded into the report; the report itself is always returned.
pub async fn check(client: &PharmGuardClient) -> Result<HealthReport, PharmGuardError> {
    let start = Instant::now();
    let result = client.health().await;
    let latency_ms = start.elapsed().as_millis();

    let (status, detail) = match result {
        Ok(health) if health.status.eq_ignore_ascii_case("healthy") => ("ok", None),
        Ok(health) => ("error", Some(format!("reported {}", health.status))),
        Err(err) => ("error", Some(failure_reason(&err))),
    };
    Ok(HealthReport {
        base_url: client.base().to_string(),
        status: status.to_string(),
        latency_ms,
        detail,
    })
}
