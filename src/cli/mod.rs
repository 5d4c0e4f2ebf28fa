//! Command-line surface for the PharmGuard client.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Parser, Subcommand, ValueEnum};

use crate::entities::submission::{FormInputs, Outcome, SubmissionHandler, VcfUpload};
use crate::render::view::{ReportPanel, StatusLine};
use crate::sources::pharmguard::{PharmGuardClient, SUPPORTED_DRUGS};

pub mod health;

#[derive(Parser, Debug)]
#[command(
    name = "pharmguard",
    version,
    about = "Submit a VCF to a PharmGuard backend and render the pharmacogenomic risk report"
)]
pub struct Cli {
    /// Backend base URL (default: $PHARMGUARD_BASE_URL or http://127.0.0.1:5000)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Overall request timeout in seconds; 0 disables it (default: $PHARMGUARD_TIMEOUT_SECS or none)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Emit JSON instead of Markdown
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a VCF for analysis and print the report cards
    Analyze {
        /// Patient identifier (sent as-is; empty when omitted)
        #[arg(long)]
        patient_id: Option<String>,

        /// Drug to assess (not validated client-side; see `pharmguard drugs`)
        #[arg(long, default_value = "")]
        drug: String,

        /// VCF file to upload; may repeat, but only the first one is sent
        #[arg(long = "vcf")]
        vcf: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// Check that the backend is reachable
    Health,
    /// List the drugs the reference backend supports
    Drugs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Terminal-friendly Markdown
    Markdown,
    /// Report panel markup (one card per record)
    Html,
    /// Standalone HTML page
    Page,
    /// Normalized records as JSON
    Json,
}

fn client_for(
    base_url: Option<String>,
    timeout_secs: Option<u64>,
) -> anyhow::Result<PharmGuardClient> {
    let timeout = timeout_secs.map(Duration::from_secs);
    Ok(PharmGuardClient::with_options(base_url, timeout)?)
}

async fn form_inputs(
    patient_id: Option<String>,
    drug: String,
    vcf: &[PathBuf],
) -> anyhow::Result<FormInputs> {
    let mut files = Vec::with_capacity(vcf.len());
    for path in vcf {
        files.push(VcfUpload::from_path(path).await?);
    }
    Ok(FormInputs {
        patient_id,
        drug,
        files,
    })
}

pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let Cli {
        base_url,
        timeout_secs,
        json,
        command,
    } = cli;

    match command {
        Commands::Analyze {
            patient_id,
            drug,
            vcf,
            format,
        } => {
            let format = if json { OutputFormat::Json } else { format };
            let inputs = form_inputs(patient_id, drug, &vcf).await?;
            let handler = SubmissionHandler::new(client_for(base_url, timeout_secs)?);
            analyze(&handler, inputs, format).await
        }
        Commands::Health => {
            let client = client_for(base_url, timeout_secs)?;
            let report = health::check(&client).await?;
            if json {
                return Ok(crate::render::json::to_pretty(&report)?);
            }
            if !report.is_healthy() {
                return Err(anyhow!(report.to_markdown()));
            }
            Ok(report.to_markdown())
        }
        Commands::Drugs => {
            if json {
                return Ok(crate::render::json::to_pretty(&SUPPORTED_DRUGS)?);
            }
            Ok(crate::render::markdown::drugs_markdown(SUPPORTED_DRUGS))
        }
    }
}

/// Runs one activation and formats the rendered report.
///
/// Anything other than a rendered report becomes an error carrying the status text.
pub async fn analyze<T>(
    handler: &SubmissionHandler<T>,
    inputs: FormInputs,
    format: OutputFormat,
) -> anyhow::Result<String>
where
    T: crate::entities::submission::AnalysisTransport,
{
    let status = StatusLine::new();
    let report = ReportPanel::new();

    let records = match handler.activate(inputs, &status, &report).await {
        Outcome::Rendered { records } => records,
        Outcome::MissingFile | Outcome::Busy | Outcome::Failed { .. } => {
            return Err(anyhow!(status.text()));
        }
    };

    let out = match format {
        OutputFormat::Markdown => crate::render::markdown::report_markdown(&records)?,
        OutputFormat::Html => report.html(),
        OutputFormat::Page => crate::render::html::report_page(&report, &status)?,
        OutputFormat::Json => crate::render::json::to_pretty(&records)?,
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_analyze_arguments() {
        let cli = Cli::try_parse_from([
            "pharmguard",
            "--base-url",
            "http://backend:5000",
            "analyze",
            "--patient-id",
            "P1",
            "--drug",
            "warfarin",
            "--vcf",
            "a.vcf",
            "--vcf",
            "b.vcf",
            "--format",
            "html",
        ])
        .expect("cli should parse");

        assert_eq!(cli.base_url.as_deref(), Some("http://backend:5000"));
        let Commands::Analyze {
            patient_id,
            drug,
            vcf,
            format,
        } = cli.command
        else {
            panic!("expected analyze");
        };
        assert_eq!(patient_id.as_deref(), Some("P1"));
        assert_eq!(drug, "warfarin");
        assert_eq!(vcf, vec![PathBuf::from("a.vcf"), PathBuf::from("b.vcf")]);
        assert_eq!(format, OutputFormat::Html);
    }

    #[test]
    fn analyze_defaults_to_markdown_without_file() {
        let cli = Cli::try_parse_from(["pharmguard", "analyze"]).expect("cli should parse");
        let Commands::Analyze { vcf, format, drug, .. } = cli.command else {
            panic!("expected analyze");
        };
        assert!(vcf.is_empty());
        assert_eq!(drug, "");
        assert_eq!(format, OutputFormat::Markdown);
    }

    #[tokio::test]
    async fn run_without_vcf_reports_missing_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let cli = Cli::try_parse_from([
            "pharmguard",
            "--base-url",
            server.uri().as_str(),
            "analyze",
            "--drug",
            "warfarin",
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        assert_eq!(err.to_string(), "Please choose a VCF file.");
    }

    #[tokio::test]
    async fn analyze_formats_html_and_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "drug_analyses": [
                    {"drug": "CODEINE", "risk": {"label": "Low"}},
                    {"drug": "WARFARIN", "risk": {"label": "Medium"}}
                ]
            })))
            .mount(&server)
            .await;

        let handler =
            SubmissionHandler::new(PharmGuardClient::with_options(Some(server.uri()), None).unwrap());
        let inputs = || FormInputs {
            patient_id: Some("P1".into()),
            drug: "codeine".into(),
            files: vec![VcfUpload::new("a.vcf", b"#CHROM\n".to_vec())],
        };

        let html = analyze(&handler, inputs(), OutputFormat::Html).await.unwrap();
        assert_eq!(html.matches(r#"<div class="card"#).count(), 2);
        assert!(html.contains("risk-safe"));
        assert!(html.contains("risk-moderate"));

        let json = analyze(&handler, inputs(), OutputFormat::Json).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
        assert_eq!(parsed[1]["risk_tag"], "moderate");
    }

    #[tokio::test]
    async fn analyze_failure_carries_prefixed_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "success": false,
                "error": "Server Error: VCF parsing failed",
                "code": 500
            })))
            .mount(&server)
            .await;

        let handler =
            SubmissionHandler::new(PharmGuardClient::with_options(Some(server.uri()), None).unwrap());
        let inputs = FormInputs {
            patient_id: None,
            drug: "codeine".into(),
            files: vec![VcfUpload::new("a.vcf", Vec::new())],
        };

        let err = analyze(&handler, inputs, OutputFormat::Markdown)
            .await
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("Analysis failed: "));
        assert!(err.contains("VCF parsing failed"));
    }

    #[tokio::test]
    async fn repeated_vcf_paths_reach_handler_and_only_first_is_uploaded() {
        let dir = std::env::temp_dir().join(format!("pharmguard-cli-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let first = dir.join("first.vcf");
        let second = dir.join("second.vcf");
        tokio::fs::write(&first, b"#CHROM\tPOS\nrs-first\n").await.unwrap();
        tokio::fs::write(&second, b"#CHROM\tPOS\nrs-second\n").await.unwrap();

        let inputs = form_inputs(None, "warfarin".into(), &[first, second])
            .await
            .unwrap();
        assert_eq!(inputs.files.len(), 2);
        assert_eq!(inputs.files[0].file_name, "first.vcf");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(wiremock::matchers::body_string_contains("rs-first"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"drug": "WARFARIN"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let handler =
            SubmissionHandler::new(PharmGuardClient::with_options(Some(server.uri()), None).unwrap());
        let out = analyze(&handler, inputs, OutputFormat::Json).await.unwrap();
        assert!(out.contains("WARFARIN"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn zero_timeout_flag_is_accepted() {
        let cli = Cli::try_parse_from(["pharmguard", "--timeout-secs", "0", "health"]).unwrap();
        assert_eq!(cli.timeout_secs, Some(0));
        assert!(client_for(None, cli.timeout_secs).is_ok());
    }

    #[tokio::test]
    async fn drugs_lists_reference_backend_drugs() {
        let cli = Cli::try_parse_from(["pharmguard", "drugs"]).unwrap();
        let out = run(cli).await.unwrap();
        assert!(out.contains("- WARFARIN"));

        let cli = Cli::try_parse_from(["pharmguard", "drugs", "--json"]).unwrap();
        let out = run(cli).await.unwrap();
        assert!(out.contains("\"CLOPIDOGREL\""));
    }
}
