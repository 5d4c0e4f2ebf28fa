//! Submission handling: form inputs in, status text and report cards out.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::entities::analysis::AnalysisRecord;
use crate::error::PharmGuardError;
use crate::render::html::render_report;
use crate::render::view::{ReportPanel, StatusLine};

pub const MISSING_FILE_MESSAGE: &str = "Please choose a VCF file.";
pub const IN_PROGRESS_MESSAGE: &str = "Analyzing...";
pub const BUSY_MESSAGE: &str = "Analysis already in progress.";
pub const FAILURE_PREFIX: &str = "Analysis failed: ";

/// A VCF file as selected by the user; contents are forwarded untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcfUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl VcfUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, PharmGuardError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                PharmGuardError::InvalidArgument(format!(
                    "VCF path has no usable file name: {}",
                    path.display()
                ))
            })?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self { file_name, bytes })
    }
}

/// Current values of the three form controls.
#[derive(Debug, Clone, Default)]
pub struct FormInputs {
    pub patient_id: Option<String>,
    pub drug: String,
    pub files: Vec<VcfUpload>,
}

/// The multipart payload for one `/analyze` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub patient_id: String,
    pub drug: String,
    pub vcf_file: VcfUpload,
}

impl Submission {
    /// Builds a payload from the first selected file; `None` when no file is selected.
    pub fn from_inputs(inputs: FormInputs) -> Option<Self> {
        let FormInputs {
            patient_id,
            drug,
            files,
        } = inputs;
        if files.len() > 1 {
            warn!(
                selected = files.len(),
                "Only the first selected VCF file is uploaded"
            );
        }
        let vcf_file = files.into_iter().next()?;
        Some(Self {
            patient_id: patient_id.unwrap_or_default(),
            drug,
            vcf_file,
        })
    }
}

/// The network seam between the handler and the analysis backend.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn post_analyze(
        &self,
        submission: &Submission,
    ) -> Result<serde_json::Value, PharmGuardError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    MissingFile,
    Busy,
    Rendered { records: Vec<AnalysisRecord> },
    Failed { message: String },
}

/// Drives one analysis per activation and rejects overlapping activations.
pub struct SubmissionHandler<T> {
    transport: T,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: AnalysisTransport> SubmissionHandler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(&self.in_flight))
    }

    pub async fn activate(
        &self,
        inputs: FormInputs,
        status: &StatusLine,
        report: &ReportPanel,
    ) -> Outcome {
        let Some(submission) = Submission::from_inputs(inputs) else {
            status.set(MISSING_FILE_MESSAGE);
            return Outcome::MissingFile;
        };

        let Some(_guard) = self.try_begin() else {
            warn!("Rejected activation while another analysis is pending");
            status.set(BUSY_MESSAGE);
            return Outcome::Busy;
        };

        info!(
            patient_id = %submission.patient_id,
            drug = %submission.drug,
            file = %submission.vcf_file.file_name,
            bytes = submission.vcf_file.bytes.len(),
            "Submitting VCF for analysis"
        );
        status.set(IN_PROGRESS_MESSAGE);

        let rendered = match self.transport.post_analyze(&submission).await {
            Ok(response) => render_report(report, &response),
            Err(err) => Err(err),
        };

        match rendered {
            Ok(records) => {
                status.clear();
                info!(cards = records.len(), "Analysis rendered");
                Outcome::Rendered { records }
            }
            Err(err) => {
                warn!(error = %err, "Analysis failed");
                let message = err.to_string();
                status.set(format!("{FAILURE_PREFIX}{message}"));
                Outcome::Failed { message }
            }
        }
    }
}
