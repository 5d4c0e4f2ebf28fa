//! Analysis response normalization.
//!
//! The backend answers `/analyze` with one of three shapes: a single analysis
//! object, a bare array of them, or an object carrying `drug_analyses`.
//! [`AnalysisResponse::from_value`] settles the shape once and every view works
//! from the resulting `Vec<AnalysisRecord>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::serde::{field_text, lenient_string, scalar_text};

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResponse {
    /// `{ "drug_analyses": [...] }`
    Batch(Vec<AnalysisRecord>),
    /// `[ {...}, {...} ]`
    List(Vec<AnalysisRecord>),
    /// Any other value, treated as one record.
    Single(AnalysisRecord),
}

impl AnalysisResponse {
    pub fn from_value(value: &Value) -> Self {
        if let Some(batch) = value.get("drug_analyses").filter(|v| is_truthy(v)) {
            let records = match batch {
                Value::Array(items) => items.iter().map(AnalysisRecord::from_value).collect(),
                other => vec![AnalysisRecord::from_value(other)],
            };
            return Self::Batch(records);
        }

        match value {
            Value::Array(items) => {
                Self::List(items.iter().map(AnalysisRecord::from_value).collect())
            }
            other => Self::Single(AnalysisRecord::from_value(other)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Batch(records) | Self::List(records) => records.len(),
            Self::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> Vec<AnalysisRecord> {
        match self {
            Self::Batch(records) | Self::List(records) => records,
            Self::Single(record) => vec![record],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub drug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub risk: RiskInfo,
    pub profile: ProfileInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<ClinicalRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
    pub risk_tag: Option<RiskTag>,
}

impl AnalysisRecord {
    pub fn from_value(value: &Value) -> Self {
        // A falsy `risk_assessment` defers to `risk`.
        let risk = ["risk_assessment", "risk"]
            .iter()
            .filter_map(|key| value.get(*key))
            .find(|v| is_truthy(v))
            .map(RiskInfo::from_value)
            .unwrap_or_default();
        let profile = value
            .get("pharmacogenomic_profile")
            .map(ProfileInfo::from_value)
            .unwrap_or_default();
        let risk_tag = RiskTag::classify(risk.label.as_deref());

        Self {
            drug: field_text(value, "drug"),
            patient_id: field_text(value, "patient_id"),
            timestamp: field_text(value, "timestamp"),
            risk,
            profile,
            recommendation: value
                .get("clinical_recommendation")
                .and_then(object_as::<ClinicalRecommendation>)
                .filter(|r| !r.is_empty()),
            explanation: value
                .get("llm_generated_explanation")
                .and_then(object_as::<Explanation>)
                .filter(|e| !e.is_empty()),
            risk_tag,
        }
    }

    /// CSS class for the card; empty when the label is absent.
    pub fn risk_class(&self) -> &'static str {
        self.risk_tag.map(RiskTag::css_class).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskInfo {
    pub label: Option<String>,
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl RiskInfo {
    fn from_value(value: &Value) -> Self {
        if value.is_object() {
            return Self {
                label: field_text(value, "risk_label").or_else(|| field_text(value, "label")),
                severity: field_text(value, "severity"),
                confidence_score: value.get("confidence_score").and_then(Value::as_f64),
            };
        }
        Self {
            label: scalar_text(value),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileInfo {
    pub primary_gene: Option<String>,
    pub phenotype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diplotype: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detected_variants: Vec<DetectedVariant>,
}

impl ProfileInfo {
    fn from_value(value: &Value) -> Self {
        let detected_variants = match value.get("detected_variants") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(object_as::<DetectedVariant>)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            primary_gene: field_text(value, "primary_gene"),
            phenotype: field_text(value, "phenotype"),
            diplotype: field_text(value, "diplotype"),
            detected_variants,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedVariant {
    #[serde(default, deserialize_with = "lenient_string")]
    pub rsid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gene: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub star_allele: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub chromosome: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub alternate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub recommendation_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub guideline_source: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub evidence_level: Option<String>,
}

impl ClinicalRecommendation {
    fn is_empty(&self) -> bool {
        self.recommendation_text.is_none()
            && self.guideline_source.is_none()
            && self.evidence_level.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mechanism: Option<String>,
}

impl Explanation {
    fn is_empty(&self) -> bool {
        self.summary.is_none() && self.mechanism.is_none()
    }
}

/// Risk classification derived from the free-text risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTag {
    Safe,
    Moderate,
    High,
}

impl RiskTag {
    /// Substring match, case-insensitive; `safe`/`low` win over `moderate`/`medium`.
    pub fn classify(label: Option<&str>) -> Option<Self> {
        let label = label.filter(|l| !l.is_empty())?.to_lowercase();
        if label.contains("safe") || label.contains("low") {
            Some(Self::Safe)
        } else if label.contains("moderate") || label.contains("medium") {
            Some(Self::Moderate)
        } else {
            Some(Self::High)
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Safe => "risk-safe",
            Self::Moderate => "risk-moderate",
            Self::High => "risk-high",
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

fn object_as<T: serde::de::DeserializeOwned>(value: &Value) -> Option<T> {
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}
