use serde::Serialize;

use crate::error::PharmGuardError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, PharmGuardError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::to_pretty;
    use crate::entities::analysis::AnalysisRecord;
    use serde_json::json;

    #[test]
    fn records_serialize_with_risk_tag() {
        let record = AnalysisRecord::from_value(&json!({
            "drug": "WARFARIN",
            "risk_assessment": {"risk_label": "Adjust Dosage", "severity": "moderate"},
            "pharmacogenomic_profile": {"primary_gene": "CYP2C9", "phenotype": "IM"}
        }));

        let json = to_pretty(&vec![record]).expect("json");
        assert!(json.contains('\n'));
        assert!(json.contains("\"drug\": \"WARFARIN\""));
        assert!(json.contains("\"label\": \"Adjust Dosage\""));
        assert!(json.contains("\"primary_gene\": \"CYP2C9\""));
        assert!(json.contains("\"risk_tag\": \"high\""));
    }

    #[test]
    fn absent_optional_sections_are_omitted() {
        let json = to_pretty(&AnalysisRecord::default()).expect("json");
        assert!(json.contains("\"drug\": null"));
        assert!(json.contains("\"risk_tag\": null"));
        assert!(!json.contains("recommendation"));
        assert!(!json.contains("detected_variants"));
    }
}
