use minijinja::{Value, context};
use tracing::debug;

use super::env;
use super::view::{ReportPanel, StatusLine};
use crate::entities::analysis::{AnalysisRecord, AnalysisResponse};
use crate::error::PharmGuardError;

const PAGE_TITLE: &str = "PharmGuard Report";

/// Renders one record as a card. Every interpolated field is HTML-escaped.
pub fn card_html(record: &AnalysisRecord) -> Result<String, PharmGuardError> {
    let tmpl = env()?.get_template("card.html.j2")?;
    let body = tmpl.render(context! {
        risk_class => record.risk_class(),
        drug => &record.drug,
        risk => &record.risk.label,
        severity => &record.risk.severity,
        gene => &record.profile.primary_gene,
        phenotype => &record.profile.phenotype,
    })?;
    Ok(body)
}

/// Replaces the panel's content with one card per record, in order.
pub fn render_records(
    panel: &ReportPanel,
    records: &[AnalysisRecord],
) -> Result<usize, PharmGuardError> {
    panel.clear();
    for record in records {
        panel.append(card_html(record)?);
    }
    debug!(cards = records.len(), "report rendered");
    Ok(records.len())
}

/// Normalizes a raw `/analyze` response and renders it into `panel`.
///
/// Returns the normalized records so callers can offer other views of the same data.
pub fn render_report(
    panel: &ReportPanel,
    response: &serde_json::Value,
) -> Result<Vec<AnalysisRecord>, PharmGuardError> {
    let records = AnalysisResponse::from_value(response).into_records();
    render_records(panel, &records)?;
    Ok(records)
}

/// Standalone HTML document holding the status line and the report panel.
pub fn report_page(panel: &ReportPanel, status: &StatusLine) -> Result<String, PharmGuardError> {
    let tmpl = env()?.get_template("report_page.html.j2")?;
    let body = tmpl.render(context! {
        title => PAGE_TITLE,
        status => status.text(),
        // Cards were escaped when they were rendered.
        report => Value::from_safe_string(panel.html()),
    })?;
    Ok(body)
}
