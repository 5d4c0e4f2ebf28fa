use minijinja::context;

use super::env;
use crate::entities::analysis::AnalysisRecord;
use crate::error::PharmGuardError;

pub fn report_markdown(records: &[AnalysisRecord]) -> Result<String, PharmGuardError> {
    let tmpl = env()?.get_template("report.md.j2")?;
    let body = tmpl.render(context! {
        records => records,
    })?;
    Ok(body)
}

pub fn drugs_markdown(drugs: &[&str]) -> String {
    let mut out = String::from("# Supported Drugs\n\n");
    for drug in drugs {
        out.push_str(&format!("- {drug}\n"));
    }
    out.push_str("\nThe backend rejects drugs outside this list; the client does not.\n");
    out
}
