//! Report rendering: HTML cards, terminal Markdown, and JSON.

use std::sync::OnceLock;

use minijinja::{AutoEscape, Environment};

use crate::error::PharmGuardError;

pub mod html;
pub mod json;
pub mod markdown;
pub mod view;

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

fn env() -> Result<&'static Environment<'static>, PharmGuardError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    // Server-supplied text is untrusted; HTML templates always escape it.
    env.set_auto_escape_callback(|name| {
        if name.ends_with(".html.j2") {
            AutoEscape::Html
        } else {
            AutoEscape::None
        }
    });
    env.add_filter("or_na", |value: Option<String>| -> String {
        match value {
            Some(v) if !v.is_empty() => v,
            _ => "N/A".to_string(),
        }
    });
    env.add_template("card.html.j2", include_str!("../../templates/card.html.j2"))?;
    env.add_template(
        "report_page.html.j2",
        include_str!("../../templates/report_page.html.j2"),
    )?;
    env.add_template("report.md.j2", include_str!("../../templates/report.md.j2"))?;

    let _ = ENV.set(env);
    ENV.get().ok_or_else(|| {
        PharmGuardError::InvalidArgument("template environment failed to initialize".into())
    })
}
