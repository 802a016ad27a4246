//! HTML dashboard output
//!
//! The dashboard is a single self-contained page: the template carries the
//! D3.js renderers and the report bundle is injected as one JSON literal.
//! Everything the charts need (colors included) is precomputed in the
//! bundle, so the page works from `file://` with no further requests
//! beyond the D3 CDN.

use crate::report::ReportBundle;
use std::io::{self, Write};

const TEMPLATE: &str = include_str!("dashboard.html");

pub fn write<W: Write>(writer: &mut W, bundle: &ReportBundle) -> io::Result<()> {
    let json = serde_json::to_string(bundle)?;
    // A literal "</script>" inside user text would end the data block early.
    let json = json.replace("</", "<\\/");

    let html = TEMPLATE
        .replace("{{CURVE_LABEL}}", &title_case(bundle.params.curve_kind.label()))
        .replace("{{DIST_LABEL}}", &title_case(bundle.params.dist_kind.label()))
        .replace("{{BUNDLE_JSON}}", &json);
    writer.write_all(html.as_bytes())
}

fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
