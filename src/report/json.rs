//! JSON report output
//!
//! The bundle, pretty-printed, exactly as the dashboard embeds it. Feed
//! it to jq or a notebook.

use super::ReportBundle;
use std::io::{self, Write};

pub fn write<W: Write>(writer: &mut W, bundle: &ReportBundle) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, bundle)?;
    writer.write_all(b"\n")
}
