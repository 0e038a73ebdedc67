//! Liveness report export.

use common::{Error, Result};
use liveness::ServerStatus;
use liveness::types::format_timestamp;

pub const REPORT_HEADER: [&str; 7] = [
    "Server",
    "Primary Address",
    "Management Address",
    "Primary State",
    "Management State",
    "Last Success Primary",
    "Last Success Management",
];

/// Render status rows as a CSV report.
///
/// Timestamps are RFC 3339 with second precision; an address that never
/// answered gets an empty cell.
pub fn render_report(rows: &[ServerStatus]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADER).map_err(Error::other)?;

    for row in rows {
        let primary_last = row.primary_last_success.map(format_timestamp).unwrap_or_default();
        let management_last = row
            .management_last_success
            .map(format_timestamp)
            .unwrap_or_default();

        writer
            .write_record([
                row.name.as_str(),
                row.primary_address.as_str(),
                row.management_address.as_str(),
                row.primary_up.as_str(),
                row.management_up.as_str(),
                primary_last.as_str(),
                management_last.as_str(),
            ])
            .map_err(Error::other)?;
    }

    writer.into_inner().map_err(|e| Error::other(e.error()))
}
