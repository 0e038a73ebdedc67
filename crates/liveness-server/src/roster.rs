//! Roster ingestion from CSV or a spreadsheet workbook.
//!
//! Column 0 is the server name, column 1 the primary address and column 2
//! the management address. Short rows are padded with empty addresses, extra
//! columns are ignored, blank rows are skipped and every cell is trimmed.
//! Workbooks are read from their first worksheet.

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use common::{Error, Result};
use liveness::ServerRecord;
use serde::Deserialize;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info};

/// Encoding of an uploaded or configured roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterFormat {
    #[default]
    Csv,
    Xlsx,
}

impl RosterFormat {
    /// Format named by a `Content-Type` value, if it names one.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/csv" | "application/csv" => Some(RosterFormat::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.ms-excel.sheet.macroenabled.12"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(RosterFormat::Xlsx),
            _ => None,
        }
    }

    /// Format implied by a file extension; anything unrecognised is CSV.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => RosterFormat::Xlsx,
            _ => RosterFormat::Csv,
        }
    }
}

fn record_from_cells(name: &str, primary: &str, management: &str) -> Option<ServerRecord> {
    let server = ServerRecord::new(name.trim(), primary.trim(), management.trim());
    if server.name.is_empty()
        && server.primary_address.is_empty()
        && server.management_address.is_empty()
    {
        return None;
    }
    Some(server)
}

/// Parse a roster from any CSV source.
pub fn parse_roster<R: Read>(reader: R, has_headers: bool) -> Result<Vec<ServerRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut servers = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| match e.position() {
            Some(pos) => Error::roster(format!("line {}: {e}", pos.line())),
            None => Error::roster(e.to_string()),
        })?;
        let cell = |i: usize| record.get(i).unwrap_or("");

        match record_from_cells(cell(0), cell(1), cell(2)) {
            Some(server) => servers.push(server),
            None => {
                debug!(line = record.position().map(|p| p.line()), "Skipping blank roster row");
            }
        }
    }

    Ok(servers)
}

/// Parse a roster from the first worksheet of an xlsx, xls or ods workbook.
pub fn parse_roster_spreadsheet(bytes: &[u8], has_headers: bool) -> Result<Vec<ServerRecord>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::roster(format!("unreadable workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::roster("workbook has no worksheets"))?
        .map_err(|e| Error::roster(format!("unreadable worksheet: {e}")))?;

    // The range starts at the first used cell, not at A1.
    let (first_row, first_col) = range.start().unwrap_or((0, 0));
    let first_col = first_col as usize;

    let mut servers = Vec::new();
    for (offset, row) in range.rows().enumerate() {
        if has_headers && offset == 0 {
            continue;
        }
        let cell = |i: usize| -> String {
            i.checked_sub(first_col)
                .and_then(|i| row.get(i))
                .map(Data::to_string)
                .unwrap_or_default()
        };

        match record_from_cells(&cell(0), &cell(1), &cell(2)) {
            Some(server) => servers.push(server),
            None => {
                debug!(line = first_row as usize + offset + 1, "Skipping blank roster row");
            }
        }
    }

    Ok(servers)
}

/// Parse a roster held in memory as CSV.
pub fn parse_roster_bytes(bytes: &[u8], has_headers: bool) -> Result<Vec<ServerRecord>> {
    parse_roster(bytes, has_headers)
}

/// Parse a roster held in memory, as received by the upload endpoint.
pub fn parse_roster_as(
    bytes: &[u8],
    format: RosterFormat,
    has_headers: bool,
) -> Result<Vec<ServerRecord>> {
    match format {
        RosterFormat::Csv => parse_roster_bytes(bytes, has_headers),
        RosterFormat::Xlsx => parse_roster_spreadsheet(bytes, has_headers),
    }
}

/// Load a roster from disk; the extension selects CSV or spreadsheet.
pub fn load_roster_file(path: impl AsRef<Path>, has_headers: bool) -> Result<Vec<ServerRecord>> {
    let path = path.as_ref();
    let format = RosterFormat::from_path(path);
    let servers = match format {
        RosterFormat::Csv => parse_roster(File::open(path)?, has_headers)?,
        RosterFormat::Xlsx => parse_roster_spreadsheet(&std::fs::read(path)?, has_headers)?,
    };
    info!(
        path = %path.display(),
        format = ?format,
        servers = servers.len(),
        "Roster file loaded"
    );
    Ok(servers)
}
