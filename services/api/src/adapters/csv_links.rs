//! services/api/src/adapters/csv_links.rs
//!
//! Spreadsheet plumbing at the HTTP boundary: pulling the link column out of
//! an uploaded CSV, and writing a session's rows back out as CSV.

use review_core::domain::Row;
use review_core::ports::{PortError, PortResult};
use std::collections::HashSet;

/// Column names tried, in order, before falling back to a substring match.
const LINK_HEADERS: [&str; 2] = ["link", "url"];

/// Decodes an uploaded file, tolerating a UTF-8 BOM and Latin-1 exports.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn link_column(headers: &csv::StringRecord) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    LINK_HEADERS
        .iter()
        .find_map(|wanted| lowered.iter().position(|h| h == wanted))
        .or_else(|| {
            lowered
                .iter()
                .position(|h| LINK_HEADERS.iter().any(|wanted| h.contains(wanted)))
        })
}

/// Returns the raw link cell of every data row, in file order.
///
/// Cells are not trimmed or filtered here; empty links still count toward
/// the batch length.
pub fn extract_links(bytes: &[u8]) -> PortResult<Vec<String>> {
    let text = decode(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| PortError::Validation(format!("Failed to read CSV: {}", e)))?
        .clone();
    let column = link_column(&headers).ok_or_else(|| {
        PortError::Validation(
            "'link' column not found in CSV (expected a column named Link, URL, etc.)"
                .to_string(),
        )
    })?;

    let mut links = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| PortError::Validation(format!("Failed to read CSV: {}", e)))?;
        links.push(record.get(column).unwrap_or_default().to_string());
    }
    Ok(links)
}

/// Renders rows as CSV, keeping only the first row for any repeated link.
pub fn render_rows(rows: &[Row]) -> PortResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let write_err = |e: csv::Error| PortError::Unexpected(format!("Failed to write CSV: {}", e));

    writer
        .write_record(["link", "Status", "Feedback", "Verified By"])
        .map_err(write_err)?;
    let mut seen = HashSet::new();
    for row in rows.iter().filter(|r| seen.insert(r.link.as_str())) {
        writer
            .write_record([
                row.link.as_str(),
                row.status.as_str(),
                row.feedback.as_str(),
                row.verified_by.as_str(),
            ])
            .map_err(write_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| PortError::Unexpected(format!("Failed to flush CSV: {}", e)))
}
