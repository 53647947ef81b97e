//! Bulk client import.
//!
//! The first row is the header; columns are matched by name, so their order
//! in the file does not matter and unknown columns are ignored.

use crate::types::ClientRecord;
use calamine::{Reader, Xlsx, open_workbook_from_rs};
use std::io::Cursor;
use thiserror::Error;

/// Why an upload could not be turned into client records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Unsupported file type: {0}. Please upload a CSV or Excel (.xlsx) file")]
    UnsupportedFile(String),

    #[error("File must contain header and data rows")]
    TooFewRows,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("No valid client records found in the file")]
    NoValidRecords,

    #[error("Could not read Excel file: {0}")]
    Excel(String),
}

/// Accepted upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Xlsx,
}

impl FileKind {
    /// Detect the format from the file name's extension.
    pub fn from_filename(filename: &str) -> Result<Self, UploadError> {
        let lower = filename.trim().to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(Self::Csv)
        } else if lower.ends_with(".xlsx") {
            Ok(Self::Xlsx)
        } else {
            Err(UploadError::UnsupportedFile(filename.trim().to_string()))
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

/// Outcome of parsing an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUpload {
    pub kind: FileKind,
    pub records: Vec<ClientRecord>,
    /// Data rows dropped for lacking customer id, name or mobile number.
    pub skipped: usize,
}

/// Parse an uploaded client file.
pub fn parse_upload(filename: &str, bytes: &[u8]) -> Result<ParsedUpload, UploadError> {
    let kind = FileKind::from_filename(filename)?;
    let rows = match kind {
        FileKind::Csv => csv_rows(&String::from_utf8_lossy(bytes)),
        FileKind::Xlsx => xlsx_rows(bytes)?,
    };
    let (records, skipped) = records_from_rows(&rows)?;
    Ok(ParsedUpload {
        kind,
        records,
        skipped,
    })
}

// =============================================================================
// CSV
// =============================================================================

/// Split CSV text into trimmed cells, dropping blank lines.
#[must_use]
pub fn csv_rows(text: &str) -> Vec<Vec<String>> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_csv_line)
        .collect()
}

/// Split one CSV line on commas outside double quotes.
///
/// Quote characters are removed from the cells; `""` inside a quoted cell
/// is kept as a literal quote.
#[must_use]
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                cell.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(ch),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

// =============================================================================
// XLSX
// =============================================================================

fn xlsx_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, UploadError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|err: calamine::XlsxError| UploadError::Excel(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| UploadError::Excel("workbook has no worksheets".into()))?
        .map_err(|err| UploadError::Excel(err.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string().trim().to_string()).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect())
}

// =============================================================================
// COLUMN MAPPING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    CustomerId,
    Name,
    MobileNumber,
    Address,
    Category,
    Panchayath,
    District,
    Ward,
    AgentPro,
    Preference,
    Status,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        let column = match header.trim().to_lowercase().as_str() {
            "customer id" => Self::CustomerId,
            "name" => Self::Name,
            "mobile number" => Self::MobileNumber,
            "address" => Self::Address,
            "category" => Self::Category,
            "panchayath" => Self::Panchayath,
            "district" => Self::District,
            "ward" => Self::Ward,
            "agent/pro" => Self::AgentPro,
            "preference" => Self::Preference,
            "status" => Self::Status,
            _ => return None,
        };
        Some(column)
    }

    fn header(self) -> &'static str {
        match self {
            Self::CustomerId => "customer id",
            Self::Name => "name",
            Self::MobileNumber => "mobile number",
            Self::Address => "address",
            Self::Category => "category",
            Self::Panchayath => "panchayath",
            Self::District => "district",
            Self::Ward => "ward",
            Self::AgentPro => "agent/pro",
            Self::Preference => "preference",
            Self::Status => "status",
        }
    }
}

const REQUIRED: [Column; 3] = [Column::CustomerId, Column::Name, Column::MobileNumber];

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn records_from_rows(rows: &[Vec<String>]) -> Result<(Vec<ClientRecord>, usize), UploadError> {
    let [header, data @ ..] = rows else {
        return Err(UploadError::TooFewRows);
    };
    if data.is_empty() {
        return Err(UploadError::TooFewRows);
    }

    let columns: Vec<Option<Column>> = header.iter().map(|h| Column::from_header(h)).collect();
    let missing: Vec<String> = REQUIRED
        .iter()
        .filter(|required| !columns.contains(&Some(**required)))
        .map(|c| c.header().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(UploadError::MissingColumns(missing));
    }

    let mut records = Vec::with_capacity(data.len());
    let mut skipped = 0;
    for row in data {
        let mut record = ClientRecord::default();
        for (column, value) in columns.iter().zip(row.iter()) {
            let Some(column) = column else { continue };
            let value = value.trim();
            match column {
                Column::CustomerId => record.customer_id = value.to_string(),
                Column::Name => record.name = value.to_string(),
                Column::MobileNumber => record.mobile_number = value.to_string(),
                Column::Address => record.address = optional(value),
                Column::Category => record.category = optional(value),
                Column::Panchayath => record.panchayath = optional(value),
                Column::District => record.district = optional(value),
                Column::Ward => record.ward = optional(value),
                Column::AgentPro => record.agent_pro = optional(value),
                Column::Preference => record.preference = optional(value),
                Column::Status => record.status = optional(value),
            }
        }
        if record.customer_id.is_empty() || record.name.is_empty() || record.mobile_number.is_empty()
        {
            skipped += 1;
        } else {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(UploadError::NoValidRecords);
    }
    Ok((records, skipped))
}
