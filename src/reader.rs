use std::path::Path;

use tracing::{debug, info};

use crate::error::{LoanbookError, Result};
use crate::models::COLUMN_COUNT;
use crate::normalize::{is_blank_like, to_text, RawCell};

/// Rows read from one ledger extract.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    /// First row of the sheet, normalized as text and padded to the column count.
    pub headers: Vec<String>,
    /// Data rows up to (not including) the first row with a blank first column.
    pub rows: Vec<Vec<RawCell>>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Rows to skip before data starts. `MC_NBU` exports carry an extra banner row.
pub fn data_offset(file_path: &Path) -> usize {
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.contains("MC_NBU") {
        2
    } else {
        1
    }
}

fn header_row(first: Option<&Vec<RawCell>>) -> Vec<String> {
    let mut headers: Vec<String> = first
        .map(|row| row.iter().take(COLUMN_COUNT).map(to_text).collect())
        .unwrap_or_default();
    headers.resize(COLUMN_COUNT, String::new());
    headers
}

/// Split a sheet into header and data rows, stopping at the first data row
/// whose first column is blank-like.
fn split_rows(all: Vec<Vec<RawCell>>, offset: usize) -> SourceRows {
    let headers = header_row(all.first());
    let rows = all
        .into_iter()
        .skip(offset)
        .take_while(|row| !row.first().map_or(true, is_blank_like))
        .map(|mut row| {
            row.truncate(COLUMN_COUNT);
            row
        })
        .collect();
    SourceRows { headers, rows }
}

// ---------------------------------------------------------------------------
// Source kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind {
    #[cfg(feature = "xlsx")]
    Workbook,
    Csv,
}

impl SourceKind {
    pub fn key(&self) -> &'static str {
        match self {
            #[cfg(feature = "xlsx")]
            Self::Workbook => "workbook",
            Self::Csv => "csv",
        }
    }

    fn extensions(&self) -> &[&str] {
        match self {
            #[cfg(feature = "xlsx")]
            Self::Workbook => &["xlsx", "xlsm", "xls", "xlsb", "ods"],
            Self::Csv => &["csv", "txt"],
        }
    }

    /// Every row of the file (or of the chosen sheet), untrimmed.
    #[cfg_attr(not(feature = "xlsx"), allow(unused_variables))]
    pub fn read_grid(&self, file_path: &Path, sheet_name: &str) -> Result<Vec<Vec<RawCell>>> {
        match self {
            #[cfg(feature = "xlsx")]
            Self::Workbook => read_workbook(file_path, sheet_name),
            Self::Csv => read_csv(file_path),
        }
    }

    pub fn read(&self, file_path: &Path, sheet_name: &str) -> Result<SourceRows> {
        let all = self.read_grid(file_path, sheet_name)?;
        let source = split_rows(all, data_offset(file_path));
        info!(
            file = %file_path.display(),
            kind = self.key(),
            rows = source.rows.len(),
            "read ledger extract"
        );
        Ok(source)
    }
}

const ALL_SOURCES: &[SourceKind] = &[
    #[cfg(feature = "xlsx")]
    SourceKind::Workbook,
    SourceKind::Csv,
];

pub fn get_for_file(file_path: &Path) -> Option<SourceKind> {
    let ext = file_path.extension()?.to_string_lossy().to_lowercase();
    ALL_SOURCES.iter().find(|k| k.extensions().contains(&ext.as_str())).copied()
}

fn kind_for(file_path: &Path) -> Result<SourceKind> {
    get_for_file(file_path).ok_or_else(|| LoanbookError::UnknownFormat(file_path.to_path_buf()))
}

/// Ledger rows of one extract: fixed column count, banner skip and the
/// blank-first-column stop applied.
pub fn read_source(file_path: &Path, sheet_name: &str) -> Result<SourceRows> {
    kind_for(file_path)?.read(file_path, sheet_name)
}

/// A plain header-plus-rows table of any width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl DataTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }
}

/// Read a file as a generic table. The first row holds the headers; rows
/// with no non-empty cell are dropped and every row is padded to the
/// header width. Workbooks fall back to their first sheet when
/// `sheet_name` is absent.
pub fn read_table(file_path: &Path, sheet_name: &str) -> Result<DataTable> {
    let mut grid = kind_for(file_path)?.read_grid(file_path, sheet_name)?.into_iter();
    let headers: Vec<String> = grid.next().unwrap_or_default().iter().map(to_text).collect();
    let width = headers.len();
    let rows = grid
        .filter(|row| row.iter().any(|c| *c != RawCell::Empty))
        .map(|mut row| {
            row.resize(width, RawCell::Empty);
            row
        })
        .collect();
    debug!(file = %file_path.display(), columns = width, "read table");
    Ok(DataTable { headers, rows })
}

// ---------------------------------------------------------------------------
// Workbook reader (feature-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "xlsx")]
fn workbook_cell(data: &calamine::Data) -> RawCell {
    use calamine::Data;
    match data {
        Data::Int(i) => RawCell::Int(*i),
        Data::Float(f) => RawCell::Float(*f),
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => serial_to_datetime(dt.as_f64())
            .map(RawCell::Date)
            .unwrap_or(RawCell::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(_) | Data::Empty => RawCell::Empty,
    }
}

#[cfg(feature = "xlsx")]
fn serial_to_datetime(serial: f64) -> Option<chrono::NaiveDateTime> {
    let date = crate::normalize::excel_serial_to_date(serial)?;
    let seconds = (serial.fract() * 86_400.0).round() as u32;
    date.and_hms_opt(seconds / 3600 % 24, seconds / 60 % 60, seconds % 60)
}

#[cfg(feature = "xlsx")]
fn read_workbook(file_path: &Path, sheet_name: &str) -> Result<Vec<Vec<RawCell>>> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)?;
    let names = workbook.sheet_names();
    let target = if names.iter().any(|n| n == sheet_name) {
        sheet_name.to_string()
    } else {
        let first = names.first().cloned().ok_or_else(|| {
            LoanbookError::Other(format!("Workbook has no sheets: {}", file_path.display()))
        })?;
        debug!(file = %file_path.display(), wanted = sheet_name, using = %first, "sheet not found, using first sheet");
        first
    };
    let range = workbook.worksheet_range(&target)?;

    // Ranges start at the first used cell; restore absolute positions.
    let (row0, col0) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; col0 as usize];
        cells.extend(row.iter().map(workbook_cell));
        rows.push(cells);
    }
    Ok(rows)
}

// ---------------------------------------------------------------------------
// CSV reader
// ---------------------------------------------------------------------------

/// Decode file bytes: UTF-8 (BOM stripped), otherwise Windows-1251.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1251.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Semicolon when the first line has more semicolons than commas.
fn detect_delimiter(content: &str) -> u8 {
    let first = content.lines().next().unwrap_or("");
    let semis = first.matches(';').count();
    let commas = first.matches(',').count();
    if semis > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv(file_path: &Path) -> Result<Vec<Vec<RawCell>>> {
    let content = decode_text(std::fs::read(file_path)?);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(&content))
        .from_reader(content.as_bytes());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|f| if f.is_empty() { RawCell::Empty } else { RawCell::Text(f.to_string()) })
                .collect(),
        );
    }
    Ok(rows)
}
