//! Spreadsheet ingestion
//!
//! Reads the first worksheet of a workbook into a plain table of strings:
//! the first row is the header row, missing cells read as empty strings.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Xlsx};
use casepilot_common::{Error, Result};
use tracing::debug;

/// Workbook formats the reader accepts by file extension
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// First worksheet of a workbook, as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SheetTable {
    /// Build a table from already-extracted text. Rows shorter than the
    /// header row are padded with empty cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .collect();

        Self { headers, rows }
    }

    /// Open a workbook from disk and read its first worksheet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::UnsupportedFileType(format!(
                "{} (supported: {})",
                path.display(),
                SUPPORTED_EXTENSIONS.join(", ")
            )));
        }

        let mut workbook = open_workbook_auto(path).map_err(|e| {
            Error::Spreadsheet(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Spreadsheet("No worksheet found".to_string()))?
            .map_err(|e| Error::Spreadsheet(format!("Failed to read worksheet: {}", e)))?;

        debug!("Read {} from {}", describe(&range), path.display());
        Ok(Self::from_range(&range))
    }

    /// Read the first worksheet of an in-memory `.xlsx` document
    pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Self> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
            .map_err(|e| Error::UnsupportedFileType(format!("Not an xlsx document: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::Spreadsheet("No worksheet found".to_string()))?
            .map_err(|e| Error::Spreadsheet(format!("Failed to read worksheet: {}", e)))?;

        debug!("Read {} from memory", describe(&range));
        Ok(Self::from_range(&range))
    }

    /// Convert a calamine range, treating the first row as headers
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(row) => row.iter().map(cell_text).collect(),
            None => return Self::default(),
        };
        let body = rows.map(|row| row.iter().map(cell_text).collect()).collect();
        Self::new(headers, body)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell text, or `""` when the cell is missing
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn describe(range: &Range<Data>) -> String {
    let (height, width) = range.get_size();
    format!("{}x{} cells", height, width)
}

/// Text of one cell. Whole floats print without a fractional part so numeric
/// IDs read the same as they were typed.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = SheetTable::new(
            strings(&["ID", "Action", "Expected"]),
            vec![strings(&["TC1", "Open app"])],
        );
        assert_eq!(table.cell(0, 2), "");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn test_blank_rows_are_dropped() {
        let table = SheetTable::new(
            strings(&["ID", "Action"]),
            vec![strings(&["TC1", "Open"]), strings(&["", "  "]), strings(&["", "Close"])],
        );
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, 1), "Close");
    }

    #[test]
    fn test_cell_text_numbers() {
        assert_eq!(cell_text(&Data::Float(101.0)), "101");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("  Login \n".to_string())), "Login");
    }

    #[test]
    fn test_range_first_row_is_header() {
        let mut range: Range<Data> = Range::new((0, 0), (3, 2));
        range.set_value((0, 0), Data::String("Test Case ID".to_string()));
        range.set_value((0, 1), Data::String("Action".to_string()));
        range.set_value((0, 2), Data::String("Expected Result".to_string()));
        range.set_value((1, 0), Data::Float(101.0));
        range.set_value((1, 1), Data::String(" Open app ".to_string()));
        // Row 2 stays empty, row 3 only fills the middle column
        range.set_value((3, 1), Data::String("Login".to_string()));

        let table = SheetTable::from_range(&range);
        assert_eq!(table.headers(), strings(&["Test Case ID", "Action", "Expected Result"]));
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows()[0], strings(&["101", "Open app", ""]));
        assert_eq!(table.rows()[1], strings(&["", "Login", ""]));
    }

    #[test]
    fn test_empty_range_has_no_headers() {
        let table = SheetTable::from_range(&Range::<Data>::empty());
        assert!(table.headers().is_empty());
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.csv");
        std::fs::write(&path, "ID,Action\n").unwrap();

        let err = SheetTable::open(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_garbage_bytes_are_rejected() {
        let err = SheetTable::from_xlsx_bytes(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));
    }
}
