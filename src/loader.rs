use crate::error::{DashboardError, Result};
use crate::table::{Column, Table};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Cursor;

/// How an upload was interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Picks the parser from the file name: `.csv` is delimited text,
    /// anything else is treated as a spreadsheet.
    pub fn from_filename(filename: &str) -> Self {
        if filename.to_lowercase().ends_with(".csv") {
            FileFormat::Csv
        } else {
            FileFormat::Spreadsheet
        }
    }
}

/// A raw cell before column types are inferred
#[derive(Clone, Debug, PartialEq)]
enum RawCell {
    Number(f64),
    Text(String),
    Empty,
}

impl RawCell {
    fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(trimmed.to_string())
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            RawCell::Number(n) => Some(*n),
            RawCell::Text(s) => s.parse::<f64>().ok().filter(|n| n.is_finite()),
            RawCell::Empty => None,
        }
    }

    fn into_text(self) -> String {
        match self {
            RawCell::Number(n) => crate::table::format_number(n),
            RawCell::Text(s) => s,
            RawCell::Empty => String::new(),
        }
    }
}

/// Load a table from uploaded bytes
///
/// The file name decides the parser: names ending in `.csv` are read as
/// comma-separated text, everything else as a spreadsheet whose first sheet
/// is used. In both cases the first row is the header.
///
/// # Arguments
/// * `bytes` - Raw contents of the upload
/// * `filename` - Original name of the uploaded file
///
/// # Returns
/// * `Result<Table>` - The parsed table, or `DashboardError::Parse`
///
/// # Examples
/// ```
/// use dashboard::loader::load_table;
///
/// let table = load_table(b"Month,Sales\nJan,100\nFeb,200\n", "sales.csv").unwrap();
/// assert_eq!(table.height(), 2);
/// assert!(table.column("Sales").unwrap().is_numeric());
/// ```
pub fn load_table(bytes: &[u8], filename: &str) -> Result<Table> {
    match FileFormat::from_filename(filename) {
        FileFormat::Csv => from_csv(bytes),
        FileFormat::Spreadsheet => from_excel(bytes),
    }
}

/// Parse comma-separated text with a header row
pub fn from_csv(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(DashboardError::Parse("file has no header row".to_string()));
    }

    let mut cells: Vec<Vec<RawCell>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (c, value) in record.iter().enumerate() {
            cells[c].push(RawCell::from_text(value));
        }
    }

    build_table(headers, cells)
}

/// Parse the first sheet of a spreadsheet workbook
///
/// The workbook format (xlsx, xls, ods) is detected from the content.
pub fn from_excel(bytes: &[u8]) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DashboardError::Parse("workbook contains no sheets".to_string()))??;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| DashboardError::Parse("sheet is empty".to_string()))?;

    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        })
        .collect();

    let mut cells: Vec<Vec<RawCell>> = vec![Vec::new(); headers.len()];
    for row in rows {
        // Skip fully blank rows left over from formatting
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        for (c, cell) in row.iter().enumerate().take(headers.len()) {
            cells[c].push(raw_from_data(cell));
        }
    }

    build_table(headers, cells)
}

fn raw_from_data(cell: &Data) -> RawCell {
    match cell {
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::String(s) => RawCell::from_text(s),
        Data::Empty => RawCell::Empty,
        other => RawCell::from_text(&other.to_string()),
    }
}

// Names blank headers by position and rejects duplicates
fn normalize_headers(headers: Vec<String>) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if name.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            };
            if !seen.insert(name.clone()) {
                return Err(DashboardError::Parse(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
            Ok(name)
        })
        .collect()
}

fn build_table(headers: Vec<String>, cells: Vec<Vec<RawCell>>) -> Result<Table> {
    let headers = normalize_headers(headers)?;
    let columns = headers
        .iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();

    Table::new(columns).map_err(|e| DashboardError::Parse(e.to_string()))
}

/// A column is numeric when it has at least one value and every non-empty
/// cell is a number.
fn infer_column(name: &str, raw: Vec<RawCell>) -> Column {
    let has_value = raw.iter().any(|c| *c != RawCell::Empty);
    let all_numeric = raw
        .iter()
        .all(|c| *c == RawCell::Empty || c.as_number().is_some());

    if has_value && all_numeric {
        let values = raw
            .iter()
            .map(|c| c.as_number().unwrap_or(f64::NAN))
            .collect();
        Column::numeric(name, values)
    } else {
        Column::categorical(name, raw.into_iter().map(RawCell::into_text).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnType;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn csv_with_header_yields_typed_columns() {
        let table = load_table(b"Month,Sales\nJan,100\nFeb,200\n", "data.csv").unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.column("Month").unwrap().column_type(), ColumnType::Categorical);
        let sales = table.column("Sales").unwrap();
        assert_eq!(sales.column_type(), ColumnType::Numeric);
        assert_eq!(sales.as_numeric(), Some(&[100.0, 200.0][..]));
    }

    #[test]
    fn csv_extension_is_case_insensitive() {
        assert_eq!(FileFormat::from_filename("REPORT.CSV"), FileFormat::Csv);
        assert_eq!(FileFormat::from_filename("report.xlsx"), FileFormat::Spreadsheet);
        assert_eq!(FileFormat::from_filename("report"), FileFormat::Spreadsheet);
    }

    #[test]
    fn empty_cells_in_numeric_column_become_missing() {
        let table = from_csv(b"a,b\n1,x\n,y\n3,z\n").unwrap();
        let a = table.column("a").unwrap().as_numeric().unwrap();
        assert_eq!(a[0], 1.0);
        assert!(a[1].is_nan());
        assert_eq!(a[2], 3.0);
    }

    #[test]
    fn mixed_column_stays_categorical() {
        let table = from_csv(b"code\n12\nA7\n").unwrap();
        let code = table.column("code").unwrap();
        assert!(!code.is_numeric());
        assert_eq!(code.display(0), "12");
    }

    #[test]
    fn ragged_rows_are_a_parse_error() {
        let err = from_csv(b"a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
    }

    #[test]
    fn empty_csv_is_a_parse_error() {
        let err = from_csv(b"").unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = from_csv(b"a,a\n1,2\n").unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
    }

    #[test]
    fn garbage_spreadsheet_is_a_parse_error() {
        let err = load_table(b"definitely not a workbook", "data.xlsx").unwrap_err();
        assert!(matches!(err, DashboardError::Parse(_)));
    }

    #[test]
    fn xlsx_first_sheet_is_loaded() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Region").unwrap();
        sheet.write_string(0, 1, "Revenue").unwrap();
        sheet.write_string(1, 0, "North").unwrap();
        sheet.write_number(1, 1, 1250.5).unwrap();
        sheet.write_string(2, 0, "South").unwrap();
        sheet.write_number(2, 1, 980.0).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = load_table(&bytes, "regions.xlsx").unwrap();
        assert_eq!(table.column_names(), vec!["Region", "Revenue"]);
        assert_eq!(table.height(), 2);
        assert_eq!(
            table.column("Revenue").unwrap().as_numeric(),
            Some(&[1250.5, 980.0][..])
        );
        assert_eq!(table.column("Region").unwrap().display(1), "South");
    }
}
