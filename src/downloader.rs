use crate::error::{DashboardError, Result};
use crate::table::{ColumnData, Table};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Deserialize;
use std::str::FromStr;

/// Formats the filtered table can be exported in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "filtered_data.csv",
            ExportFormat::Xlsx => "filtered_data.xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(DashboardError::Export(format!("unknown export format '{}'", other))),
        }
    }
}

/// Export a table in the requested format
pub fn export(table: &Table, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => to_csv(table).map(String::into_bytes),
        ExportFormat::Xlsx => to_xlsx(table),
    }
}

/// Convert a table to CSV format
///
/// The header row holds the column names; numbers are written without a
/// trailing `.0` and missing values as empty fields. Quoting of commas,
/// quotes and newlines is handled by the `csv` writer.
///
/// # Examples
/// ```
/// use dashboard::downloader::to_csv;
/// use dashboard::table::{Column, Table};
///
/// let table = Table::new(vec![
///     Column::categorical("Month", vec!["Jan"]),
///     Column::numeric("Sales", vec![100.0]),
/// ])
/// .unwrap();
/// assert_eq!(to_csv(&table).unwrap(), "Month,Sales\nJan,100\n");
/// ```
pub fn to_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .map_err(|e| DashboardError::Export(e.to_string()))?;

    for row in 0..table.height() {
        let record: Vec<String> = table.columns().iter().map(|c| c.display(row)).collect();
        writer
            .write_record(&record)
            .map_err(|e| DashboardError::Export(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DashboardError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DashboardError::Export(e.to_string()))
}

/// Convert a table to XLSX format
///
/// Numeric columns are written as numbers so the sheet stays usable for
/// calculations; missing values are left blank.
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Data")?;

    for (c, column) in table.columns().iter().enumerate() {
        let col = c as u16;
        worksheet.write_string(0, col, column.name.as_str())?;
        match &column.data {
            ColumnData::Numeric(values) => {
                for (r, value) in values.iter().enumerate() {
                    if !value.is_nan() {
                        worksheet.write_number(r as u32 + 1, col, *value)?;
                    }
                }
            }
            ColumnData::Categorical(values) => {
                for (r, value) in values.iter().enumerate() {
                    if !value.is_empty() {
                        worksheet.write_string(r as u32 + 1, col, value.as_str())?;
                    }
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{from_csv, from_excel};
    use crate::table::Column;

    fn table() -> Table {
        Table::new(vec![
            Column::categorical("Name", vec!["Smith, J", "Lee"]),
            Column::numeric("Score", vec![9.5, f64::NAN]),
        ])
        .unwrap()
    }

    #[test]
    fn csv_quotes_and_blanks() {
        let csv = to_csv(&table()).unwrap();
        assert_eq!(csv, "Name,Score\n\"Smith, J\",9.5\nLee,\n");
    }

    #[test]
    fn csv_export_reloads_to_same_table() {
        let reloaded = from_csv(to_csv(&table()).unwrap().as_bytes()).unwrap();
        assert_eq!(reloaded.column("Name"), table().column("Name"));
        assert_eq!(reloaded.height(), 2);
    }

    #[test]
    fn xlsx_export_keeps_numbers_numeric() {
        let bytes = to_xlsx(&table()).unwrap();
        let reloaded = from_excel(&bytes).unwrap();
        assert_eq!(reloaded.column_names(), vec!["Name", "Score"]);
        let score = reloaded.column("Score").unwrap().as_numeric().unwrap();
        assert_eq!(score[0], 9.5);
    }

    #[test]
    fn format_names() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::Csv.file_name(), "filtered_data.csv");
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
