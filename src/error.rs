//! Error types shared by every stage of the dashboard pipeline.

use thiserror::Error;

/// Errors raised while loading, filtering, charting or exporting a table.
///
/// The `Display` text of each variant is what the user sees, so messages
/// are written as complete sentences about their input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    /// The uploaded file could not be turned into a table
    #[error("Could not read the uploaded file: {0}")]
    Parse(String),

    /// The chart cannot be drawn from the chosen columns
    #[error("Cannot draw chart: {0}")]
    Render(String),

    /// The chart was built but could not be turned into an image
    #[error("Could not encode chart image: {0}")]
    Encoding(String),

    #[error("Column '{0}' does not exist")]
    ColumnNotFound(String),

    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    /// Column lengths differ or a column name is repeated
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("No data loaded. Upload a CSV or Excel file first")]
    NoTable,

    #[error("Could not export data: {0}")]
    Export(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for dashboard operations
pub type Result<T> = std::result::Result<T, DashboardError>;

impl From<csv::Error> for DashboardError {
    fn from(err: csv::Error) -> Self {
        DashboardError::Parse(err.to_string())
    }
}

impl From<calamine::Error> for DashboardError {
    fn from(err: calamine::Error) -> Self {
        DashboardError::Parse(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for DashboardError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        DashboardError::Export(err.to_string())
    }
}

impl From<image::ImageError> for DashboardError {
    fn from(err: image::ImageError) -> Self {
        DashboardError::Encoding(err.to_string())
    }
}
