//! The filter -> chart -> metrics pipeline run on every interaction.
//!
//! Everything here is a pure function of its inputs: the shell passes the
//! current table and widget state in and gets a [`ViewModel`] back.

use crate::chart::{Chart, ChartKind, ChartSpec, build_chart};
use crate::error::{DashboardError, Result};
use crate::filter::{FilterSelection, apply_filter, group_sum};
use crate::metrics::{Metric, column_mean, column_sum, format_currency, format_thousands};
use crate::sample::{CATEGORY, CUSTOMERS, FILTER_COLUMNS, MONTH, SALES, YEAR};
use crate::table::{ColumnType, Table};
use serde::{Deserialize, Serialize};

/// Categorical columns with more distinct values than this get no filter widget
pub const MAX_FILTER_OPTIONS: usize = 50;

/// Rows included in the data preview
pub const PREVIEW_ROWS: usize = 10;

/// Columns chosen in the axis dropdowns
///
/// Unset `x` defaults to the first column, unset `y` to the first numeric
/// column, matching the dropdowns' initial state.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisSelection {
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl AxisSelection {
    pub fn new(x: &str, y: &str) -> Self {
        AxisSelection {
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            color: None,
            size: None,
        }
    }

    /// The x and y columns, with defaults filled in from `table`
    pub fn resolve(&self, table: &Table) -> Result<(String, String)> {
        let x = match &self.x {
            Some(x) => x.clone(),
            None => table
                .column_names()
                .into_iter()
                .next()
                .ok_or_else(|| DashboardError::Render("the table has no columns".to_string()))?,
        };
        let y = match &self.y {
            Some(y) => y.clone(),
            None => table.numeric_column_names().into_iter().next().ok_or_else(|| {
                DashboardError::Render("the table has no numeric columns to plot".to_string())
            })?,
        };
        Ok((x, y))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// One multi-select widget: every value present and those currently chosen
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterOptions {
    pub column: String,
    pub options: Vec<String>,
    pub selected: Vec<String>,
}

/// Everything the page shows after one interaction
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewModel {
    /// Rows left after filtering
    pub row_count: usize,
    pub total_rows: usize,
    pub columns: Vec<ColumnInfo>,
    pub numeric_columns: Vec<String>,
    pub filters: Vec<FilterOptions>,
    pub x: String,
    pub y: String,
    pub metrics: Vec<Metric>,
    pub charts: Vec<Chart>,
    pub preview: Vec<Vec<String>>,
}

/// Render the upload dashboard: filter `table`, then draw line, bar and
/// scatter charts of `y` against `x`.
///
/// A categorical x column is summed per category before the bar chart is
/// drawn; a numeric one is plotted row by row.
pub fn render(table: &Table, filter: &FilterSelection, axes: &AxisSelection) -> Result<ViewModel> {
    let (x, y) = axes.resolve(table)?;
    let filtered = apply_filter(table, filter)?;

    let charts = ChartKind::ALL
        .iter()
        .map(|&kind| upload_chart(&filtered, &x, &y, axes, kind))
        .collect::<Result<Vec<_>>>()?;

    let mut metrics = vec![Metric::new(
        "Rows",
        filtered.height() as f64,
        format_thousands(filtered.height() as f64),
    )];
    let total = column_sum(&filtered, &y)?;
    metrics.push(Metric::new(&format!("Total {}", y), total, format_thousands(total)));
    let mean = column_mean(&filtered, &y)?;
    metrics.push(Metric::new(
        &format!("Average {}", y),
        mean.unwrap_or(f64::NAN),
        mean.map(format_thousands).unwrap_or_else(|| "-".to_string()),
    ));

    let filter_columns: Vec<String> = table
        .categorical_column_names()
        .into_iter()
        .filter(|name| {
            table
                .column(name)
                .map(|c| c.distinct_values().len() <= MAX_FILTER_OPTIONS)
                .unwrap_or(false)
        })
        .collect();

    Ok(view_model(table, &filtered, filter, &filter_columns, x, y, metrics, charts))
}

/// Build one chart of the upload dashboard, as used by the download buttons
pub fn chart_for(
    table: &Table,
    filter: &FilterSelection,
    axes: &AxisSelection,
    kind: ChartKind,
) -> Result<Chart> {
    let (x, y) = axes.resolve(table)?;
    let filtered = apply_filter(table, filter)?;
    upload_chart(&filtered, &x, &y, axes, kind)
}

fn upload_chart(
    filtered: &Table,
    x: &str,
    y: &str,
    axes: &AxisSelection,
    kind: ChartKind,
) -> Result<Chart> {
    let x_categorical = filtered
        .column(x)
        .map(|c| !c.is_numeric())
        .unwrap_or(false);

    match kind {
        ChartKind::Bar if x_categorical => {
            // y is checked first so a text y column reports a render error
            let spec = ChartSpec::new(kind, x, y);
            build_chart(filtered, &spec)?;
            let grouped = group_sum(filtered, x, y)?;
            build_chart(&grouped, &spec)
        }
        _ => {
            let mut spec = ChartSpec::new(kind, x, y);
            if let Some(color) = &axes.color {
                spec = spec.with_color(color);
            }
            if kind == ChartKind::Scatter {
                if let Some(size) = &axes.size {
                    spec = spec.with_size(size);
                }
            }
            build_chart(filtered, &spec)
        }
    }
}

/// Render the sample sales dashboard
///
/// Line chart of monthly sales per year, total sales per category, and
/// sales against customers per category, plus three headline metrics.
pub fn render_sales(table: &Table, filter: &FilterSelection) -> Result<ViewModel> {
    let filtered = apply_filter(table, filter)?;

    let charts = ChartKind::ALL
        .iter()
        .map(|&kind| sales_chart_filtered(&filtered, kind))
        .collect::<Result<Vec<_>>>()?;

    let total_sales = column_sum(&filtered, SALES)?;
    let average_sales = column_mean(&filtered, SALES)?;
    let total_customers = column_sum(&filtered, CUSTOMERS)?;
    let metrics = vec![
        Metric::new("Total Sales", total_sales, format_currency(total_sales)),
        Metric::new(
            "Average Monthly Sales",
            average_sales.unwrap_or(f64::NAN),
            average_sales
                .map(format_currency)
                .unwrap_or_else(|| "-".to_string()),
        ),
        Metric::new(
            "Total Customers",
            total_customers,
            format_thousands(total_customers),
        ),
    ];

    let filter_columns: Vec<String> = FILTER_COLUMNS.iter().map(|c| c.to_string()).collect();
    Ok(view_model(
        table,
        &filtered,
        filter,
        &filter_columns,
        MONTH.to_string(),
        SALES.to_string(),
        metrics,
        charts,
    ))
}

/// One chart of the sales dashboard, as used by the download buttons
pub fn sales_chart(table: &Table, filter: &FilterSelection, kind: ChartKind) -> Result<Chart> {
    let filtered = apply_filter(table, filter)?;
    sales_chart_filtered(&filtered, kind)
}

fn sales_chart_filtered(filtered: &Table, kind: ChartKind) -> Result<Chart> {
    match kind {
        ChartKind::Line => {
            let spec = ChartSpec::new(kind, MONTH, SALES)
                .with_color(YEAR)
                .with_title("Sales Performance Over Time");
            build_chart(filtered, &spec)
        }
        ChartKind::Bar => {
            let spec = ChartSpec::new(kind, CATEGORY, SALES).with_title("Total Sales by Category");
            build_chart(&group_sum(filtered, CATEGORY, SALES)?, &spec)
        }
        ChartKind::Scatter => {
            let spec = ChartSpec::new(kind, CUSTOMERS, SALES)
                .with_color(CATEGORY)
                .with_size(SALES)
                .with_title("Sales vs Number of Customers");
            build_chart(filtered, &spec)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn view_model(
    table: &Table,
    filtered: &Table,
    filter: &FilterSelection,
    filter_columns: &[String],
    x: String,
    y: String,
    metrics: Vec<Metric>,
    charts: Vec<Chart>,
) -> ViewModel {
    let filters = filter_columns
        .iter()
        .filter_map(|name| {
            let options = table.column(name)?.distinct_values();
            let selected = match filter.accepted(name) {
                Some(accepted) => options
                    .iter()
                    .filter(|v| accepted.contains(*v))
                    .cloned()
                    .collect(),
                None => options.clone(),
            };
            Some(FilterOptions {
                column: name.clone(),
                options,
                selected,
            })
        })
        .collect();

    ViewModel {
        row_count: filtered.height(),
        total_rows: table.height(),
        columns: table
            .columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                column_type: c.column_type(),
            })
            .collect(),
        numeric_columns: table.numeric_column_names(),
        filters,
        x,
        y,
        metrics,
        charts,
        preview: filtered.head(PREVIEW_ROWS),
    }
}
