//! Chart objects built from a table and a chart spec.
//!
//! A [`Chart`] is a backend-independent description of what to draw: one
//! mark per row, grouped into series by an optional colour column. The
//! browser draws it from JSON and [`crate::graph`] rasterizes it to PNG.

use crate::error::{DashboardError, Result};
use crate::table::{Column, Table, format_number};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Available chart kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Marks joined in row order
    Line,
    /// One bar per mark, rising from zero
    Bar,
    /// Free-standing points, optionally sized by a numeric column
    Scatter,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Line, ChartKind::Bar, ChartKind::Scatter];

    /// Word joining the y and x column names in the derived title
    pub fn relation(self) -> &'static str {
        match self {
            ChartKind::Line => "over",
            ChartKind::Bar => "by",
            ChartKind::Scatter => "vs",
        }
    }

    /// File name used when the rasterized chart is downloaded
    pub fn download_name(self) -> &'static str {
        match self {
            ChartKind::Line => "line_chart.png",
            ChartKind::Bar => "bar_chart.png",
            ChartKind::Scatter => "scatter_plot.png",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            "scatter" => Ok(ChartKind::Scatter),
            other => Err(DashboardError::Render(format!("unknown chart kind '{}'", other))),
        }
    }
}

/// Description of one chart: kind, axis columns and title
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub title: String,
}

impl ChartSpec {
    /// Spec with the title derived as `"{y} {relation} {x}"`
    pub fn new(kind: ChartKind, x: &str, y: &str) -> Self {
        ChartSpec {
            kind,
            x: x.to_string(),
            y: y.to_string(),
            color: None,
            size: None,
            title: format!("{} {} {}", y, kind.relation(), x),
        }
    }

    pub fn with_color(mut self, column: &str) -> Self {
        self.color = Some(column.to_string());
        self
    }

    pub fn with_size(mut self, column: &str) -> Self {
        self.size = Some(column.to_string());
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
}

/// Position of a mark along the x axis
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum XValue {
    Number(f64),
    Category(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mark {
    pub x: XValue,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Row of the source table this mark was drawn from
    pub row: usize,
}

/// Marks sharing one colour
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    /// Value of the colour column, `None` when the chart is not grouped
    pub name: Option<String>,
    pub marks: Vec<Mark>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Axis {
    Numeric { min: f64, max: f64 },
    Categorical { categories: Vec<String> },
}

/// A chart ready to be drawn
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chart {
    pub spec: ChartSpec,
    pub x_axis: Axis,
    /// Range of the y values, `None` for a chart without marks
    pub y_range: Option<(f64, f64)>,
    pub series: Vec<Series>,
}

impl Chart {
    pub fn mark_count(&self) -> usize {
        self.series.iter().map(|s| s.marks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.mark_count() == 0
    }
}

/// Build a chart from an already filtered table.
///
/// Zero rows produce an empty chart. The y column (and the size column, if
/// any) must be numeric, and a size column is only accepted for scatter
/// charts; anything else fails with `DashboardError::Render`.
pub fn build_chart(table: &Table, spec: &ChartSpec) -> Result<Chart> {
    let x_column = render_column(table, &spec.x)?;
    let y_values = numeric_column(table, &spec.y, "y")?;

    let color_column = match &spec.color {
        Some(name) => Some(render_column(table, name)?),
        None => None,
    };

    let sizes = match (&spec.size, spec.kind) {
        (Some(name), ChartKind::Scatter) => Some(numeric_column(table, name, "size")?),
        (Some(_), kind) => {
            return Err(DashboardError::Render(format!(
                "marker size is only supported for scatter charts, not {} charts",
                kind
            )));
        }
        (None, _) => None,
    };

    let x_numeric = x_column.as_numeric();
    let mut order: Vec<Option<String>> = Vec::new();
    let mut grouped: HashMap<Option<String>, Vec<Mark>> = HashMap::new();

    for (row, &y) in y_values.iter().enumerate() {
        if y.is_nan() {
            continue;
        }
        let x = match x_numeric {
            Some(values) if values[row].is_nan() => continue,
            Some(values) => XValue::Number(values[row]),
            None => XValue::Category(x_column.display(row)),
        };
        let size = sizes.map(|s| s[row]).filter(|s| !s.is_nan());
        let key = color_column.map(|c| c.display(row));

        grouped
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(Mark { x, y, size, row });
    }

    let series: Vec<Series> = order
        .into_iter()
        .map(|name| {
            let marks = grouped.remove(&name).unwrap_or_default();
            Series { name, marks }
        })
        .collect();

    let x_axis = match x_numeric {
        Some(_) => {
            let (min, max) = range(series.iter().flat_map(|s| &s.marks).filter_map(|m| match m.x {
                XValue::Number(n) => Some(n),
                XValue::Category(_) => None,
            }))
            .unwrap_or((0.0, 1.0));
            Axis::Numeric { min, max }
        }
        None => Axis::Categorical {
            categories: categories(&series),
        },
    };
    let y_range = range(series.iter().flat_map(|s| s.marks.iter().map(|m| m.y)));

    Ok(Chart {
        spec: spec.clone(),
        x_axis,
        y_range,
        series,
    })
}

fn render_column<'a>(table: &'a Table, name: &str) -> Result<&'a Column> {
    table
        .column(name)
        .ok_or_else(|| DashboardError::Render(format!("column '{}' does not exist", name)))
}

fn numeric_column<'a>(table: &'a Table, name: &str, role: &str) -> Result<&'a [f64]> {
    render_column(table, name)?.as_numeric().ok_or_else(|| {
        DashboardError::Render(format!("{} column '{}' must be numeric", role, name))
    })
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

// Category labels across all series, in order of first appearance
fn categories(series: &[Series]) -> Vec<String> {
    let mut seen: Vec<(usize, String)> = series
        .iter()
        .flat_map(|s| &s.marks)
        .filter_map(|m| match &m.x {
            XValue::Category(c) => Some((m.row, c.clone())),
            XValue::Number(n) => Some((m.row, format_number(*n))),
        })
        .collect();
    seen.sort_by_key(|(row, _)| *row);

    let mut out: Vec<String> = Vec::new();
    for (_, label) in seen {
        if !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(vec![
            Column::categorical("Month", vec!["Jan", "Feb", "Jan", "Feb"]),
            Column::categorical("Year", vec!["2023", "2023", "2024", "2024"]),
            Column::numeric("Sales", vec![100.0, 200.0, 150.0, f64::NAN]),
            Column::numeric("Customers", vec![10.0, 20.0, 15.0, 25.0]),
        ])
        .unwrap()
    }

    #[test]
    fn titles_use_the_kind_relation() {
        assert_eq!(ChartSpec::new(ChartKind::Line, "Month", "Sales").title, "Sales over Month");
        assert_eq!(ChartSpec::new(ChartKind::Bar, "Category", "Sales").title, "Sales by Category");
        assert_eq!(
            ChartSpec::new(ChartKind::Scatter, "Customers", "Sales").title,
            "Sales vs Customers"
        );
    }

    #[test]
    fn download_names() {
        assert_eq!(ChartKind::Line.download_name(), "line_chart.png");
        assert_eq!(ChartKind::Bar.download_name(), "bar_chart.png");
        assert_eq!(ChartKind::Scatter.download_name(), "scatter_plot.png");
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Scatter".parse::<ChartKind>().unwrap(), ChartKind::Scatter);
        assert!("pie".parse::<ChartKind>().is_err());
    }

    #[test]
    fn colour_column_splits_series_in_first_appearance_order() {
        let spec = ChartSpec::new(ChartKind::Line, "Month", "Sales").with_color("Year");
        let chart = build_chart(&table(), &spec).unwrap();

        let names: Vec<_> = chart.series.iter().map(|s| s.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["2023", "2024"]);
        // the missing Sales value in the last row is skipped
        assert_eq!(chart.mark_count(), 3);
        assert_eq!(
            chart.x_axis,
            Axis::Categorical {
                categories: vec!["Jan".to_string(), "Feb".to_string()]
            }
        );
        assert_eq!(chart.y_range, Some((100.0, 200.0)));
    }

    #[test]
    fn scatter_marks_carry_size() {
        let spec = ChartSpec::new(ChartKind::Scatter, "Customers", "Sales").with_size("Sales");
        let chart = build_chart(&table(), &spec).unwrap();
        let mark = &chart.series[0].marks[0];
        assert_eq!(mark.x, XValue::Number(10.0));
        assert_eq!(mark.size, Some(100.0));
        assert_eq!(chart.x_axis, Axis::Numeric { min: 10.0, max: 20.0 });
    }

    #[test]
    fn zero_rows_render_an_empty_chart() {
        let empty = table().take_rows(&[]);
        let spec = ChartSpec::new(ChartKind::Bar, "Month", "Sales");
        let chart = build_chart(&empty, &spec).unwrap();
        assert!(chart.is_empty());
        assert!(chart.series.is_empty());
        assert_eq!(chart.y_range, None);
    }

    #[test]
    fn non_numeric_y_is_a_render_error() {
        let spec = ChartSpec::new(ChartKind::Line, "Sales", "Month");
        let err = build_chart(&table(), &spec).unwrap_err();
        assert!(matches!(err, DashboardError::Render(_)));
    }

    #[test]
    fn size_on_line_chart_is_rejected() {
        let spec = ChartSpec::new(ChartKind::Line, "Month", "Sales").with_size("Customers");
        assert!(matches!(build_chart(&table(), &spec), Err(DashboardError::Render(_))));
    }

    #[test]
    fn missing_column_is_a_render_error() {
        let spec = ChartSpec::new(ChartKind::Bar, "Region", "Sales");
        assert!(matches!(build_chart(&table(), &spec), Err(DashboardError::Render(_))));
    }
}
