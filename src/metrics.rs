//! Headline numbers shown above the charts.

use crate::error::{DashboardError, Result};
use crate::table::Table;
use serde::Serialize;

/// A labelled number together with its display text
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub label: String,
    pub value: f64,
    pub display: String,
}

impl Metric {
    pub fn new(label: &str, value: f64, display: String) -> Self {
        Metric {
            label: label.to_string(),
            value,
            display,
        }
    }
}

/// Sum of a numeric column, ignoring missing values
pub fn column_sum(table: &Table, column: &str) -> Result<f64> {
    let values = numeric(table, column)?;
    Ok(values.iter().filter(|v| !v.is_nan()).sum())
}

/// Mean of a numeric column, ignoring missing values. `None` when the
/// column holds no values.
pub fn column_mean(table: &Table, column: &str) -> Result<Option<f64>> {
    let values = numeric(table, column)?;
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return Ok(None);
    }
    Ok(Some(present.iter().sum::<f64>() / present.len() as f64))
}

fn numeric<'a>(table: &'a Table, column: &str) -> Result<&'a [f64]> {
    table
        .try_column(column)?
        .as_numeric()
        .ok_or_else(|| DashboardError::NotNumeric(column.to_string()))
}

/// Rounds to a whole number and groups thousands: `52000.4` -> `52,000`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Currency display used by the sales dashboard: `$52,000`
pub fn format_currency(value: f64) -> String {
    let text = format_thousands(value);
    match text.strip_prefix('-') {
        Some(rest) => format!("-${}", rest),
        None if value.is_finite() => format!("${}", text),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn thousands_are_grouped() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(4200.0), "4,200");
        assert_eq!(format_thousands(1234567.6), "1,234,568");
        assert_eq!(format_thousands(-5300.0), "-5,300");
    }

    #[test]
    fn currency_prefix() {
        assert_eq!(format_currency(63900.0), "$63,900");
        assert_eq!(format_currency(-12.0), "-$12");
        assert_eq!(format_currency(f64::NAN), "-");
    }

    #[test]
    fn sum_and_mean_skip_missing() {
        let table = Table::new(vec![Column::numeric("v", vec![1.0, f64::NAN, 3.0])]).unwrap();
        assert_eq!(column_sum(&table, "v").unwrap(), 4.0);
        assert_eq!(column_mean(&table, "v").unwrap(), Some(2.0));
    }

    #[test]
    fn mean_of_empty_column_is_none() {
        let table = Table::new(vec![Column::numeric("v", vec![])]).unwrap();
        assert_eq!(column_mean(&table, "v").unwrap(), None);
        assert_eq!(column_sum(&table, "v").unwrap(), 0.0);
    }
}
