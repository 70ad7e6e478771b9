//! Row filtering and group-by aggregation over a [`Table`].

use crate::error::{DashboardError, Result};
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Accepted values per column
///
/// A column that has no entry is not filtered, which is the same as
/// accepting every distinct value it contains.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSelection {
    accepted: BTreeMap<String, BTreeSet<String>>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `column` to the given values, replacing any earlier choice.
    pub fn select<I, S>(&mut self, column: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted.insert(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Selection accepting every distinct value of each named column
    pub fn all_of(table: &Table, columns: &[String]) -> Result<Self> {
        let mut selection = Self::new();
        for name in columns {
            let column = table.try_column(name)?;
            selection.select(name, column.distinct_values());
        }
        Ok(selection)
    }

    /// Accepted values for `column`, or `None` when it is unfiltered
    pub fn accepted(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.accepted.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

/// Keep the rows whose value in every filtered column is accepted.
///
/// Row order is preserved. Filtering on a column the table does not have
/// fails with `ColumnNotFound`.
pub fn apply_filter(table: &Table, selection: &FilterSelection) -> Result<Table> {
    if selection.is_empty() {
        return Ok(table.clone());
    }

    let mut checks: Vec<(&Column, &BTreeSet<String>)> = Vec::new();
    for (name, accepted) in &selection.accepted {
        checks.push((table.try_column(name)?, accepted));
    }

    let rows: Vec<usize> = (0..table.height())
        .filter(|&row| {
            checks
                .iter()
                .all(|(column, accepted)| accepted.contains(&column.display(row)))
        })
        .collect();

    Ok(table.take_rows(&rows))
}

/// Sum `value` per distinct `key`.
///
/// Produces a two-column table (`key`, `value`) with one row per key, in
/// order of first appearance. Missing values are skipped.
pub fn group_sum(table: &Table, key: &str, value: &str) -> Result<Table> {
    let key_column = table.try_column(key)?;
    let values = table
        .try_column(value)?
        .as_numeric()
        .ok_or_else(|| DashboardError::NotNumeric(value.to_string()))?;

    let mut order: Vec<usize> = Vec::new();
    let mut sums: HashMap<String, f64> = HashMap::new();

    for (row, v) in values.iter().enumerate() {
        let label = key_column.display(row);
        let entry = sums.entry(label).or_insert_with(|| {
            order.push(row);
            0.0
        });
        if !v.is_nan() {
            *entry += v;
        }
    }

    // Keys keep their column type so a numeric key still plots on a numeric axis
    let keys = key_column.take(&order);
    let totals: Vec<f64> = order
        .iter()
        .map(|&row| sums[&key_column.display(row)])
        .collect();

    Table::new(vec![keys, Column::numeric(value, totals)])
}
