//! The built-in sales dataset shown before anything is uploaded.

use crate::table::{Column, Table};

pub const MONTH: &str = "Month";
pub const YEAR: &str = "Year";
pub const SALES: &str = "Sales";
pub const CUSTOMERS: &str = "Customers";
pub const CATEGORY: &str = "Category";

/// Columns the sales dashboard offers multi-select filters for
pub const FILTER_COLUMNS: [&str; 2] = [YEAR, CATEGORY];

const MONTHS: [&str; 6] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun"];

/// Twelve months of sales across two years and four categories
pub fn sales_table() -> Table {
    let months: Vec<&str> = MONTHS.iter().chain(MONTHS.iter()).copied().collect();
    let years: Vec<&str> = std::iter::repeat_n("2023", 6)
        .chain(std::iter::repeat_n("2024", 6))
        .collect();
    let categories: Vec<&str> = ["Electronics", "Clothing", "Home Goods", "Books"]
        .iter()
        .flat_map(|c| std::iter::repeat_n(*c, 3))
        .collect();

    let sales = vec![
        4200.0, 4800.0, 5200.0, 4900.0, 5700.0, 6000.0, 4500.0, 5100.0, 5800.0, 5200.0, 6100.0,
        6400.0,
    ];
    let customers = vec![
        350.0, 380.0, 420.0, 390.0, 450.0, 470.0, 380.0, 410.0, 440.0, 420.0, 480.0, 510.0,
    ];

    Table::new(vec![
        Column::categorical(MONTH, months),
        Column::categorical(YEAR, years),
        Column::numeric(SALES, sales),
        Column::numeric(CUSTOMERS, customers),
        Column::categorical(CATEGORY, categories),
    ])
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sales_table_shape() {
        let table = sales_table();
        assert_eq!(table.height(), 12);
        assert_eq!(table.width(), 5);
        assert_eq!(table.column(YEAR).unwrap().distinct_values(), vec!["2023", "2024"]);
        assert_eq!(
            table.column(CATEGORY).unwrap().distinct_values(),
            vec!["Electronics", "Clothing", "Home Goods", "Books"]
        );
        assert_eq!(table.column(MONTH).unwrap().display(6), "Jan");
    }
}
