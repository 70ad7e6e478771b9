#![cfg(not(tarpaulin_include))]

use dashboard::chart::ChartKind;
use dashboard::filter::FilterSelection;
use dashboard::graph::{GraphOptions, Rasterizer};
use dashboard::pipeline::sales_chart;
use dashboard::sample::sales_table;
use std::fs;
use std::path::Path;

/// Writes the three sample sales charts as PNG files
///
/// # Arguments
/// * An optional output directory (default `graph_output`)
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "graph_output".to_string());
    fs::create_dir_all(&out_dir)?;

    let table = sales_table();
    let rasterizer = Rasterizer::new(GraphOptions::default(), None);

    for kind in ChartKind::ALL {
        let chart = sales_chart(&table, &FilterSelection::new(), kind)?;
        let png = rasterizer.rasterize(&chart)?;
        let path = Path::new(&out_dir).join(kind.download_name());
        fs::write(&path, &png)?;
        println!("Created {} chart at {}", kind, path.display());
    }

    Ok(())
}
