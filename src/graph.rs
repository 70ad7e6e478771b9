use crate::chart::{Axis, Chart, ChartKind, XValue};
use crate::error::{DashboardError, Result};
use crate::table::format_number;
use image::{ImageFormat, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontStyle;
use std::io::Cursor;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Series colours, cycled in series order
pub const PALETTE: [RGBColor; 10] = [
    RGBColor(52, 152, 219),  // Blue
    RGBColor(231, 76, 60),   // Red
    RGBColor(46, 204, 113),  // Green
    RGBColor(155, 89, 182),  // Purple
    RGBColor(243, 156, 18),  // Orange
    RGBColor(26, 188, 156),  // Teal
    RGBColor(233, 30, 99),   // Pink
    RGBColor(0, 188, 212),   // Cyan
    RGBColor(121, 85, 72),   // Brown
    RGBColor(96, 125, 139),  // Blue Grey
];

/// Places a TrueType font is commonly installed on Linux and macOS
const FONT_CANDIDATES: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Largest accepted image width or height, in pixels
pub const MAX_IMAGE_SIDE: u32 = 8192;

/// Scatter marker radius bounds in pixels
const MIN_RADIUS: f64 = 4.0;
const MAX_RADIUS: f64 = 18.0;

/// Configuration options for rasterizing charts
#[derive(Clone, Debug)]
pub struct GraphOptions {
    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,
}

impl Default for GraphOptions {
    /// 800x600 pixels
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

/// Turns [`Chart`]s into PNG images.
///
/// Every call draws into its own in-memory buffer, so concurrent or
/// back-to-back exports never share state. When no TrueType font could be
/// registered the rasterizer still works but draws marks and bars only,
/// without title, axis labels or legend.
#[derive(Clone, Debug)]
pub struct Rasterizer {
    options: GraphOptions,
    labels: bool,
}

impl Rasterizer {
    /// Creates a rasterizer, registering a font from `font` or from the
    /// usual system locations.
    pub fn new(options: GraphOptions, font: Option<&Path>) -> Self {
        let labels = install_font(font);
        if !labels {
            log::warn!("no TrueType font found; charts will be drawn without text");
        }
        Rasterizer { options, labels }
    }

    /// Rasterizer that never draws text
    pub fn without_labels(options: GraphOptions) -> Self {
        Rasterizer {
            options,
            labels: false,
        }
    }

    /// Render `chart` and encode it as PNG
    ///
    /// # Returns
    /// * The PNG bytes, or `DashboardError::Encoding` when drawing or
    ///   encoding fails
    pub fn rasterize(&self, chart: &Chart) -> Result<Vec<u8>> {
        let (width, height) = (self.options.width, self.options.height);
        if width < 64 || height < 64 || width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
            return Err(DashboardError::Encoding(format!(
                "image size {}x{} is outside 64x64 to {}x{}",
                width, height, MAX_IMAGE_SIDE, MAX_IMAGE_SIDE
            )));
        }

        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(encoding)?;
            self.draw(&root, chart)?;
            root.present().map_err(encoding)?;
        }

        let image = RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| {
                DashboardError::Encoding("pixel buffer has the wrong size".to_string())
            })?;
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        Ok(png.into_inner())
    }

    fn draw(&self, root: &DrawingArea<BitMapBackend<'_>, Shift>, chart: &Chart) -> Result<()> {
        let (x_range, categories) = x_extent(chart)?;
        let y_range = y_extent(chart)?;

        let mut builder = ChartBuilder::on(root);
        builder.margin(15);
        if self.labels {
            builder
                .caption(&chart.spec.title, ("sans-serif", 26).into_font())
                .x_label_area_size(40)
                .y_label_area_size(60);
        }
        let mut ctx = builder
            .build_cartesian_2d(x_range, y_range)
            .map_err(encoding)?;

        if self.labels {
            let format_x = |v: &f64| match &categories {
                Some(labels) => category_label(labels, *v),
                None => format_number(round_tick(*v)),
            };
            let format_y = |v: &f64| format_number(round_tick(*v));
            let mut mesh = ctx.configure_mesh();
            mesh.x_desc(chart.spec.x.as_str())
                .y_desc(chart.spec.y.as_str())
                .x_label_formatter(&format_x)
                .y_label_formatter(&format_y);
            if let Some(labels) = &categories {
                mesh.x_labels(labels.len().max(1)).disable_x_mesh();
            }
            mesh.draw().map_err(encoding)?;
        }

        let position = |x: &XValue| -> Option<f64> {
            match (x, &categories) {
                (XValue::Number(n), _) => Some(*n),
                (XValue::Category(c), Some(labels)) => {
                    labels.iter().position(|l| l == c).map(|i| i as f64)
                }
                (XValue::Category(_), None) => None,
            }
        };

        let size_range = size_extent(chart);
        let group_count = chart.series.len().max(1);
        let bar_width = bar_slot(chart, &categories) / group_count as f64;

        for (index, series) in chart.series.iter().enumerate() {
            let color = PALETTE[index % PALETTE.len()];
            let points: Vec<(f64, f64, Option<f64>)> = series
                .marks
                .iter()
                .filter_map(|m| position(&m.x).map(|x| (x, m.y, m.size)))
                .collect();

            let anno = match chart.spec.kind {
                ChartKind::Line => {
                    ctx.draw_series(LineSeries::new(
                        points.iter().map(|&(x, y, _)| (x, y)),
                        color.stroke_width(2),
                    ))
                    .map_err(encoding)?;
                    ctx.draw_series(
                        points
                            .iter()
                            .map(|&(x, y, _)| Circle::new((x, y), 3, color.filled())),
                    )
                    .map_err(encoding)?
                }
                ChartKind::Bar => {
                    let offset = bar_width * index as f64 - bar_width * group_count as f64 / 2.0;
                    ctx.draw_series(points.iter().map(|&(x, y, _)| {
                        let left = x + offset;
                        Rectangle::new([(left, 0.0), (left + bar_width * 0.9, y)], color.filled())
                    }))
                    .map_err(encoding)?
                }
                ChartKind::Scatter => ctx
                    .draw_series(points.iter().map(|&(x, y, size)| {
                        let radius = marker_radius(size, size_range);
                        Circle::new((x, y), radius, color.mix(0.7).filled())
                    }))
                    .map_err(encoding)?,
            };

            if self.labels {
                if let Some(name) = &series.name {
                    anno.label(name.as_str())
                        .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
                }
            }
        }

        if self.labels && chart.series.iter().any(|s| s.name.is_some()) {
            ctx.configure_series_labels()
                .background_style(WHITE.mix(0.85))
                .border_style(BLACK)
                .draw()
                .map_err(encoding)?;
        }

        Ok(())
    }
}

fn encoding<E: std::fmt::Display>(err: E) -> DashboardError {
    DashboardError::Encoding(err.to_string())
}

// Registers the first readable font under the "sans-serif" family. The
// font registry is process-wide, so this only runs once.
fn install_font(preferred: Option<&Path>) -> bool {
    static INSTALLED: OnceLock<bool> = OnceLock::new();
    *INSTALLED.get_or_init(|| {
        let candidates = preferred
            .map(Path::to_path_buf)
            .into_iter()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if plotters::style::register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                log::info!("registered chart font {}", path.display());
                return true;
            }
        }
        false
    })
}

// Numeric x charts use the data range; categorical ones place category i at x = i.
fn x_extent(chart: &Chart) -> Result<(Range<f64>, Option<Vec<String>>)> {
    match &chart.x_axis {
        Axis::Categorical { categories } => {
            let n = categories.len().max(1) as f64;
            Ok((-0.5..n - 0.5, Some(categories.clone())))
        }
        Axis::Numeric { min, max } => {
            let (lo, hi) = pad(*min, *max);
            let range = if chart.spec.kind == ChartKind::Bar {
                let slot = bar_slot(chart, &None);
                axis_range(lo.min(*min - slot), hi.max(*max + slot))?
            } else {
                axis_range(lo, hi)?
            };
            Ok((range, None))
        }
    }
}

fn y_extent(chart: &Chart) -> Result<Range<f64>> {
    let (min, max) = chart.y_range.unwrap_or((0.0, 1.0));
    let (min, max) = if chart.spec.kind == ChartKind::Bar {
        (min.min(0.0), max.max(0.0))
    } else {
        (min, max)
    };
    let (lo, hi) = pad(min, max);
    if chart.spec.kind == ChartKind::Bar && min >= 0.0 {
        axis_range(0.0, hi)
    } else {
        axis_range(lo, hi)
    }
}

// 5% margin on both sides; the margin is taken from each bound separately
// so values near f64::MAX do not overflow the difference.
fn pad(min: f64, max: f64) -> (f64, f64) {
    let mut margin = max * 0.05 - min * 0.05;
    if margin.abs() < f64::EPSILON {
        margin = (min.abs() * 0.05).max(1.0);
    }
    (min - margin, max + margin)
}

// Plotters cannot lay out ticks over an infinite or empty span
fn axis_range(lo: f64, hi: f64) -> Result<Range<f64>> {
    if lo.is_finite() && hi.is_finite() && (hi - lo).is_finite() && hi > lo {
        Ok(lo..hi)
    } else {
        Err(DashboardError::Encoding(format!(
            "values from {} to {} span too wide a range to plot",
            lo, hi
        )))
    }
}

// Width available to the bars at one x position
fn bar_slot(chart: &Chart, categories: &Option<Vec<String>>) -> f64 {
    if categories.is_some() {
        return 0.8;
    }
    let mut xs: Vec<f64> = chart
        .series
        .iter()
        .flat_map(|s| &s.marks)
        .filter_map(|m| match m.x {
            XValue::Number(n) => Some(n),
            XValue::Category(_) => None,
        })
        .collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    xs.dedup();
    let gap = xs
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if gap.is_finite() { gap * 0.8 } else { 0.8 }
}

fn size_extent(chart: &Chart) -> Option<(f64, f64)> {
    chart
        .series
        .iter()
        .flat_map(|s| &s.marks)
        .filter_map(|m| m.size)
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
        })
}

fn marker_radius(size: Option<f64>, extent: Option<(f64, f64)>) -> u32 {
    match (size, extent) {
        (Some(v), Some((lo, hi))) if hi > lo => {
            let t = (v - lo) / (hi - lo);
            (MIN_RADIUS + t * (MAX_RADIUS - MIN_RADIUS)).round() as u32
        }
        (Some(_), Some(_)) => ((MIN_RADIUS + MAX_RADIUS) / 2.0) as u32,
        _ => 5,
    }
}

fn category_label(labels: &[String], v: f64) -> String {
    let nearest = v.round();
    if (v - nearest).abs() > 0.01 || nearest < 0.0 {
        return String::new();
    }
    labels.get(nearest as usize).cloned().unwrap_or_default()
}

fn round_tick(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartSpec, build_chart};
    use crate::table::{Column, Table};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn table() -> Table {
        Table::new(vec![
            Column::categorical("Category", vec!["Books", "Toys", "Books"]),
            Column::numeric("Customers", vec![350.0, 380.0, 420.0]),
            Column::numeric("Sales", vec![4200.0, 4800.0, 5200.0]),
        ])
        .unwrap()
    }

    fn category_chart(kind: ChartKind) -> Chart {
        build_chart(&table(), &ChartSpec::new(kind, "Category", "Sales")).unwrap()
    }

    fn rasterizer() -> Rasterizer {
        Rasterizer::new(GraphOptions { width: 320, height: 240 }, None)
    }

    #[test]
    fn every_kind_encodes_to_png() {
        let raster = rasterizer();
        for kind in ChartKind::ALL {
            let spec = match kind {
                ChartKind::Scatter => ChartSpec::new(kind, "Customers", "Sales")
                    .with_color("Category")
                    .with_size("Sales"),
                _ => ChartSpec::new(kind, "Category", "Sales"),
            };
            let chart = build_chart(&table(), &spec).unwrap();
            let png = raster.rasterize(&chart).unwrap();
            assert_eq!(png[..8], PNG_SIGNATURE, "{} chart", kind);
        }
    }

    #[test]
    fn empty_chart_still_encodes() {
        let empty = table().take_rows(&[]);
        let spec = ChartSpec::new(ChartKind::Line, "Category", "Sales");
        let chart = build_chart(&empty, &spec).unwrap();
        let png = Rasterizer::without_labels(GraphOptions::default()).rasterize(&chart).unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);
    }

    #[test]
    fn each_chart_gets_its_own_image() {
        let raster = Rasterizer::without_labels(GraphOptions { width: 200, height: 150 });
        let line = category_chart(ChartKind::Line);
        let bar = category_chart(ChartKind::Bar);
        let first = raster.rasterize(&line).unwrap();
        let second = raster.rasterize(&bar).unwrap();
        assert_ne!(first, second);
        assert_eq!(raster.rasterize(&line).unwrap(), first);
    }

    #[test]
    fn tiny_images_are_an_encoding_error() {
        let raster = Rasterizer::without_labels(GraphOptions { width: 10, height: 10 });
        let chart = category_chart(ChartKind::Bar);
        assert!(matches!(raster.rasterize(&chart), Err(DashboardError::Encoding(_))));
    }

    fn extreme_table() -> Table {
        Table::new(vec![
            Column::numeric("Step", vec![1.0, 2.0]),
            Column::numeric("Value", vec![-1e308, 1e308]),
        ])
        .unwrap()
    }

    #[test]
    fn values_near_f64_max_are_an_encoding_error() {
        let line = build_chart(&extreme_table(), &ChartSpec::new(ChartKind::Line, "Step", "Value"))
            .unwrap();
        assert!(matches!(rasterizer().rasterize(&line), Err(DashboardError::Encoding(_))));

        let bar = build_chart(&extreme_table(), &ChartSpec::new(ChartKind::Bar, "Value", "Step"))
            .unwrap();
        assert!(matches!(rasterizer().rasterize(&bar), Err(DashboardError::Encoding(_))));
    }

    #[test]
    fn large_but_plottable_values_still_encode() {
        let table = Table::new(vec![
            Column::numeric("Step", vec![1.0, 2.0]),
            Column::numeric("Value", vec![0.0, 1e20]),
        ])
        .unwrap();
        let chart = build_chart(&table, &ChartSpec::new(ChartKind::Line, "Step", "Value")).unwrap();
        let png = rasterizer().rasterize(&chart).unwrap();
        assert_eq!(png[..8], PNG_SIGNATURE);
    }

    #[test]
    fn padding_stays_finite_near_the_limits() {
        let (lo, hi) = pad(-1e308, 1e308);
        assert!(lo.is_finite() && hi.is_finite());
        assert!(axis_range(lo, hi).is_err());
        assert_eq!(pad(5.0, 5.0), (4.0, 6.0));
        assert_eq!(axis_range(0.0, 1.0).unwrap(), 0.0..1.0);
    }

    #[test]
    fn oversized_images_are_an_encoding_error() {
        let raster = Rasterizer::without_labels(GraphOptions {
            width: MAX_IMAGE_SIDE + 1,
            height: 100,
        });
        let chart = category_chart(ChartKind::Bar);
        assert!(matches!(raster.rasterize(&chart), Err(DashboardError::Encoding(_))));
    }

    #[test]
    fn marker_radius_scales_between_bounds() {
        assert_eq!(marker_radius(Some(0.0), Some((0.0, 10.0))), MIN_RADIUS as u32);
        assert_eq!(marker_radius(Some(10.0), Some((0.0, 10.0))), MAX_RADIUS as u32);
        assert_eq!(marker_radius(None, None), 5);
    }

    #[test]
    fn category_labels_only_on_whole_positions() {
        let labels = vec!["Jan".to_string(), "Feb".to_string()];
        assert_eq!(category_label(&labels, 1.0), "Feb");
        assert_eq!(category_label(&labels, 0.5), "");
        assert_eq!(category_label(&labels, -1.0), "");
    }
}
