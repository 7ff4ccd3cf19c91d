//! Per-channel line charts of merged tables.
//!
//! Every value column of a merged table is drawn against the time column
//! and saved as `<channel>_graph.png`. Charts are rendered in parallel.

use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use rayon::prelude::*;
use thiserror::Error;

use crate::core::table::Table;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("channel '{0}' has no numeric samples")]
    EmptyChannel(String),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1000;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 500;

const LINE_COLOR: RGBColor = RGBColor(55, 126, 184);

/// `(time, value)` pairs of one column; rows where either cell is not a number are skipped.
pub fn channel_points(table: &Table, time_col: usize, col: usize) -> Vec<(f64, f64)> {
    table
        .rows
        .iter()
        .skip(1)
        .filter_map(|row| {
            let x = row.get(time_col)?.trim().parse::<f64>().ok()?;
            let y = row.get(col)?.trim().parse::<f64>().ok()?;
            (x.is_finite() && y.is_finite()).then_some((x, y))
        })
        .collect()
}

/// Draw one line chart and save it as PNG.
pub fn plot_channel(output_path: &Path, points: &[(f64, f64)]) -> Result<()> {
    let (x_min, x_max, y_min, y_max) = compute_bounds(points);
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(x_min..x_max, (y_min - y_padding)..(y_max + y_padding))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), &LINE_COLOR))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Render every channel of a merged table into `output_dir`.
///
/// Row 0 holds the column names and column 0 the time axis. Each channel's
/// result is reported separately so one empty channel does not stop the rest.
pub fn plot_channels(table: &Table, output_dir: &Path) -> Result<Vec<(String, Result<PathBuf>)>> {
    fs::create_dir_all(output_dir)?;

    let header = table.header();
    let results = (1..table.width())
        .into_par_iter()
        .map(|col| {
            let name = header
                .get(col)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("column{}", col));

            let points = channel_points(table, 0, col);
            if points.is_empty() {
                log::warn!("channel '{}' has no numeric samples, no chart", name);
                return (name.clone(), Err(VisualizationError::EmptyChannel(name)));
            }

            let path = output_dir.join(format!("{}_graph.png", name));
            let result = plot_channel(&path, &points).map(|_| path);
            (name, result)
        })
        .collect();

    Ok(results)
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn merged() -> Table {
        Table::from(vec![
            vec!["Time", "0001HEL_TOP", "0002BICYCLE"],
            vec!["0.0", "1.0", ""],
            vec!["0.1", "2.5", "n/a"],
            vec!["0.2", "1.5", ""],
        ])
    }

    #[test]
    fn test_channel_points_skip_non_numeric() {
        let table = merged();
        assert_eq!(
            channel_points(&table, 0, 1),
            vec![(0.0, 1.0), (0.1, 2.5), (0.2, 1.5)]
        );
        assert!(channel_points(&table, 0, 2).is_empty());
    }

    #[test]
    fn test_compute_bounds_flat_series() {
        let (x_min, x_max, y_min, y_max) = compute_bounds(&[(1.0, 3.0), (2.0, 3.0)]);
        assert_eq!((x_min, x_max), (1.0, 2.0));
        assert_eq!((y_min, y_max), (2.0, 4.0));
    }

    #[test]
    fn test_plot_channels_reports_each_channel() {
        let temp_dir = TempDir::new().unwrap();
        let results = plot_channels(&merged(), temp_dir.path()).unwrap();

        assert_eq!(results.len(), 2);
        let (name, first) = &results[0];
        assert_eq!(name, "0001HEL_TOP");
        assert!(first.as_ref().unwrap().is_file());
        assert!(matches!(results[1].1, Err(VisualizationError::EmptyChannel(_))));
    }
}
