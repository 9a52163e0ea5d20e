//! # Disparity statistics
//!
//! Plots used to inspect the output of the matcher, enabled by the `statistics` feature.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use plotters::prelude::*;
use std::path::Path;

use crate::disparity::DisparityMap;
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

/// Number of valid pixels of each disparity value.
pub fn disparity_histogram(map: &DisparityMap) -> Vec<usize> {
    let mut hist = vec![0usize; 256];
    for y in 0..map.height() {
        for x in 0..map.width() {
            if let Some(d) = map.get(x, y) {
                hist[d as usize] += 1;
            }
        }
    }
    hist
}

/// Draw the disparity histogram of `map` into a PNG at `path`.
pub fn plot_disparity_histogram(map: &DisparityMap, path: &Path) -> Result<()> {
    let hist = disparity_histogram(map);
    let max_disp = map.max_disp.unwrap_or(0) as usize + 1;
    let max_count = hist.iter().copied().max().unwrap_or(0) + 1;

    let area = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    area.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&area)
        .caption("Disparity histogram", ("sans-serif", 20).into_font())
        .margin(5)
        .x_label_area_size(30)
        .y_label_area_size(30)
        .build_ranged(0..max_disp, 0..max_count)
        .map_err(plot_err)?;

    chart.configure_mesh().draw().map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            hist.iter().copied().enumerate().take(max_disp),
            &BLUE
        ))
        .map_err(plot_err)?;

    Ok(())
}

fn plot_err<E: std::fmt::Debug>(e: E) -> Error {
    Error::Plot(format!("{:?}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts_valid_pixels() {
        let mut map = DisparityMap::new(3, 2);
        map.put(0, 0, 4);
        map.put(1, 0, 4);
        map.put(2, 1, 7);

        let hist = disparity_histogram(&map);
        assert_eq!(hist[4], 2);
        assert_eq!(hist[7], 1);
        assert_eq!(hist.iter().sum::<usize>(), 3);
    }
}
