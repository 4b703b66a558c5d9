//! Connected high-risk regions
//!
//! Cells with `risk >= threshold` are grouped into 4-connected components by
//! an iterative flood fill over the flat row-major buffer. Labels start at 1
//! and follow raster order of each component's first cell; components below
//! the minimum size are dropped after labelling, so surviving labels may
//! have gaps.

use crate::error::{Error, Result};
use crate::grid::FieldData;
use serde::{Deserialize, Serialize};

/// A connected component of high-risk cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertCluster {
    pub label: usize,
    /// Flat indices of member cells, ascending
    pub cells: Vec<usize>,
    /// Centroid cell `(row, col)`, truncated means of member rows/cols
    pub centroid: (usize, usize),
    pub mean_risk: f32,
    pub max_risk: f32,
}

impl AlertCluster {
    #[must_use]
    pub fn size(&self) -> usize {
        self.cells.len()
    }
}

/// Label 4-connected components of `risk >= threshold` and keep those with
/// at least `min_size` cells.
pub fn find_alert_clusters(
    risk: &FieldData,
    threshold: f32,
    min_size: usize,
) -> Result<Vec<AlertCluster>> {
    if !threshold.is_finite() {
        return Err(Error::invalid_parameter(
            "threshold",
            threshold,
            "must be finite",
        ));
    }
    let (width, height) = risk.dimensions();
    let values = risk.as_slice();
    let mut labels = vec![0usize; values.len()];
    let mut next_label = 1;
    let mut stack = Vec::new();
    let mut clusters = Vec::new();

    for seed in 0..values.len() {
        if labels[seed] != 0 || values[seed].is_nan() || values[seed] < threshold {
            continue;
        }

        let label = next_label;
        next_label += 1;
        labels[seed] = label;
        stack.push(seed);
        let mut cells = Vec::new();

        while let Some(idx) = stack.pop() {
            cells.push(idx);
            let (row, col) = (idx / width, idx % width);
            let neighbours = [
                (row > 0).then(|| idx - width),
                (row + 1 < height).then(|| idx + width),
                (col > 0).then(|| idx - 1),
                (col + 1 < width).then(|| idx + 1),
            ];
            for n in neighbours.into_iter().flatten() {
                if labels[n] == 0 && values[n] >= threshold {
                    labels[n] = label;
                    stack.push(n);
                }
            }
        }

        if cells.len() >= min_size.max(1) {
            cells.sort_unstable();
            clusters.push(summarize(label, cells, values, width));
        }
    }

    Ok(clusters)
}

fn summarize(label: usize, cells: Vec<usize>, values: &[f32], width: usize) -> AlertCluster {
    let n = cells.len();
    let (mut row_sum, mut col_sum, mut risk_sum) = (0usize, 0usize, 0.0f64);
    let mut max_risk = f32::MIN;
    for &idx in &cells {
        row_sum += idx / width;
        col_sum += idx % width;
        risk_sum += f64::from(values[idx]);
        max_risk = max_risk.max(values[idx]);
    }
    AlertCluster {
        label,
        centroid: (row_sum / n, col_sum / n),
        mean_risk: (risk_sum / n as f64) as f32,
        max_risk,
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(rows: &[&str]) -> FieldData {
        let height = rows.len();
        let width = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| if c == '#' { 0.9 } else { 0.1 }))
            .collect();
        FieldData::from_vec(width, height, data).unwrap()
    }

    #[test]
    fn test_diagonal_cells_not_connected() {
        let risk = grid(&["#..", ".#.", "..#"]);
        let clusters = find_alert_clusters(&risk, 0.6, 1).unwrap();
        assert_eq!(clusters.len(), 3);
        let labels: Vec<usize> = clusters.iter().map(|c| c.label).collect();
        assert_eq!(labels, [1, 2, 3]);
    }

    #[test]
    fn test_l_shape_single_cluster() {
        let risk = grid(&["#...", "#...", "###."]);
        let clusters = find_alert_clusters(&risk, 0.6, 1).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 5);
        // rows 0,1,2,2,2 -> 7/5 = 1; cols 0,0,0,1,2 -> 3/5 = 0
        assert_eq!(clusters[0].centroid, (1, 0));
        assert_relative_eq!(clusters[0].mean_risk, 0.9);
    }

    #[test]
    fn test_small_clusters_dropped_labels_kept() {
        let risk = grid(&["#.##", "..##"]);
        let clusters = find_alert_clusters(&risk, 0.6, 2).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].label, 2);
        assert_eq!(clusters[0].cells, vec![2, 3, 6, 7]);
    }

    #[test]
    fn test_large_grid_no_recursion_limit() {
        let risk = FieldData::with_value(1000, 1000, 0.95);
        let clusters = find_alert_clusters(&risk, 0.6, 10).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].size(), 1_000_000);
    }

    #[test]
    fn test_nan_threshold_rejected() {
        assert!(find_alert_clusters(&FieldData::new(2, 2), f32::NAN, 1).is_err());
    }
}
