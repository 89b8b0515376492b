//! EPI row-flip correction.
//!
//! EPI alternates the readout gradient polarity from one phase-encode line to the
//! next, so every other row is acquired "backwards". A [`RowFlipTable`] precomputes,
//! for every physical row of a packet (image and reference views alike), whether that
//! row is corrected, and applies the correction channel by channel.
//!
//! # Example Configuration (`.toml`)
//!
//! ```toml
//! [row_flip]
//! mode = "reverse"      # or "negate"
//! flip_odd_rows = true  # false flips rows 0, 2, 4, ...
//! ```

use crate::packet::SampleCube;
use ndarray::{ArrayViewMut2, Axis};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

/// What a flip does to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFlipMode {
    /// Mirror the readout samples of the row.
    #[default]
    Reverse,
    /// Multiply the row by -1.
    Negate,
}

/// Row-flip settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFlipConfig {
    /// What a flip does.
    #[serde(default)]
    pub mode: RowFlipMode,
    /// Flip odd rows (1, 3, 5, ...) when `true`, even rows otherwise.
    #[serde(default = "default_flip_odd_rows")]
    pub flip_odd_rows: bool,
}

fn default_flip_odd_rows() -> bool {
    true
}

impl Default for RowFlipConfig {
    fn default() -> Self {
        Self {
            mode: RowFlipMode::default(),
            flip_odd_rows: default_flip_odd_rows(),
        }
    }
}

/// Correction applied to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOp {
    /// Leave the row untouched.
    Keep,
    /// Apply the configured [`RowFlipMode`].
    Flip,
}

/// Precomputed per-row correction for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFlipTable {
    ops: Vec<RowOp>,
    mode: RowFlipMode,
}

impl RowFlipTable {
    /// Builds the table for `row_count` rows (acquired phase-encode lines plus every
    /// reference view).
    pub fn new(row_count: usize, config: &RowFlipConfig) -> Self {
        let flipped_parity = usize::from(config.flip_odd_rows);
        let ops = (0..row_count)
            .map(|row| {
                if row % 2 == flipped_parity {
                    RowOp::Flip
                } else {
                    RowOp::Keep
                }
            })
            .collect();
        Self {
            ops,
            mode: config.mode,
        }
    }

    /// Per-row operations, indexed by physical view.
    pub fn ops(&self) -> &[RowOp] {
        &self.ops
    }

    /// Flip operation applied to flipped rows.
    pub fn mode(&self) -> RowFlipMode {
        self.mode
    }

    /// Number of rows covered.
    pub fn row_count(&self) -> usize {
        self.ops.len()
    }

    /// The table that undoes this one.
    ///
    /// Both row operations are involutions, so the inverse is the same table.
    pub fn inverse(&self) -> Self {
        self.clone()
    }

    /// Corrects one channel's `(readout, view)` matrix in place.
    ///
    /// The matrix must have exactly [`row_count`](Self::row_count) views.
    pub fn apply(&self, mut matrix: ArrayViewMut2<'_, Complex32>) {
        debug_assert_eq!(
            matrix.ncols(),
            self.ops.len(),
            "row-flip table covers {} rows, matrix has {}",
            self.ops.len(),
            matrix.ncols()
        );

        for (row, op) in self.ops.iter().enumerate().take(matrix.ncols()) {
            if *op == RowOp::Keep {
                continue;
            }
            let mut samples = matrix.column_mut(row);
            match self.mode {
                RowFlipMode::Reverse => {
                    let n = samples.len();
                    for i in 0..n / 2 {
                        samples.swap(i, n - 1 - i);
                    }
                }
                RowFlipMode::Negate => samples.mapv_inplace(|s| -s),
            }
        }
    }

    /// Applies the correction to every channel of a packet cube independently.
    pub fn apply_to_cube(&self, cube: &mut SampleCube) {
        for channel in cube.axis_iter_mut(Axis(2)) {
            self.apply(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn matrix(readout: usize, views: usize) -> Array2<Complex32> {
        Array2::from_shape_fn((readout, views), |(x, v)| {
            Complex32::new(x as f32, v as f32 + 0.5)
        })
    }

    #[test]
    fn default_table_flips_odd_rows() {
        let table = RowFlipTable::new(4, &RowFlipConfig::default());
        assert_eq!(
            table.ops(),
            &[RowOp::Keep, RowOp::Flip, RowOp::Keep, RowOp::Flip]
        );
    }

    #[test]
    fn even_parity_flips_first_row() {
        let config = RowFlipConfig {
            flip_odd_rows: false,
            ..Default::default()
        };
        let table = RowFlipTable::new(3, &config);
        assert_eq!(table.ops(), &[RowOp::Flip, RowOp::Keep, RowOp::Flip]);
    }

    #[test]
    fn reverse_mirrors_readout_of_flipped_rows() {
        let table = RowFlipTable::new(2, &RowFlipConfig::default());
        let original = matrix(3, 2);
        let mut data = original.clone();
        table.apply(data.view_mut());

        assert_eq!(data.column(0), original.column(0));
        for x in 0..3 {
            assert_eq!(data[[x, 1]], original[[2 - x, 1]]);
        }
    }

    #[test]
    fn negate_changes_sign_of_flipped_rows() {
        let config = RowFlipConfig {
            mode: RowFlipMode::Negate,
            ..Default::default()
        };
        let table = RowFlipTable::new(2, &config);
        let original = matrix(4, 2);
        let mut data = original.clone();
        table.apply(data.view_mut());

        assert_eq!(data.column(0), original.column(0));
        for x in 0..4 {
            assert_eq!(data[[x, 1]], -original[[x, 1]]);
        }
    }

    #[test]
    fn inverse_restores_original_matrix() {
        for mode in [RowFlipMode::Reverse, RowFlipMode::Negate] {
            for flip_odd_rows in [true, false] {
                let config = RowFlipConfig { mode, flip_odd_rows };
                let table = RowFlipTable::new(5, &config);
                let original = matrix(7, 5);
                let mut data = original.clone();

                table.apply(data.view_mut());
                assert_ne!(data, original);
                table.inverse().apply(data.view_mut());
                assert_eq!(data, original);
            }
        }
    }

    #[test]
    fn channels_are_corrected_independently() {
        let table = RowFlipTable::new(2, &RowFlipConfig::default());
        let mut cube = Array3::from_shape_fn((2, 2, 2), |(x, v, c)| {
            Complex32::new((x + 10 * v + 100 * c) as f32, 0.0)
        });
        table.apply_to_cube(&mut cube);

        for c in 0..2 {
            let base = (100 * c) as f32;
            assert_eq!(cube[[0, 1, c]], Complex32::new(base + 11.0, 0.0));
            assert_eq!(cube[[1, 1, c]], Complex32::new(base + 10.0, 0.0));
            assert_eq!(cube[[0, 0, c]], Complex32::new(base, 0.0));
        }
    }
}
