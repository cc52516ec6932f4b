//! The 3×3 stencil kernel (spec §4.3).
//!
//! This crate owns exactly one piece of domain logic: given three input
//! rows (`prev`, `curr`, `next`) and a flattened kernel, produce one output
//! row. Everything about *how* those three rows became available — strip
//! buffers, producer/consumer ordering, I/O — lives in `core-strip` and
//! `core-pipeline`; this crate has no notion of concurrency beyond the
//! column loop itself being safe to run in parallel.

use core_raster::Row;

/// Threshold below which the sequential loop outruns rayon's dispatch
/// overhead. Chosen generously; raster rows narrower than this are common
/// for test fixtures and small imagery, where spinning up the thread pool
/// would cost more than the convolution itself.
const PARALLEL_WIDTH_THRESHOLD: usize = 256;

/// A 3×3 convolution kernel, stored flattened column-major as the spec
/// requires: `kern[col * 3 + row_offset]`, `row_offset ∈ {0,1,2}` mapping to
/// prev/curr/next.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kernel([f32; 9]);

impl Kernel {
    /// Builds a kernel from the column-major layout directly.
    pub const fn from_column_major(weights: [f32; 9]) -> Self {
        Self(weights)
    }

    /// Builds a kernel from the more readable row-major `[[r0c0, r0c1, r0c2], [r1c0, ...], ...]`
    /// form (outer index is the row offset 0/1/2 mapping prev/curr/next,
    /// inner index is column), which is how configuration files and most
    /// people naturally write a 3×3 matrix. Internally it is transposed to
    /// the column-major layout `apply_row` expects.
    pub fn from_row_major(rows: [[f32; 3]; 3]) -> Self {
        let mut weights = [0.0f32; 9];
        for (row_offset, row) in rows.iter().enumerate() {
            for (col, &w) in row.iter().enumerate() {
                weights[col * 3 + row_offset] = w;
            }
        }
        Self(weights)
    }

    pub fn weights(&self) -> [f32; 9] {
        self.0
    }

    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }
}

impl Default for Kernel {
    /// The default edge-detection Laplacian from spec §6:
    /// ```text
    /// -1 -1 -1
    /// -1  8 -1
    /// -1 -1 -1
    /// ```
    fn default() -> Self {
        Kernel::from_row_major([[-1.0, -1.0, -1.0], [-1.0, 8.0, -1.0], [-1.0, -1.0, -1.0]])
    }
}

/// Applies `kernel` to `(prev, curr, next)`, writing the result into `out`.
/// All four rows must share the same width; boundary columns clamp to the
/// nearest valid index (spec §4.3's "clamp-to-edge" policy), matching the
/// row-level clamping the filter already performs at `y = 0` and
/// `y = H - 1`.
pub fn apply_row(prev: &Row, curr: &Row, next: &Row, kernel: &Kernel, out: &mut Row) {
    let width = curr.len();
    debug_assert_eq!(prev.len(), width);
    debug_assert_eq!(next.len(), width);
    debug_assert_eq!(out.len(), width);

    if width >= PARALLEL_WIDTH_THRESHOLD {
        apply_row_parallel(prev, curr, next, kernel, out);
    } else {
        apply_row_sequential(prev, curr, next, kernel, out);
    }
}

fn apply_row_sequential(prev: &Row, curr: &Row, next: &Row, kernel: &Kernel, out: &mut Row) {
    let width = curr.len();
    for x in 0..width {
        out[x] = column_value(prev, curr, next, kernel, width, x);
    }
}

fn apply_row_parallel(prev: &Row, curr: &Row, next: &Row, kernel: &Kernel, out: &mut Row) {
    use rayon::prelude::*;

    let width = curr.len();
    out.as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .for_each(|(x, slot)| {
            *slot = column_value(prev, curr, next, kernel, width, x);
        });
}

#[inline]
fn column_value(prev: &Row, curr: &Row, next: &Row, kernel: &Kernel, width: usize, x: usize) -> f32 {
    let cl = x.saturating_sub(1);
    let cc = x;
    let cr = (x + 1).min(width - 1);
    let k = kernel.0;

    k[0] * prev[cl] + k[1] * curr[cl] + k[2] * next[cl]
        + k[3] * prev[cc] + k[4] * curr[cc] + k[5] * next[cc]
        + k[6] * prev[cr] + k[7] * curr[cr] + k[8] * next[cr]
}
