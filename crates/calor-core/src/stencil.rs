//! Jacobi five-point stencil for the 2-D heat equation.
//!
//! $$u'_{i,j} = u_{i,j} + \alpha \left(u_{i,j+1} + u_{i,j-1} - 4u_{i,j} + u_{i+1,j} + u_{i-1,j}\right)$$
//!
//! Every solver in the workspace goes through [`update_row`]: the reference
//! solver, the rayon rows, and each distributed block. The first and last
//! columns are never written, so they keep whatever boundary value the
//! caller put there.

use std::ops::Range;

use ndarray::{Array2, ArrayView2, ArrayViewMut1};

/// Compute row `i` of the next state from `prev` into `out`.
///
/// `prev` must hold rows `i - 1`, `i` and `i + 1`; columns `1..width-1` of
/// `out` are overwritten.
pub fn update_row(prev: ArrayView2<'_, f64>, i: usize, mut out: ArrayViewMut1<'_, f64>, alpha: f64) {
    let width = prev.ncols();
    debug_assert!(i >= 1 && i + 1 < prev.nrows(), "row {} has no north/south neighbour", i);
    debug_assert_eq!(out.len(), width);

    let north = prev.row(i - 1);
    let centre = prev.row(i);
    let south = prev.row(i + 1);
    for j in 1..width.saturating_sub(1) {
        let c = centre[j];
        out[j] = c + alpha * (centre[j + 1] + centre[j - 1] - 4.0 * c + south[j] + north[j]);
    }
}

/// Apply [`update_row`] to every row in `rows`, reading `prev` and writing `next`.
pub fn update_rows(prev: &Array2<f64>, next: &mut Array2<f64>, rows: Range<usize>, alpha: f64) {
    debug_assert_eq!(prev.dim(), next.dim());
    for i in rows {
        update_row(prev.view(), i, next.row_mut(i), alpha);
    }
}
