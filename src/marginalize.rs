//! # Marginalization over sky and spectrum
//!
//! Point estimates and marginal significances derived from a window's
//! (spectrum × visible-cell) log-likelihood grid:
//!
//! - the **absolute best fit**: argmax over the raw grid;
//! - the **coincidence best fit**: argmax after adding the per-cell log sky
//!   prior;
//! - the **marginal log-likelihood**: log-sum-exp over the whole grid minus
//!   `ln(nspec·nsky)`, i.e. a flat prior over spectra and the
//!   uniform-equivalent sky normalization (cells occulted for the window
//!   contribute zero likelihood, not unity, so the sum runs over the visible
//!   columns only);
//! - the **prior-weighted marginal**: log-sum-exp of the prior-added grid
//!   minus `ln(nspec)` (the prior already carries the sky normalization);
//! - **per-cell** and **per-spectrum marginals**, whose argmaxes give a
//!   spectrum-marginalized best direction and a sky-marginalized best
//!   spectrum. Both may legitimately disagree with the joint maximum and all
//!   are reported.
//!
//! Every log-sum-exp is anchored at its own grid maximum, so no exponential
//! can overflow regardless of the absolute likelihood magnitude; underflowed
//! near-zero terms contribute negligibly, which is acceptable.

use ordered_float::OrderedFloat;

use crate::likelihood::LikelihoodGrid;
use crate::sky_prior::SkyPrior;

/// Point estimates and marginal significances for one window.
#[derive(Debug, Clone)]
pub struct Marginal {
    /// Absolute best fit: (spectrum, sky cell).
    pub best_spectrum: usize,
    pub best_cell: usize,
    /// Grid column of the absolute best fit (for surface lookups).
    pub best_column: usize,
    /// Coincidence (prior-weighted) best fit.
    pub coincident_spectrum: usize,
    pub coincident_cell: usize,
    pub coincident_column: usize,
    /// Log-likelihood ratio at the absolute best fit.
    pub joint_max: f64,
    /// Marginal log-likelihood over the whole grid, flat priors.
    pub marginal_log_like: f64,
    /// Marginal log-likelihood with the sky prior folded in.
    pub weighted_log_like: f64,
    /// Argmax of the per-cell (spectrum-marginalized) likelihood.
    pub marginal_best_cell: usize,
    /// Argmax of the per-spectrum (sky-marginalized) likelihood.
    pub marginal_best_spectrum: usize,
}

/// Numerically stable log-sum-exp, anchored at the maximum of the terms.
///
/// Returns `-inf` for an empty input.
pub fn log_sum_exp<I>(terms: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = terms.into_iter().collect();
    let anchor = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !anchor.is_finite() {
        return anchor;
    }
    anchor + values.iter().map(|v| (v - anchor).exp()).sum::<f64>().ln()
}

/// Derive point estimates and marginals from a window's likelihood grid.
///
/// Returns `None` when the grid has no visible cell or no spectrum, in which
/// case the caller degrades the window record.
pub fn marginalize(grid: &LikelihoodGrid, prior: &SkyPrior) -> Option<Marginal> {
    let nspec = grid.spectrum_count();
    let nvis = grid.visible_count();
    if nspec == 0 || nvis == 0 {
        return None;
    }

    let log_prior = prior.log_weights();
    let column_prior: Vec<f64> = grid.cells().iter().map(|&cell| log_prior[cell]).collect();

    let entries = || (0..nspec).flat_map(|s| (0..nvis).map(move |j| (s, j)));

    let (best_spectrum, best_column) = entries()
        .max_by_key(|&(s, j)| OrderedFloat(grid.log_ratio[(s, j)]))?;
    let (coincident_spectrum, coincident_column) = entries()
        .max_by_key(|&(s, j)| OrderedFloat(grid.log_ratio[(s, j)] + column_prior[j]))?;

    let norm = ((nspec * grid.sky_cells()) as f64).ln();
    let marginal_log_like = log_sum_exp(entries().map(|(s, j)| grid.log_ratio[(s, j)])) - norm;
    let weighted_log_like =
        log_sum_exp(entries().map(|(s, j)| grid.log_ratio[(s, j)] + column_prior[j]))
            - (nspec as f64).ln();

    let marginal_best_column = (0..nvis)
        .max_by_key(|&j| OrderedFloat(log_sum_exp((0..nspec).map(|s| grid.log_ratio[(s, j)]))))?;
    let marginal_best_spectrum = (0..nspec)
        .max_by_key(|&s| OrderedFloat(log_sum_exp((0..nvis).map(|j| grid.log_ratio[(s, j)]))))?;

    Some(Marginal {
        best_spectrum,
        best_cell: grid.cell_of(best_column),
        best_column,
        coincident_spectrum,
        coincident_cell: grid.cell_of(coincident_column),
        coincident_column,
        joint_max: grid.log_ratio[(best_spectrum, best_column)],
        marginal_log_like,
        weighted_log_like,
        marginal_best_cell: grid.cell_of(marginal_best_column),
        marginal_best_spectrum,
    })
}
