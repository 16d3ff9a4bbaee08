//! # Per-window likelihood statistic
//!
//! For one window, the engine evaluates a scale-free-amplitude likelihood
//! ratio on every (spectrum, visible sky cell) pair. Spectra are processed
//! one at a time so only a single response plane is traversed at once.
//!
//! With the fit mask `m`, response row `r`, residual counts `d = f − b`, and
//! per-entry variance `σ²`, the two masked inner products
//!
//! ```text
//! B = Σ m·r·d / σ²        C = Σ m·r² / σ²
//! ```
//!
//! give the amplitude estimate and the amplitude-marginalized log-likelihood
//! ratio for the plateau amplitude prior of width κ·A (coupling κ, spectrum
//! reference sensitivity A, plateau exponent γ):
//!
//! ```text
//! ŝ   = max(B, 0) / (C + 1/(κA)²)
//! llr = ½·max(B, 0)² / (C + 1/(κA)²) − (γ/2)·ln(1 + C·(κA)²)
//! ```
//!
//! Masked entries contribute exactly zero to both sums. Entries whose fitted
//! variance is non-positive are treated as untrusted and contribute zero as
//! well, so a degenerate detector cannot poison the cells and spectra it is
//! masked out of; positive variances are floored at
//! [`VARIANCE_FLOOR`](crate::constants::VARIANCE_FLOOR) before division.

use itertools::izip;
use nalgebra::{DMatrix, DVector};

use crate::constants::{AMPLITUDE_COUPLING, PLATEAU_EXPONENT, VARIANCE_FLOOR};
use crate::quality::{FitMask, MergedWindow};
use crate::response::ResponseTensor;
use crate::spectra::SpectrumSet;
use crate::visibility::VisibilityMask;

/// Per-window likelihood surfaces over (spectrum × visible sky cell).
///
/// Columns follow [`cells`](LikelihoodGrid::cells): column `j` belongs to sky
/// cell `cells[j]`.
#[derive(Debug, Clone)]
pub struct LikelihoodGrid {
    cells: Vec<usize>,
    nsky: usize,
    /// Log-likelihood ratio, `nspec × nvis`.
    pub log_ratio: DMatrix<f64>,
    /// Amplitude estimate (counts-normalized), `nspec × nvis`.
    pub amplitude: DMatrix<f64>,
    /// Matched-filter signal-to-noise `max(B,0)/√C`, `nspec × nvis`.
    pub snr: DMatrix<f64>,
}

impl LikelihoodGrid {
    /// Assemble a grid from precomputed surfaces.
    ///
    /// `cells` maps grid columns to sky-cell indices; all three matrices must
    /// be `nspec × cells.len()`.
    pub fn from_parts(
        cells: Vec<usize>,
        nsky: usize,
        log_ratio: DMatrix<f64>,
        amplitude: DMatrix<f64>,
        snr: DMatrix<f64>,
    ) -> LikelihoodGrid {
        debug_assert_eq!(log_ratio.ncols(), cells.len());
        debug_assert_eq!(amplitude.shape(), log_ratio.shape());
        debug_assert_eq!(snr.shape(), log_ratio.shape());
        LikelihoodGrid {
            cells,
            nsky,
            log_ratio,
            amplitude,
            snr,
        }
    }

    /// Visible sky-cell index of grid column `column`.
    pub fn cell_of(&self, column: usize) -> usize {
        self.cells[column]
    }

    /// Visible cells, ascending, one per grid column.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Total sky-cell count of the underlying grid (visible or not).
    pub fn sky_cells(&self) -> usize {
        self.nsky
    }

    pub fn spectrum_count(&self) -> usize {
        self.log_ratio.nrows()
    }

    pub fn visible_count(&self) -> usize {
        self.cells.len()
    }
}

/// Per-entry statistical weight: mask over floored variance, zero for
/// non-positive variances.
fn weights(merged: &MergedWindow, mask: &FitMask) -> DVector<f64> {
    DVector::from_iterator(
        merged.variance.len(),
        merged
            .variance
            .iter()
            .zip(mask.values().iter())
            .map(|(&var, &m)| {
                if var > 0.0 {
                    m / var.max(VARIANCE_FLOOR)
                } else {
                    0.0
                }
            }),
    )
}

/// Evaluate the likelihood surfaces for one window.
///
/// Arguments
/// ---------
/// * `tensor`: response tensor for the window's orientation bucket
/// * `merged`: merged fit outputs for the window
/// * `mask`: combined quality/occultation gate
/// * `visibility`: geometric sky mask for the window
/// * `spectra`: candidate emission models
pub fn evaluate(
    tensor: &ResponseTensor,
    merged: &MergedWindow,
    mask: &FitMask,
    visibility: &VisibilityMask,
    spectra: &SpectrumSet,
) -> LikelihoodGrid {
    let cells = visibility.cells().to_vec();
    let nvis = cells.len();
    let nspec = spectra.len();

    let residual = &merged.foreground - &merged.background;
    let weight = weights(merged, mask);

    let mut log_ratio = DMatrix::zeros(nspec, nvis);
    let mut amplitude = DMatrix::zeros(nspec, nvis);
    let mut snr = DMatrix::zeros(nspec, nvis);

    for spectrum in 0..nspec {
        let plane = tensor.plane(spectrum);
        let prior_width = AMPLITUDE_COUPLING * spectra.get(spectrum).reference_sensitivity;
        let regularizer = 1.0 / (prior_width * prior_width);

        for (column, &cell) in cells.iter().enumerate() {
            let row = plane.row(cell);
            let mut b = 0.0;
            let mut c = 0.0;
            for (&r, &d, &w) in izip!(row.iter(), residual.iter(), weight.iter()) {
                b += r * d * w;
                c += r * r * w;
            }

            let excess = b.max(0.0);
            let denominator = c + regularizer;
            amplitude[(spectrum, column)] = excess / denominator;
            log_ratio[(spectrum, column)] = 0.5 * excess * excess / denominator
                - 0.5 * PLATEAU_EXPONENT * (1.0 + c / regularizer).ln();
            snr[(spectrum, column)] = if c > 0.0 { excess / c.sqrt() } else { 0.0 };
        }
    }

    LikelihoodGrid {
        cells,
        nsky: tensor.sky_cells(),
        log_ratio,
        amplitude,
        snr,
    }
}
