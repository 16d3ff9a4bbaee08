//! # Sky prior
//!
//! An optional per-cell weighting of the sky grid, multiplied into the
//! likelihood before the prior-weighted maximization and marginalization.
//! Weights are normalized so that they **sum to the cell count**: the prior
//! is a multiplicative sky-density correction relative to uniform, not an
//! absolute probability. A uniform prior is therefore exactly 1 everywhere
//! and leaves every statistic unchanged.
//!
//! Densities are floored at [`PRIOR_FLOOR`](crate::constants::PRIOR_FLOOR)
//! before any logarithm, so a cell with zero external probability never
//! propagates `-inf` or NaN into the marginalization.

use nalgebra::{DVector, Vector3};
use serde::Deserialize;

use crate::constants::{Degree, PRIOR_FLOOR, RADEG};
use crate::ref_frame::angular_separation;
use crate::scan_errors::ScanError;
use crate::sky_grid::SkyGrid;

/// Configuration-level description of where the sky prior comes from.
///
/// External map files (all-sky localizations, posterior-sample histograms)
/// are resolved to per-cell weights by the caller before the scan; the
/// parametric Gaussian is evaluated on the grid internally.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkyPriorSource {
    /// No external localization: every cell weighted equally.
    #[default]
    Uniform,
    /// Per-cell weights resampled from an external sky map, in cell order.
    Weights(Vec<f64>),
    /// Gaussian localization on the sphere, celestial frame, degrees.
    Gaussian {
        ra_deg: Degree,
        dec_deg: Degree,
        sigma_deg: Degree,
    },
}

/// Normalized per-cell sky weights; invariant: `sum(weights) == nsky`.
#[derive(Debug, Clone)]
pub struct SkyPrior {
    weights: DVector<f64>,
}

impl SkyPrior {
    /// Uniform prior: weight exactly 1 for every cell.
    pub fn uniform(nsky: usize) -> SkyPrior {
        SkyPrior {
            weights: DVector::from_element(nsky, 1.0),
        }
    }

    /// Normalize externally supplied per-cell weights.
    ///
    /// Arguments
    /// ---------
    /// * `weights`: non-negative densities, one per sky cell, in cell order
    ///
    /// Return
    /// ------
    /// * the normalized prior, or [`ScanError::InvalidPriorWeights`] when the
    ///   length does not match the grid, a weight is negative or non-finite,
    ///   or the total density is zero
    pub fn from_weights(grid: &SkyGrid, weights: &[f64]) -> Result<SkyPrior, ScanError> {
        if weights.len() != grid.len() {
            return Err(ScanError::InvalidPriorWeights(format!(
                "{} weights for {} sky cells",
                weights.len(),
                grid.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ScanError::InvalidPriorWeights(
                "weights must be finite and non-negative".into(),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ScanError::InvalidPriorWeights(
                "total sky density is zero".into(),
            ));
        }
        let scale = grid.len() as f64 / total;
        Ok(SkyPrior {
            weights: DVector::from_iterator(weights.len(), weights.iter().map(|w| w * scale)),
        })
    }

    /// Evaluate a Gaussian-on-sphere localization on the grid.
    ///
    /// Arguments
    /// ---------
    /// * `center`: localization center as an instrument-frame unit vector
    ///   (the caller rotates the celestial center into the instrument frame
    ///   at the relevant time)
    /// * `sigma_deg`: 1σ angular radius in degrees
    pub fn gaussian(grid: &SkyGrid, center: &Vector3<f64>, sigma_deg: Degree) -> Result<SkyPrior, ScanError> {
        if !(sigma_deg > 0.0) {
            return Err(ScanError::InvalidPriorWeights(format!(
                "non-positive Gaussian radius: {sigma_deg}"
            )));
        }
        let sigma = sigma_deg * RADEG;
        let weights: Vec<f64> = grid
            .units()
            .iter()
            .map(|u| {
                let sep = angular_separation(u, center);
                (-0.5 * (sep / sigma).powi(2)).exp()
            })
            .collect();
        SkyPrior::from_weights(grid, &weights)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Normalized per-cell weights.
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Per-cell log weights, floored before the logarithm.
    pub fn log_weights(&self) -> DVector<f64> {
        self.weights.map(|w| w.max(PRIOR_FLOOR).ln())
    }
}
