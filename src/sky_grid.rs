//! # Instrument-frame sky grid
//!
//! The scan evaluates every statistic on a fixed, ordered set of sky
//! directions in the instrument frame, built once per run. A cell's position
//! in the grid is its identity everywhere in the pipeline: response planes,
//! visibility masks, likelihood grids, and sky priors are all indexed by it.
//!
//! The grid is a set of constant-zenith rings. The zenith angles step by the
//! requested angular step from 0 to 180 degrees; each ring carries a number
//! of azimuth points proportional to `sin(zenith)`, so cells stay roughly
//! equal-area instead of crowding near the poles.

use nalgebra::Vector3;
use ordered_float::OrderedFloat;

use crate::constants::{Degree, Radian, DPI, RADEG};
use crate::ref_frame::azzen_to_unit;
use crate::scan_errors::ScanError;

/// Fixed ordered set of instrument-frame sky directions.
///
/// Immutable after construction; the cell index is the sky-cell identity used
/// throughout the crate.
#[derive(Debug, Clone)]
pub struct SkyGrid {
    directions: Vec<(Radian, Radian)>,
    units: Vec<Vector3<f64>>,
}

impl SkyGrid {
    /// Build a grid with the given angular step in degrees.
    ///
    /// Arguments
    /// ---------
    /// * `step_deg`: angular step between zenith rings and (at the equator)
    ///   between azimuth points
    ///
    /// Return
    /// ------
    /// * the grid, or [`ScanError::EmptySkyGrid`] for a non-positive or
    ///   over-wide step
    pub fn with_step(step_deg: Degree) -> Result<SkyGrid, ScanError> {
        if !(step_deg > 0.0 && step_deg <= 90.0) {
            return Err(ScanError::EmptySkyGrid(step_deg));
        }
        let step = step_deg * RADEG;
        let rings = (std::f64::consts::PI / step).round() as usize;

        let mut directions = Vec::new();
        for ring in 0..=rings {
            let zenith = (ring as f64) * std::f64::consts::PI / (rings as f64);
            let count = ((DPI * zenith.sin() / step).round() as usize).max(1);
            for k in 0..count {
                directions.push((DPI * (k as f64) / (count as f64), zenith));
            }
        }

        let units = directions
            .iter()
            .map(|&(az, zen)| azzen_to_unit(az, zen))
            .collect();
        Ok(SkyGrid { directions, units })
    }

    /// Number of sky cells.
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// (azimuth, zenith) of cell `cell`.
    pub fn direction(&self, cell: usize) -> (Radian, Radian) {
        self.directions[cell]
    }

    /// Unit vector of cell `cell`.
    pub fn unit(&self, cell: usize) -> &Vector3<f64> {
        &self.units[cell]
    }

    /// All cell unit vectors, in cell order.
    pub fn units(&self) -> &[Vector3<f64>] {
        &self.units
    }

    /// Cell closest to the given direction (maximum dot product).
    pub fn nearest(&self, direction: &Vector3<f64>) -> usize {
        self.units
            .iter()
            .enumerate()
            .max_by_key(|(_, u)| OrderedFloat(u.dot(direction)))
            .map(|(cell, _)| cell)
            .unwrap_or(0)
    }
}
