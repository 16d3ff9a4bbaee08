//! # Synthetic signal injection
//!
//! To validate detection and localization sensitivity, a synthetic source can
//! be folded into the background/foreground fit of every window. The
//! injection is resolved **once**, before the scan: the celestial direction
//! is rotated into the instrument frame at the injection time, snapped to the
//! nearest sky-grid cell and spectrum template, and turned into a fixed
//! per-entry count-rate vector by reading the corresponding response row.
//! Only window timing varies afterwards; the source is geometrically fixed
//! relative to the grid for injection purposes.
//!
//! An injection whose direction is occulted by the reference body at the
//! injection time is forced to zero amplitude and becomes a deliberate no-op,
//! used to validate non-detections.

use nalgebra::DVector;
use serde::Deserialize;

use crate::constants::{occlusion_cos, Degree, Met, Seconds, RADEG};
use crate::ref_frame::{radec_to_unit, FrameTransform};
use crate::scan_errors::ScanError;
use crate::sky_grid::SkyGrid;
use crate::spectra::SpectrumSet;
use crate::response::ResponseTensor;

/// Configuration-level description of a synthetic source.
#[derive(Debug, Clone, Deserialize)]
pub struct InjectionDescriptor {
    /// Injection center time, mission elapsed seconds.
    pub time: Met,
    /// Injection duration in seconds.
    pub duration: Seconds,
    /// Celestial right ascension, degrees.
    pub ra_deg: Degree,
    /// Celestial declination, degrees.
    pub dec_deg: Degree,
    /// Label of the injected spectrum template.
    pub spectrum: String,
    /// Source amplitude in physical flux units.
    pub amplitude: f64,
}

/// Resolved injection: a fixed merged-axis count-rate vector consumed
/// unchanged by every window's fit.
#[derive(Debug, Clone)]
pub struct InjectedRates {
    /// Expected count rate per entry at the injected amplitude, counts/s.
    pub rates: DVector<f64>,
    pub time: Met,
    pub duration: Seconds,
    /// Sky-grid cell the injection snapped to.
    pub cell: usize,
    /// Spectrum template index the label resolved to.
    pub spectrum: usize,
    /// Effective amplitude: zero when the direction was occulted.
    pub amplitude: f64,
    /// True when the direction was occulted at the injection time.
    pub occulted: bool,
}

/// Resolve an injection descriptor against the grid, spectra, and the
/// response tensor valid at the injection time.
///
/// Arguments
/// ---------
/// * `descriptor`: the configured synthetic source
/// * `grid`, `spectra`: run-wide sky grid and spectrum set
/// * `tensor`: response tensor resolved for the orientation bucket at the
///   injection time
/// * `transform`: frame transform at the injection time
///
/// Return
/// ------
/// * the fixed injected-rate vector, or
///   [`ScanError::UnknownSpectrumLabel`] for an unrecognized template label
pub fn simulate(
    descriptor: &InjectionDescriptor,
    grid: &SkyGrid,
    spectra: &SpectrumSet,
    tensor: &ResponseTensor,
    transform: &FrameTransform,
) -> Result<InjectedRates, ScanError> {
    let spectrum = spectra.index_of(&descriptor.spectrum)?;

    let celestial = radec_to_unit(descriptor.ra_deg * RADEG, descriptor.dec_deg * RADEG);
    let direction = transform.to_instrument * celestial;

    let occulted = direction.dot(&transform.geocenter) > occlusion_cos();
    let amplitude = if occulted { 0.0 } else { descriptor.amplitude };
    if occulted {
        log::info!(
            "injection at ra {} dec {} is occulted at t={}, amplitude forced to zero",
            descriptor.ra_deg,
            descriptor.dec_deg,
            descriptor.time
        );
    }

    let cell = grid.nearest(&direction);
    let rates = tensor.plane(spectrum).row(cell).transpose() * amplitude;

    Ok(InjectedRates {
        rates,
        time: descriptor.time,
        duration: descriptor.duration,
        cell,
        spectrum,
        amplitude,
        occulted,
    })
}
