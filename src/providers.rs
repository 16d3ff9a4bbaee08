//! # Collaborator contracts
//!
//! The scan engine is deliberately agnostic about where detector data comes
//! from and how backgrounds are fitted: telemetry access, background-rate
//! fitting, occultation-step prediction, and attitude reconstruction are
//! external concerns consumed through the traits in this module. The engine
//! only fixes the *shapes* exchanged at the seam.
//!
//! All collaborator calls are synchronous; the scan is a strictly sequential
//! batch over windows and never overlaps two calls.

use ahash::AHashMap;
use nalgebra::DVector;

use crate::constants::{Met, Seconds, RAW_CHAN_DET};
use crate::injection::InjectedRates;
use crate::ref_frame::FrameTransform;
use crate::scan_errors::ScanError;

/// Handle over the pre-fetched detector data for the whole scan interval.
///
/// The engine itself only consults the covered time range and the good-time
/// intervals; the fit and occultation collaborators interpret the rest of
/// the archive content they fetched.
#[derive(Debug, Clone)]
pub struct DataBundle {
    /// Time range actually covered by the fetched data.
    pub start: Met,
    pub stop: Met,
    /// Good-time intervals, sorted and disjoint.
    pub good_time: Vec<(Met, Met)>,
}

impl DataBundle {
    /// True when `[start, stop]` lies entirely inside one good-time interval.
    pub fn in_good_time(&self, start: Met, stop: Met) -> bool {
        self.good_time
            .iter()
            .any(|&(lo, hi)| lo <= start && stop <= hi)
    }
}

/// Per-window output of the background/foreground fit collaborator, on the
/// flattened **raw** channel×detector axis
/// (length [`RAW_CHAN_DET`](crate::constants::RAW_CHAN_DET)).
///
/// Foreground and background are counts integrated over the window; quality
/// flags are 0/1; variances are counts²; `chi_square` is the per-entry
/// background-fit statistic, already reduced.
#[derive(Debug, Clone)]
pub struct WindowFit {
    pub foreground: DVector<f64>,
    pub background: DVector<f64>,
    pub quality: DVector<f64>,
    pub variance_fit: DVector<f64>,
    pub variance_sys: DVector<f64>,
    pub chi_square: DVector<f64>,
}

impl WindowFit {
    /// Check that every array has the raw-axis length.
    pub fn validate(&self) -> Result<(), ScanError> {
        for v in [
            &self.foreground,
            &self.background,
            &self.quality,
            &self.variance_fit,
            &self.variance_sys,
            &self.chi_square,
        ] {
            if v.len() != RAW_CHAN_DET {
                return Err(ScanError::FitShape {
                    got: v.len(),
                    expected: RAW_CHAN_DET,
                });
            }
        }
        Ok(())
    }
}

/// One-time data pre-fetch from the instrument archive.
pub trait DataProvider {
    /// Fetch everything needed to analyze `[start, end]`.
    ///
    /// `Ok(None)` signals that the archive has no data for the interval; the
    /// scan treats this as fatal before any window is processed.
    fn fetch(&self, start: Met, end: Met) -> Result<Option<DataBundle>, ScanError>;
}

/// Background-rate fit and raw foreground/background counts estimation.
pub trait BackgroundFitter {
    /// Fit the background around one window and integrate counts over it.
    ///
    /// When an injection is supplied, its merged-axis count rates are added
    /// into the foreground for the overlap of the injection interval with
    /// the window; each merged low-energy channel rate is deposited into the
    /// lower of its two raw channels (the statistics only ever see the
    /// merged sum, so the deposit choice is unobservable downstream).
    ///
    /// `Ok(None)` signals an unfittable window (interval too short, no
    /// counts); the scan degrades that window to a zeroed record.
    fn fit(
        &self,
        data: &DataBundle,
        center: Met,
        duration: Seconds,
        injection: Option<&InjectedRates>,
    ) -> Result<Option<WindowFit>, ScanError>;
}

/// Occultation/shadow interval lookup for strong sources and the Sun.
pub trait OccultationProvider {
    /// Sorted occultation-step timestamps per source over the scan interval.
    fn occultation_steps(
        &self,
        start: Met,
        end: Met,
        data: &DataBundle,
    ) -> AHashMap<String, Vec<Met>>;
}

/// Spacecraft attitude reconstruction.
pub trait AttitudeProvider {
    /// Frame transform and reference-body directions at mission time `t`.
    fn transforms(&self, data: &DataBundle, t: Met) -> FrameTransform;
}

#[cfg(test)]
mod providers_test {
    use super::*;

    #[test]
    fn good_time_requires_full_containment() {
        let bundle = DataBundle {
            start: 0.0,
            stop: 100.0,
            good_time: vec![(0.0, 40.0), (60.0, 100.0)],
        };
        assert!(bundle.in_good_time(10.0, 12.0));
        assert!(!bundle.in_good_time(39.0, 41.0));
        assert!(!bundle.in_good_time(45.0, 50.0));
        assert!(bundle.in_good_time(60.0, 100.0));
    }

    #[test]
    fn fit_shape_is_validated() {
        let good = WindowFit {
            foreground: DVector::zeros(RAW_CHAN_DET),
            background: DVector::zeros(RAW_CHAN_DET),
            quality: DVector::zeros(RAW_CHAN_DET),
            variance_fit: DVector::zeros(RAW_CHAN_DET),
            variance_sys: DVector::zeros(RAW_CHAN_DET),
            chi_square: DVector::zeros(RAW_CHAN_DET),
        };
        assert!(good.validate().is_ok());
        let mut bad = good;
        bad.quality = DVector::zeros(3);
        assert!(bad.validate().is_err());
    }
}
