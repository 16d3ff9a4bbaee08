#![allow(dead_code)]
//! Shared mock collaborators for the integration suites.
//!
//! The mocks are deterministic: backgrounds are exact (the fitted foreground
//! equals the background plus any injected contribution, with no noise), so
//! recovery tests can assert tight tolerances and determinism tests can
//! assert byte equality.

use ahash::AHashMap;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use burstscan::constants::{
    Met, Seconds, BGO_BLOCK, BGO_CHANNELS, BGO_COUNT, DETECTOR_COUNT, NAI_BLOCK, NAI_CHANNELS,
    NAI_COUNT, NAI_MERGE_LO, RAW_CHANNELS, RAW_CHAN_DET,
};
use burstscan::injection::InjectedRates;
use burstscan::providers::{
    AttitudeProvider, BackgroundFitter, DataBundle, DataProvider, OccultationProvider, WindowFit,
};
use burstscan::ref_frame::{rotmt, FrameTransform};
use burstscan::response::{
    AtmosphericTable, AtmosphericTables, DirectResponse, OrientationBucket,
};
use burstscan::sky_grid::SkyGrid;

/// Evenly spread synthetic detector axes (Fibonacci sphere).
pub fn detector_axes() -> Vec<Vector3<f64>> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..DETECTOR_COUNT)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / DETECTOR_COUNT as f64;
            let r = (1.0 - z * z).sqrt();
            let az = golden * i as f64;
            Vector3::new(r * az.cos(), r * az.sin(), z)
        })
        .collect()
}

/// Spectral channel profile for template `spectrum`: hard templates weight
/// the high channels, soft templates the low ones.
pub fn channel_profile(spectrum: usize, channel: usize) -> f64 {
    match spectrum {
        0 => (channel + 1) as f64 / RAW_CHANNELS as f64,
        1 => 1.0,
        _ => (RAW_CHANNELS - channel) as f64 / RAW_CHANNELS as f64,
    }
}

/// Direct-response tables whose rows genuinely distinguish sky cells and
/// spectra, so localization and template recovery are meaningful.
pub fn direct_response(grid: &SkyGrid) -> DirectResponse {
    let axes = detector_axes();
    let nsky = grid.len();
    let nai = (0..3)
        .map(|spectrum| {
            DMatrix::from_fn(nsky, NAI_COUNT * RAW_CHANNELS, |cell, flat| {
                let det = flat / RAW_CHANNELS;
                let ch = flat % RAW_CHANNELS;
                let geometric = 0.2 + 0.8 * grid.unit(cell).dot(&axes[det]).max(0.0);
                geometric * channel_profile(spectrum, ch)
            })
        })
        .collect();
    let bgo = (0..3)
        .map(|spectrum| {
            DMatrix::from_fn(nsky, BGO_BLOCK, |cell, flat| {
                let det = NAI_COUNT + flat / BGO_CHANNELS;
                let ch = flat % BGO_CHANNELS;
                let geometric = 0.1 + 0.4 * grid.unit(cell).dot(&axes[det]).max(0.0);
                geometric * channel_profile(spectrum, ch)
            })
        })
        .collect();
    DirectResponse::new(nai, bgo).unwrap()
}

/// Atmospheric tables missing for every bucket.
pub struct NoTables;

impl AtmosphericTables for NoTables {
    fn lookup(&self, _bucket: OrientationBucket) -> Option<AtmosphericTable> {
        None
    }
}

/// A small constant atmospheric contribution, available for every bucket.
pub struct UniformTables {
    pub nsky: usize,
    pub value: f64,
}

impl AtmosphericTables for UniformTables {
    fn lookup(&self, _bucket: OrientationBucket) -> Option<AtmosphericTable> {
        Some(AtmosphericTable {
            planes: (0..3)
                .map(|_| DMatrix::from_element(self.nsky, NAI_BLOCK, self.value))
                .collect(),
        })
    }
}

/// Data provider handing out one fixed bundle, or nothing.
pub struct MockData {
    pub bundle: Option<DataBundle>,
}

impl MockData {
    pub fn covering(start: Met, stop: Met) -> MockData {
        MockData {
            bundle: Some(DataBundle {
                start,
                stop,
                good_time: vec![(start, stop)],
            }),
        }
    }

    pub fn with_good_time(start: Met, stop: Met, good_time: Vec<(Met, Met)>) -> MockData {
        MockData {
            bundle: Some(DataBundle {
                start,
                stop,
                good_time,
            }),
        }
    }
}

impl DataProvider for MockData {
    fn fetch(
        &self,
        _start: Met,
        _end: Met,
    ) -> Result<Option<DataBundle>, burstscan::scan_errors::ScanError> {
        Ok(self.bundle.clone())
    }
}

/// Identity-attitude provider with a fixed Sun and an optionally drifting
/// geocenter (rotation about the celestial Z axis).
pub struct MockAttitude {
    pub geocenter: Vector3<f64>,
    pub sun: Vector3<f64>,
    pub drift_deg_per_s: f64,
    pub reference_time: Met,
}

impl MockAttitude {
    pub fn fixed(geocenter: Vector3<f64>) -> MockAttitude {
        MockAttitude {
            geocenter,
            sun: Vector3::x(),
            drift_deg_per_s: 0.0,
            reference_time: 0.0,
        }
    }
}

impl AttitudeProvider for MockAttitude {
    fn transforms(&self, _data: &DataBundle, t: Met) -> FrameTransform {
        let angle = self.drift_deg_per_s.to_radians() * (t - self.reference_time);
        let geocenter = rotmt(angle, 2) * self.geocenter;
        FrameTransform::new(Matrix3::identity(), &geocenter, &self.sun)
    }
}

/// Occultation provider returning a fixed per-source step map.
pub struct MockOccultations {
    pub steps: AHashMap<String, Vec<Met>>,
}

impl MockOccultations {
    pub fn none() -> MockOccultations {
        MockOccultations {
            steps: AHashMap::new(),
        }
    }
}

impl OccultationProvider for MockOccultations {
    fn occultation_steps(
        &self,
        _start: Met,
        _end: Met,
        _data: &DataBundle,
    ) -> AHashMap<String, Vec<Met>> {
        self.steps.clone()
    }
}

/// Overlap in seconds of two centered intervals.
fn overlap_seconds(center_a: Met, dur_a: Seconds, center_b: Met, dur_b: Seconds) -> Seconds {
    let lo = (center_a - 0.5 * dur_a).max(center_b - 0.5 * dur_b);
    let hi = (center_a + 0.5 * dur_a).min(center_b + 0.5 * dur_b);
    (hi - lo).max(0.0)
}

/// Exact-background fitter: Poisson-like variances, unit quality, and the
/// injected merged-axis rates deposited into the lower raw channel of each
/// merged pair for the window-overlap duration.
pub struct MockFitter {
    /// Background rate per raw entry, counts/s.
    pub background_rate: f64,
    /// Raw-axis quality flags handed back with every fit.
    pub quality: DVector<f64>,
    /// When set, every window is reported unfittable.
    pub unfittable: bool,
}

impl MockFitter {
    pub fn exact(background_rate: f64) -> MockFitter {
        MockFitter {
            background_rate,
            quality: DVector::from_element(RAW_CHAN_DET, 1.0),
            unfittable: false,
        }
    }
}

impl BackgroundFitter for MockFitter {
    fn fit(
        &self,
        _data: &DataBundle,
        center: Met,
        duration: Seconds,
        injection: Option<&InjectedRates>,
    ) -> Result<Option<WindowFit>, burstscan::scan_errors::ScanError> {
        if self.unfittable {
            return Ok(None);
        }
        let background_counts = self.background_rate * duration;
        let background = DVector::from_element(RAW_CHAN_DET, background_counts);
        let mut foreground = background.clone();

        if let Some(inj) = injection {
            let overlap = overlap_seconds(center, duration, inj.time, inj.duration);
            if overlap > 0.0 {
                for det in 0..NAI_COUNT {
                    for merged_ch in 0..NAI_CHANNELS {
                        let raw_ch = if merged_ch <= NAI_MERGE_LO {
                            merged_ch
                        } else {
                            merged_ch + 1
                        };
                        foreground[det * RAW_CHANNELS + raw_ch] +=
                            inj.rates[det * NAI_CHANNELS + merged_ch] * overlap;
                    }
                }
                for det in 0..BGO_COUNT {
                    for ch in 0..BGO_CHANNELS {
                        foreground[(NAI_COUNT + det) * RAW_CHANNELS + ch] +=
                            inj.rates[NAI_BLOCK + det * BGO_CHANNELS + ch] * overlap;
                    }
                }
            }
        }

        Ok(Some(WindowFit {
            foreground,
            background: background.clone(),
            quality: self.quality.clone(),
            variance_fit: background,
            variance_sys: DVector::zeros(RAW_CHAN_DET),
            chi_square: DVector::from_element(RAW_CHAN_DET, 1.0),
        }))
    }
}
