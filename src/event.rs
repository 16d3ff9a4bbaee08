//! # Event record assembly
//!
//! One fixed-schema record is emitted per window, unconditionally: windows
//! whose fit could not be performed at all produce a **degraded** record with
//! every derived field exactly zero and the analyzable flag down. Records are
//! appended in scan order and never mutated afterward.
//!
//! Derived diagnostics beyond the marginalization outputs:
//!
//! - per-detector and matched-filter signal-to-noise ratios;
//! - reduced background-fit statistic over the trusted entries, overall and
//!   restricted to positive residuals;
//! - angular offsets of the best-fit position to the geocenter and the Sun;
//! - two cosmic-ray veto statistics built from the low-channel significance
//!   of the two brightest low-energy detectors: their summed significance,
//!   and how isolated that pair is against the total positive significance.
//!   A particle shower lights up one or two neighbouring detectors at low
//!   energy; a real sky signal spreads across the complement.

use smallvec::SmallVec;

use crate::constants::{
    Met, Seconds, DEGRAD, DETECTOR_COUNT, NAI_COUNT, OCCULTATION_CHANNEL_CUT,
};
use crate::detectors::Detector;
use crate::likelihood::LikelihoodGrid;
use crate::marginalize::Marginal;
use crate::quality::{FitMask, MergedWindow};
use crate::ref_frame::{angular_separation, azzen_to_unit, FrameTransform};
use crate::sky_grid::SkyGrid;
use crate::windows::Window;

/// One row of the output table.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub center_time: Met,
    pub duration: Seconds,
    pub in_good_time: bool,
    pub response_valid: bool,
    pub analyzable: bool,
    pub best_spectrum: usize,
    pub amplitude: f64,
    pub optimal_snr: f64,
    pub best_azimuth_deg: f64,
    pub best_zenith_deg: f64,
    pub best_ra_deg: f64,
    pub best_dec_deg: f64,
    pub coincident_ra_deg: f64,
    pub coincident_dec_deg: f64,
    pub marginal_best_azimuth_deg: f64,
    pub marginal_best_zenith_deg: f64,
    pub marginal_best_spectrum: usize,
    pub chi2_dof: f64,
    pub chi2_dof_positive: f64,
    pub geocenter_offset_deg: f64,
    pub sun_offset_deg: f64,
    pub marginal_log_like: f64,
    pub weighted_log_like: f64,
    pub veto_top2_snr: f64,
    pub veto_isolation: f64,
    pub detector_snr: [f64; DETECTOR_COUNT],
}

impl EventRecord {
    /// Column names of [`to_row`](EventRecord::to_row), in order.
    pub const COLUMNS: &'static [&'static str] = &[
        "center_time",
        "duration",
        "in_good_time",
        "response_valid",
        "analyzable",
        "best_spectrum",
        "amplitude",
        "optimal_snr",
        "best_azimuth_deg",
        "best_zenith_deg",
        "best_ra_deg",
        "best_dec_deg",
        "coincident_ra_deg",
        "coincident_dec_deg",
        "marginal_best_azimuth_deg",
        "marginal_best_zenith_deg",
        "marginal_best_spectrum",
        "chi2_dof",
        "chi2_dof_positive",
        "geocenter_offset_deg",
        "sun_offset_deg",
        "marginal_log_like",
        "weighted_log_like",
        "veto_top2_snr",
        "veto_isolation",
        "snr_n0",
        "snr_n1",
        "snr_n2",
        "snr_n3",
        "snr_n4",
        "snr_n5",
        "snr_n6",
        "snr_n7",
        "snr_n8",
        "snr_n9",
        "snr_n10",
        "snr_n11",
        "snr_b0",
        "snr_b1",
    ];

    /// Degraded record for a window whose fit could not be performed: every
    /// derived field exactly zero, analyzable flag down.
    pub fn degraded(
        center_time: Met,
        duration: Seconds,
        in_good_time: bool,
        response_valid: bool,
    ) -> EventRecord {
        EventRecord {
            center_time,
            duration,
            in_good_time,
            response_valid,
            analyzable: false,
            best_spectrum: 0,
            amplitude: 0.0,
            optimal_snr: 0.0,
            best_azimuth_deg: 0.0,
            best_zenith_deg: 0.0,
            best_ra_deg: 0.0,
            best_dec_deg: 0.0,
            coincident_ra_deg: 0.0,
            coincident_dec_deg: 0.0,
            marginal_best_azimuth_deg: 0.0,
            marginal_best_zenith_deg: 0.0,
            marginal_best_spectrum: 0,
            chi2_dof: 0.0,
            chi2_dof_positive: 0.0,
            geocenter_offset_deg: 0.0,
            sun_offset_deg: 0.0,
            marginal_log_like: 0.0,
            weighted_log_like: 0.0,
            veto_top2_snr: 0.0,
            veto_isolation: 0.0,
            detector_snr: [0.0; DETECTOR_COUNT],
        }
    }

    /// Flatten to the fixed binary-table row, flags as 0/1.
    pub fn to_row(&self) -> Vec<f64> {
        let mut row = vec![
            self.center_time,
            self.duration,
            self.in_good_time as u8 as f64,
            self.response_valid as u8 as f64,
            self.analyzable as u8 as f64,
            self.best_spectrum as f64,
            self.amplitude,
            self.optimal_snr,
            self.best_azimuth_deg,
            self.best_zenith_deg,
            self.best_ra_deg,
            self.best_dec_deg,
            self.coincident_ra_deg,
            self.coincident_dec_deg,
            self.marginal_best_azimuth_deg,
            self.marginal_best_zenith_deg,
            self.marginal_best_spectrum as f64,
            self.chi2_dof,
            self.chi2_dof_positive,
            self.geocenter_offset_deg,
            self.sun_offset_deg,
            self.marginal_log_like,
            self.weighted_log_like,
            self.veto_top2_snr,
            self.veto_isolation,
        ];
        row.extend_from_slice(&self.detector_snr);
        row
    }
}

/// Signal-to-noise of one detector's masked residual counts.
fn detector_snr(merged: &MergedWindow, mask: &FitMask, det: Detector) -> f64 {
    let offset = det.merged_offset();
    let mut residual = 0.0;
    let mut variance = 0.0;
    for ch in 0..det.channel_count() {
        let flat = offset + ch;
        let m = mask.values()[flat];
        residual += m * (merged.foreground[flat] - merged.background[flat]);
        variance += m * merged.variance[flat];
    }
    if variance > 0.0 {
        residual / variance.sqrt()
    } else {
        0.0
    }
}

/// Low-channel significance of one low-energy detector (the channels the
/// occultation filter also distrusts are the ones particle showers favor).
fn low_channel_snr(merged: &MergedWindow, mask: &FitMask, det: Detector) -> f64 {
    let offset = det.merged_offset();
    let mut residual = 0.0;
    let mut variance = 0.0;
    for ch in 0..OCCULTATION_CHANNEL_CUT {
        let flat = offset + ch;
        let m = mask.values()[flat];
        residual += m * (merged.foreground[flat] - merged.background[flat]);
        variance += m * merged.variance[flat];
    }
    if variance > 0.0 {
        residual / variance.sqrt()
    } else {
        0.0
    }
}

/// Reduced fit statistic over the trusted entries, optionally restricted to
/// positive residuals.
fn masked_chi2(merged: &MergedWindow, mask: &FitMask, positive_only: bool) -> f64 {
    let mut total = 0.0;
    let mut dof = 0usize;
    for flat in 0..mask.values().len() {
        if mask.values()[flat] <= 0.0 {
            continue;
        }
        if positive_only && merged.foreground[flat] - merged.background[flat] <= 0.0 {
            continue;
        }
        total += merged.chi_square[flat];
        dof += 1;
    }
    if dof > 0 {
        total / dof as f64
    } else {
        0.0
    }
}

/// Cosmic-ray veto statistics: summed low-channel significance of the two
/// brightest low-energy detectors, and its share of the total positive
/// low-channel significance.
fn veto_statistics(merged: &MergedWindow, mask: &FitMask) -> (f64, f64) {
    let mut snrs: SmallVec<[f64; NAI_COUNT]> = Detector::ALL
        .iter()
        .filter(|d| d.is_low_energy())
        .map(|&d| low_channel_snr(merged, mask, d))
        .collect();
    snrs.sort_by(|a, b| b.total_cmp(a));
    let top2 = snrs[0].max(0.0) + snrs[1].max(0.0);
    let positive: f64 = snrs.iter().filter(|&&z| z > 0.0).sum();
    let isolation = if positive > 0.0 { top2 / positive } else { 0.0 };
    (top2, isolation)
}

/// Package one successfully fitted, scored, and marginalized window.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    window: &Window,
    in_good_time: bool,
    response_valid: bool,
    merged: &MergedWindow,
    mask: &FitMask,
    grid: &SkyGrid,
    likelihood: &LikelihoodGrid,
    marginal: &Marginal,
    transform: &FrameTransform,
) -> EventRecord {
    let (best_az, best_zen) = grid.direction(marginal.best_cell);
    let (best_ra, best_dec) = transform.azzen_to_radec(best_az, best_zen);
    let (coinc_az, coinc_zen) = grid.direction(marginal.coincident_cell);
    let (coinc_ra, coinc_dec) = transform.azzen_to_radec(coinc_az, coinc_zen);
    let (marg_az, marg_zen) = grid.direction(marginal.marginal_best_cell);

    let best_unit = azzen_to_unit(best_az, best_zen);
    let geocenter_offset = angular_separation(&best_unit, &transform.geocenter);
    let sun_offset = angular_separation(&best_unit, &transform.sun);

    let mut snrs = [0.0; DETECTOR_COUNT];
    for det in Detector::ALL {
        snrs[det.index()] = detector_snr(merged, mask, det);
    }
    let (veto_top2, veto_isolation) = veto_statistics(merged, mask);

    EventRecord {
        center_time: window.center,
        duration: window.duration,
        in_good_time,
        response_valid,
        analyzable: true,
        best_spectrum: marginal.best_spectrum,
        amplitude: likelihood.amplitude[(marginal.best_spectrum, marginal.best_column)],
        optimal_snr: likelihood.snr[(marginal.best_spectrum, marginal.best_column)],
        best_azimuth_deg: best_az * DEGRAD,
        best_zenith_deg: best_zen * DEGRAD,
        best_ra_deg: best_ra * DEGRAD,
        best_dec_deg: best_dec * DEGRAD,
        coincident_ra_deg: coinc_ra * DEGRAD,
        coincident_dec_deg: coinc_dec * DEGRAD,
        marginal_best_azimuth_deg: marg_az * DEGRAD,
        marginal_best_zenith_deg: marg_zen * DEGRAD,
        marginal_best_spectrum: marginal.marginal_best_spectrum,
        chi2_dof: masked_chi2(merged, mask, false),
        chi2_dof_positive: masked_chi2(merged, mask, true),
        geocenter_offset_deg: geocenter_offset * DEGRAD,
        sun_offset_deg: sun_offset * DEGRAD,
        marginal_log_like: marginal.marginal_log_like,
        weighted_log_like: marginal.weighted_log_like,
        veto_top2_snr: veto_top2,
        veto_isolation,
        detector_snr: snrs,
    }
}

#[cfg(test)]
mod event_test {
    use super::*;
    use crate::constants::{CHAN_DET, NAI_CHANNELS, RAW_CHAN_DET};
    use crate::providers::WindowFit;
    use crate::quality::merge_window_fit;
    use nalgebra::DVector;

    fn merged_flat(foreground: f64, background: f64, variance: f64) -> MergedWindow {
        merge_window_fit(&WindowFit {
            foreground: DVector::from_element(RAW_CHAN_DET, foreground),
            background: DVector::from_element(RAW_CHAN_DET, background),
            quality: DVector::from_element(RAW_CHAN_DET, 1.0),
            variance_fit: DVector::from_element(RAW_CHAN_DET, variance),
            variance_sys: DVector::from_element(RAW_CHAN_DET, 0.0),
            chi_square: DVector::from_element(RAW_CHAN_DET, 1.5),
        })
    }

    #[test]
    fn degraded_record_is_all_zero_and_unanalyzable() {
        let record = EventRecord::degraded(120.0, 0.512, true, false);
        assert!(!record.analyzable);
        let row = record.to_row();
        assert_eq!(row.len(), EventRecord::COLUMNS.len());
        // Everything beyond time, duration, and the two status flags is zero.
        assert!(row[5..].iter().all(|&v| v == 0.0));
        assert_eq!(row[2], 1.0);
        assert_eq!(row[3], 0.0);
    }

    #[test]
    fn row_length_matches_the_declared_schema() {
        let record = EventRecord::degraded(0.0, 1.0, false, false);
        assert_eq!(record.to_row().len(), 25 + DETECTOR_COUNT);
        assert_eq!(EventRecord::COLUMNS.len(), 25 + DETECTOR_COUNT);
    }

    #[test]
    fn detector_snr_uses_only_that_detectors_entries() {
        let mut merged = merged_flat(10.0, 10.0, 4.0);
        // Excess only in detector n2.
        for ch in 0..NAI_CHANNELS {
            merged.foreground[2 * NAI_CHANNELS + ch] += 6.0;
        }
        let mask = FitMask::assemble(&merged.quality, false);
        let n2 = detector_snr(&merged, &mask, Detector::N2);
        assert!(n2 > 0.0);
        assert_eq!(detector_snr(&merged, &mask, Detector::N3), 0.0);
        // 7 channels × 6 counts over the summed merged variances.
        let expected = 42.0 / 32.0_f64.sqrt();
        assert!((n2 - expected).abs() < 1e-12);
    }

    #[test]
    fn fully_masked_detector_has_zero_snr() {
        let merged = merged_flat(12.0, 10.0, 4.0);
        let mut quality = merged.quality.clone();
        for ch in 0..NAI_CHANNELS {
            quality[5 * NAI_CHANNELS + ch] = 0.0;
        }
        let mask = FitMask::assemble(&quality, false);
        assert_eq!(detector_snr(&merged, &mask, Detector::N5), 0.0);
        assert!(detector_snr(&merged, &mask, Detector::N6) > 0.0);
    }

    #[test]
    fn veto_isolation_flags_a_two_detector_spike() {
        let mut merged = merged_flat(10.0, 10.0, 4.0);
        for ch in 0..OCCULTATION_CHANNEL_CUT {
            merged.foreground[ch] += 30.0; // n0
            merged.foreground[NAI_CHANNELS + ch] += 25.0; // n1
        }
        let mask = FitMask::assemble(&merged.quality, false);
        let (top2, isolation) = veto_statistics(&merged, &mask);
        assert!(top2 > 0.0);
        assert!((isolation - 1.0).abs() < 1e-12);

        // Spread the same excess across every detector: far less isolated.
        let mut spread = merged_flat(10.0, 10.0, 4.0);
        for det in 0..NAI_COUNT {
            for ch in 0..OCCULTATION_CHANNEL_CUT {
                spread.foreground[det * NAI_CHANNELS + ch] += 5.0;
            }
        }
        let (_, spread_isolation) = veto_statistics(&spread, &mask);
        assert!(spread_isolation < 0.5);
    }

    #[test]
    fn chi2_respects_mask_and_residual_sign() {
        let mut merged = merged_flat(12.0, 10.0, 4.0);
        let chi_all = masked_chi2(&merged, &FitMask::assemble(&merged.quality, false), false);
        assert!((chi_all - merged.chi_square.sum() / CHAN_DET as f64).abs() < 1e-12);
        // Make one detector's residuals negative: positive-only drops them.
        for ch in 0..NAI_CHANNELS {
            merged.foreground[ch] = 0.0;
        }
        let mask = FitMask::assemble(&merged.quality, false);
        let chi_pos = masked_chi2(&merged, &mask, true);
        assert!(chi_pos > 0.0);
        assert!((masked_chi2(&merged, &mask, false) - chi_all).abs() < 1e-9);
    }
}
