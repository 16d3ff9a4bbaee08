//! # Channel merging and fit-mask assembly
//!
//! Everything the likelihood engine consumes lives on the merged
//! channel×detector axis. This module performs the one and only merge of the
//! raw fit outputs (merged value = sum of both pre-merge values, applied
//! exactly once, in channel order) and combines the merged quality flags
//! with the occultation channel filter into the final [`FitMask`].
//!
//! The mask is applied **multiplicatively** to the response and the counts,
//! so a masked-out entry contributes exactly zero (not approximately zero)
//! to every downstream inner product. Likelihood correctness depends on this
//! holding exactly.

use nalgebra::DVector;

use crate::constants::{
    BGO_CHANNELS, BGO_COUNT, CHAN_DET, NAI_BLOCK, NAI_CHANNELS, NAI_COUNT, NAI_MERGE_HI,
    NAI_MERGE_LO, OCCULTATION_CHANNEL_CUT, RAW_CHANNELS,
};
use crate::providers::WindowFit;
use crate::response::merged_channel;

/// Fit outputs on the merged channel×detector axis.
#[derive(Debug, Clone)]
pub struct MergedWindow {
    /// Foreground counts over the window.
    pub foreground: DVector<f64>,
    /// Fitted background counts over the window.
    pub background: DVector<f64>,
    /// Total per-entry variance (fit + systematic).
    pub variance: DVector<f64>,
    /// Background-fit quality flags, 0/1 (merged pairs AND together).
    pub quality: DVector<f64>,
    /// Reduced background-fit statistic per entry (merged pairs average).
    pub chi_square: DVector<f64>,
}

/// Sum-merge a raw-axis vector onto the merged axis.
fn merge_additive(raw: &DVector<f64>) -> DVector<f64> {
    let mut merged = DVector::zeros(CHAN_DET);
    for det in 0..NAI_COUNT {
        for ch in 0..RAW_CHANNELS {
            merged[det * NAI_CHANNELS + merged_channel(ch)] += raw[det * RAW_CHANNELS + ch];
        }
    }
    for det in 0..BGO_COUNT {
        for ch in 0..BGO_CHANNELS {
            merged[NAI_BLOCK + det * BGO_CHANNELS + ch] =
                raw[(NAI_COUNT + det) * RAW_CHANNELS + ch];
        }
    }
    merged
}

/// Merge the raw fit outputs onto the merged axis.
///
/// Counts and variances add across the merged channel pair; quality flags
/// AND (a merged channel is trusted only if both contributing channels are);
/// the reduced fit statistic averages.
pub fn merge_window_fit(fit: &WindowFit) -> MergedWindow {
    let mut quality = DVector::zeros(CHAN_DET);
    let mut chi_square = DVector::zeros(CHAN_DET);
    for det in 0..NAI_COUNT {
        for ch in 0..NAI_CHANNELS {
            let flat = det * NAI_CHANNELS + ch;
            if ch == NAI_MERGE_LO {
                let lo = det * RAW_CHANNELS + NAI_MERGE_LO;
                let hi = det * RAW_CHANNELS + NAI_MERGE_HI;
                quality[flat] = flag(fit.quality[lo]) * flag(fit.quality[hi]);
                chi_square[flat] = 0.5 * (fit.chi_square[lo] + fit.chi_square[hi]);
            } else {
                let raw = det * RAW_CHANNELS + if ch < NAI_MERGE_LO { ch } else { ch + 1 };
                quality[flat] = flag(fit.quality[raw]);
                chi_square[flat] = fit.chi_square[raw];
            }
        }
    }
    for det in 0..BGO_COUNT {
        for ch in 0..BGO_CHANNELS {
            let flat = NAI_BLOCK + det * BGO_CHANNELS + ch;
            let raw = (NAI_COUNT + det) * RAW_CHANNELS + ch;
            quality[flat] = flag(fit.quality[raw]);
            chi_square[flat] = fit.chi_square[raw];
        }
    }

    let variance = merge_additive(&(&fit.variance_fit + &fit.variance_sys));
    MergedWindow {
        foreground: merge_additive(&fit.foreground),
        background: merge_additive(&fit.background),
        variance,
        quality,
        chi_square,
    }
}

fn flag(q: f64) -> f64 {
    if q > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Combined quality/occultation gating vector over the merged axis, 0/1.
#[derive(Debug, Clone)]
pub struct FitMask {
    values: DVector<f64>,
}

impl FitMask {
    /// AND the merged quality flags with the occultation channel filter.
    ///
    /// While an occultation step overlaps the padded analysis interval, the
    /// lowest [`OCCULTATION_CHANNEL_CUT`](crate::constants::OCCULTATION_CHANNEL_CUT)
    /// channels of every low-energy detector are zeroed regardless of their
    /// quality flags.
    pub fn assemble(quality: &DVector<f64>, occultation_overlap: bool) -> FitMask {
        let mut values = quality.map(flag);
        if occultation_overlap {
            for det in 0..NAI_COUNT {
                for ch in 0..OCCULTATION_CHANNEL_CUT {
                    values[det * NAI_CHANNELS + ch] = 0.0;
                }
            }
        }
        FitMask { values }
    }

    /// 0/1 gating values on the merged axis.
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Number of trusted entries.
    pub fn trusted_count(&self) -> usize {
        self.values.iter().filter(|&&m| m > 0.0).count()
    }
}

#[cfg(test)]
mod quality_test {
    use super::*;
    use crate::constants::RAW_CHAN_DET;

    fn raw_fit() -> WindowFit {
        WindowFit {
            foreground: DVector::from_fn(RAW_CHAN_DET, |i, _| i as f64),
            background: DVector::from_element(RAW_CHAN_DET, 2.0),
            quality: DVector::from_element(RAW_CHAN_DET, 1.0),
            variance_fit: DVector::from_element(RAW_CHAN_DET, 1.0),
            variance_sys: DVector::from_element(RAW_CHAN_DET, 0.5),
            chi_square: DVector::from_element(RAW_CHAN_DET, 1.2),
        }
    }

    #[test]
    fn merged_counts_preserve_per_detector_sums() {
        let fit = raw_fit();
        let merged = merge_window_fit(&fit);
        for det in 0..NAI_COUNT {
            let raw_sum: f64 = (0..RAW_CHANNELS)
                .map(|ch| fit.foreground[det * RAW_CHANNELS + ch])
                .sum();
            let merged_sum: f64 = (0..NAI_CHANNELS)
                .map(|ch| merged.foreground[det * NAI_CHANNELS + ch])
                .sum();
            assert_eq!(raw_sum, merged_sum);
        }
        // Variances add across the merged pair.
        assert_eq!(merged.variance[NAI_MERGE_LO], 3.0);
        assert_eq!(merged.variance[0], 1.5);
    }

    #[test]
    fn merged_quality_requires_both_channels() {
        let mut fit = raw_fit();
        fit.quality[NAI_MERGE_HI] = 0.0; // detector n0
        let merged = merge_window_fit(&fit);
        assert_eq!(merged.quality[NAI_MERGE_LO], 0.0);
        assert_eq!(merged.quality[NAI_MERGE_LO - 1], 1.0);
    }

    #[test]
    fn merge_holds_at_zero_background_boundary() {
        let mut fit = raw_fit();
        for ch in 0..RAW_CHANNELS {
            fit.background[3 * RAW_CHANNELS + ch] = 0.0;
            fit.variance_fit[3 * RAW_CHANNELS + ch] = 0.0;
            fit.variance_sys[3 * RAW_CHANNELS + ch] = 0.0;
        }
        fit.foreground[3 * RAW_CHANNELS + NAI_MERGE_LO] = 7.0;
        fit.foreground[3 * RAW_CHANNELS + NAI_MERGE_HI] = 5.0;
        let merged = merge_window_fit(&fit);
        let flat = 3 * NAI_CHANNELS + NAI_MERGE_LO;
        assert_eq!(merged.foreground[flat], 12.0);
        assert_eq!(merged.background[flat], 0.0);
        assert_eq!(merged.variance[flat], 0.0);
        assert_eq!(merged.quality[flat], 1.0);
    }

    #[test]
    fn mask_is_entrywise_subset_of_quality() {
        let mut fit = raw_fit();
        fit.quality[10] = 0.0;
        let merged = merge_window_fit(&fit);
        for overlap in [false, true] {
            let mask = FitMask::assemble(&merged.quality, overlap);
            for i in 0..CHAN_DET {
                assert!(mask.values()[i] <= merged.quality[i]);
            }
        }
    }

    #[test]
    fn occultation_filter_zeroes_low_channels_regardless_of_quality() {
        let fit = raw_fit();
        let merged = merge_window_fit(&fit);
        let mask = FitMask::assemble(&merged.quality, true);
        for det in 0..NAI_COUNT {
            for ch in 0..OCCULTATION_CHANNEL_CUT {
                assert_eq!(mask.values()[det * NAI_CHANNELS + ch], 0.0);
            }
            assert_eq!(mask.values()[det * NAI_CHANNELS + OCCULTATION_CHANNEL_CUT], 1.0);
        }
        // High-energy channels are untouched by the filter.
        assert_eq!(mask.values()[NAI_BLOCK], 1.0);
    }
}
