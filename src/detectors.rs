//! # Detector enumeration and flattened channel indexing
//!
//! The detector complement is fixed at compile time: twelve low-energy
//! scintillation detectors (`N0`–`N11`) with seven merged energy channels
//! each, and two high-energy detectors (`B0`, `B1`) with eight channels each.
//! Per-detector quantities are stored in fixed-size arrays indexed by
//! [`Detector::index`], never in open-ended maps.
//!
//! Two flattened axes exist:
//!
//! - the **merged axis** (length [`CHAN_DET`](crate::constants::CHAN_DET)):
//!   low-energy block first (detector-major, 7 channels each), then the
//!   high-energy block (8 channels each). All statistics are computed on this
//!   axis.
//! - the **raw axis** (length [`RAW_CHAN_DET`](crate::constants::RAW_CHAN_DET)):
//!   8 channels for every detector, detector-major. It appears only at the
//!   fit-collaborator boundary, before the channel merge.

use crate::constants::{
    BGO_CHANNELS, BGO_COUNT, DETECTOR_COUNT, NAI_BLOCK, NAI_CHANNELS, NAI_COUNT, RAW_CHANNELS,
};

/// One physical detector of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    N0,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    N8,
    N9,
    N10,
    N11,
    B0,
    B1,
}

impl Detector {
    /// All detectors, in index order (low-energy block first).
    pub const ALL: [Detector; DETECTOR_COUNT] = [
        Detector::N0,
        Detector::N1,
        Detector::N2,
        Detector::N3,
        Detector::N4,
        Detector::N5,
        Detector::N6,
        Detector::N7,
        Detector::N8,
        Detector::N9,
        Detector::N10,
        Detector::N11,
        Detector::B0,
        Detector::B1,
    ];

    /// Stable index of the detector, `0..DETECTOR_COUNT`.
    pub fn index(self) -> usize {
        self as usize
    }

    /// True for the low-energy scintillation detectors.
    pub fn is_low_energy(self) -> bool {
        self.index() < NAI_COUNT
    }

    /// Short mnemonic label, e.g. `"n3"` or `"b0"`.
    pub fn label(self) -> &'static str {
        const LABELS: [&str; DETECTOR_COUNT] = [
            "n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8", "n9", "n10", "n11", "b0", "b1",
        ];
        LABELS[self.index()]
    }

    /// Number of merged energy channels for this detector.
    pub fn channel_count(self) -> usize {
        if self.is_low_energy() {
            NAI_CHANNELS
        } else {
            BGO_CHANNELS
        }
    }

    /// Offset of this detector's first entry on the flattened merged axis.
    pub fn merged_offset(self) -> usize {
        if self.is_low_energy() {
            self.index() * NAI_CHANNELS
        } else {
            NAI_BLOCK + (self.index() - NAI_COUNT) * BGO_CHANNELS
        }
    }

    /// Offset of this detector's first entry on the flattened raw axis.
    pub fn raw_offset(self) -> usize {
        self.index() * RAW_CHANNELS
    }
}

/// Flattened merged-axis index of `(detector, merged channel)`.
pub fn merged_index(det: Detector, channel: usize) -> usize {
    debug_assert!(channel < det.channel_count());
    det.merged_offset() + channel
}

/// Flattened raw-axis index of `(detector, raw channel)`.
pub fn raw_index(det: Detector, channel: usize) -> usize {
    debug_assert!(channel < RAW_CHANNELS);
    det.raw_offset() + channel
}
