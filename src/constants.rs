//! # Constants and type definitions for burstscan
//!
//! This module centralizes the **instrument geometry**, **calibration
//! constants**, and **common type definitions** used throughout the
//! `burstscan` library.
//!
//! ## Overview
//!
//! - Detector complement and energy-channel layout (pre- and post-merge)
//! - Physical calibration constants (occlusion geometry, orientation
//!   quantization, reference timescales)
//! - Likelihood tuning constants (amplitude coupling, plateau exponent,
//!   numerical floors)
//! - Core type aliases used across the crate
//!
//! These definitions are used by all main modules, including the response
//! cache, the likelihood engine, and the event assembler. Calibration values
//! are deliberately named here rather than inlined at their point of use so
//! they can be revisited without touching engine logic.

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Mission elapsed time in seconds since [`crate::time::mission_epoch`]
pub type Met = f64;
/// Time span in seconds
pub type Seconds = f64;
/// Angle in radians
pub type Radian = f64;
/// Angle in degrees
pub type Degree = f64;

// -------------------------------------------------------------------------------------------------
// Angular conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for azimuth wrapping
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Radians → degrees
pub const DEGRAD: f64 = 180.0 / std::f64::consts::PI;

// -------------------------------------------------------------------------------------------------
// Detector complement and channel layout
// -------------------------------------------------------------------------------------------------

/// Number of low-energy scintillation detectors
pub const NAI_COUNT: usize = 12;

/// Number of high-energy detectors
pub const BGO_COUNT: usize = 2;

/// Total detector count
pub const DETECTOR_COUNT: usize = NAI_COUNT + BGO_COUNT;

/// Raw energy channels per detector, as delivered by the fit collaborator
pub const RAW_CHANNELS: usize = 8;

/// First raw low-energy channel folded into the merged channel
pub const NAI_MERGE_LO: usize = 3;

/// Second raw low-energy channel folded into the merged channel
pub const NAI_MERGE_HI: usize = 4;

/// Low-energy detector channels after merging channels
/// [`NAI_MERGE_LO`] and [`NAI_MERGE_HI`]
pub const NAI_CHANNELS: usize = RAW_CHANNELS - 1;

/// High-energy detector channels (never merged)
pub const BGO_CHANNELS: usize = RAW_CHANNELS;

/// Length of the low-energy block on the flattened merged channel×detector axis
pub const NAI_BLOCK: usize = NAI_COUNT * NAI_CHANNELS;

/// Length of the high-energy block on the flattened merged channel×detector axis
pub const BGO_BLOCK: usize = BGO_COUNT * BGO_CHANNELS;

/// Length of the flattened merged channel×detector axis
/// (low-energy block first, then high-energy block)
pub const CHAN_DET: usize = NAI_BLOCK + BGO_BLOCK;

/// Length of the flattened raw (pre-merge) channel×detector axis
pub const RAW_CHAN_DET: usize = DETECTOR_COUNT * RAW_CHANNELS;

/// Number of lowest low-energy channels excluded from the fit mask while an
/// occultation step overlaps the analysis interval
pub const OCCULTATION_CHANNEL_CUT: usize = 2;

// -------------------------------------------------------------------------------------------------
// Geometry and orientation calibration
// -------------------------------------------------------------------------------------------------

/// Half-angle of the cone around the geocenter direction inside which a sky
/// direction is considered occulted
pub const OCCLUSION_HALF_ANGLE_DEG: Degree = 67.0;

/// Quantization step for the geocenter orientation bucket
pub const ORIENTATION_QUANTUM_DEG: Degree = 5.0;

/// Default angular step of the instrument-frame sky grid
pub const DEFAULT_GRID_STEP_DEG: Degree = 10.0;

/// Cosine of [`OCCLUSION_HALF_ANGLE_DEG`]; a sky cell is visible iff the
/// cosine of its separation from the geocenter direction does not exceed this
pub fn occlusion_cos() -> f64 {
    (OCCLUSION_HALF_ANGLE_DEG * RADEG).cos()
}

// -------------------------------------------------------------------------------------------------
// Scan timing
// -------------------------------------------------------------------------------------------------

/// Reference window duration anchoring the power-of-two duration ladder, and
/// the floor below which no window duration is allowed (bounds
/// atmospheric-table cache churn)
pub const REFERENCE_DURATION: Seconds = 0.512;

/// Padding applied on each side of a window before testing occultation-step
/// overlap
pub const OCCULTATION_PAD: Seconds = 1.0;

// -------------------------------------------------------------------------------------------------
// Likelihood tuning
// -------------------------------------------------------------------------------------------------

/// Amplitude-prior coupling strength: the prior width on the source amplitude
/// is this factor times the spectrum reference sensitivity
pub const AMPLITUDE_COUPLING: f64 = 10.0;

/// Plateau exponent of the amplitude prior, weighting the Occam penalty of
/// the marginalized likelihood ratio
pub const PLATEAU_EXPONENT: f64 = 0.5;

/// Floor applied to per-entry count variances before any division
pub const VARIANCE_FLOOR: f64 = 1e-12;

/// Floor applied to sky-prior densities before taking their logarithm
pub const PRIOR_FLOOR: f64 = 1e-30;

/// Marginal log-likelihood above which an event is surfaced in the stdout
/// summary
pub const SUMMARY_LLR_THRESHOLD: f64 = 10.0;
