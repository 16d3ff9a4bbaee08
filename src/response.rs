//! # Instrument response assembly and caching
//!
//! The expected count rate per unit source amplitude combines two tables:
//!
//! - the **direct-illumination response**, fixed in the instrument frame and
//!   therefore valid for the whole run;
//! - the **atmospheric-scattering response**, which depends on where the
//!   occulting body sits relative to the instrument and is precomputed only
//!   for a discrete set of orientation buckets.
//!
//! [`ResponseCache::resolve`] quantizes the current geocenter direction into
//! an [`OrientationBucket`] and keeps exactly one assembled
//! [`ResponseTensor`] alive: the one for the most recently requested bucket.
//! The previous tensor is dropped before its replacement is built, which
//! bounds peak memory; a multi-entry cache buys nothing here because the
//! orientation drifts slowly and monotonically across a scan.
//!
//! Assembly of a tensor is: merge the two adjacent low-energy raw channels of
//! every low-energy detector so the direct table matches the atmospheric
//! binning, add the atmospheric contribution (all zero, with a lowered
//! validity flag, when the bucket has no precomputed table), then concatenate
//! the high-energy block along the channel axis.

use nalgebra::DMatrix;

use crate::constants::{
    Radian, BGO_BLOCK, CHAN_DET, DEGRAD, NAI_BLOCK, NAI_CHANNELS, NAI_COUNT, NAI_MERGE_HI,
    NAI_MERGE_LO, ORIENTATION_QUANTUM_DEG, RAW_CHANNELS,
};
use crate::scan_errors::ScanError;

/// Quantized snapshot of the geocenter direction in the instrument frame.
///
/// Both angles are rounded to the nearest
/// [`ORIENTATION_QUANTUM_DEG`](crate::constants::ORIENTATION_QUANTUM_DEG);
/// the azimuth wraps to [0, 360) and applies the two adjacent-bucket merges
/// (140/150→145, 125/135→130) that align with the available atmospheric
/// tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrientationBucket {
    pub azimuth_deg: u16,
    pub zenith_deg: u16,
}

impl OrientationBucket {
    /// Quantize a continuous instrument-frame (azimuth, zenith) reading.
    pub fn from_angles(azimuth: Radian, zenith: Radian) -> OrientationBucket {
        let quantum = ORIENTATION_QUANTUM_DEG;
        let az = (azimuth * DEGRAD).rem_euclid(360.0);
        let mut az_deg = ((az / quantum).round() * quantum).rem_euclid(360.0) as u16;
        az_deg = match az_deg {
            140 | 150 => 145,
            125 | 135 => 130,
            other => other,
        };
        let zen = (zenith * DEGRAD).clamp(0.0, 180.0);
        let zen_deg = ((zen / quantum).round() * quantum) as u16;
        OrientationBucket {
            azimuth_deg: az_deg,
            zenith_deg: zen_deg,
        }
    }
}

/// Direct-illumination response tables, per spectrum, on the raw channel
/// axis: one `nsky × (12·8)` low-energy plane and one `nsky × 16`
/// high-energy plane per spectrum.
#[derive(Debug, Clone)]
pub struct DirectResponse {
    nai: Vec<DMatrix<f64>>,
    bgo: Vec<DMatrix<f64>>,
}

impl DirectResponse {
    /// Validate and wrap per-spectrum direct-response planes.
    pub fn new(nai: Vec<DMatrix<f64>>, bgo: Vec<DMatrix<f64>>) -> Result<DirectResponse, ScanError> {
        if nai.is_empty() || nai.len() != bgo.len() {
            return Err(ScanError::ResponseShape(format!(
                "{} low-energy planes, {} high-energy planes",
                nai.len(),
                bgo.len()
            )));
        }
        let nsky = nai[0].nrows();
        for (n, b) in nai.iter().zip(&bgo) {
            if n.nrows() != nsky
                || b.nrows() != nsky
                || n.ncols() != NAI_COUNT * RAW_CHANNELS
                || b.ncols() != BGO_BLOCK
            {
                return Err(ScanError::ResponseShape(format!(
                    "direct planes must be {nsky}×{} and {nsky}×{}, got {}×{} and {}×{}",
                    NAI_COUNT * RAW_CHANNELS,
                    BGO_BLOCK,
                    n.nrows(),
                    n.ncols(),
                    b.nrows(),
                    b.ncols()
                )));
            }
        }
        Ok(DirectResponse { nai, bgo })
    }

    pub fn spectrum_count(&self) -> usize {
        self.nai.len()
    }

    pub fn sky_cells(&self) -> usize {
        self.nai[0].nrows()
    }
}

/// Atmospheric-scattering response for one orientation bucket: per spectrum,
/// an `nsky × NAI_BLOCK` plane on the merged low-energy channel axis.
#[derive(Debug, Clone)]
pub struct AtmosphericTable {
    pub planes: Vec<DMatrix<f64>>,
}

/// Precomputed atmospheric response tables keyed by orientation bucket.
pub trait AtmosphericTables {
    /// Table for `bucket`, or `None` when the bucket has no precomputed
    /// table (the cache then degrades to a zero atmospheric contribution).
    fn lookup(&self, bucket: OrientationBucket) -> Option<AtmosphericTable>;
}

/// Assembled response: per spectrum, an `nsky × CHAN_DET` plane of expected
/// count rate per unit amplitude on the merged channel axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTensor {
    planes: Vec<DMatrix<f64>>,
    atmospheric_valid: bool,
}

impl ResponseTensor {
    /// Response plane for one spectrum (rows: sky cells, columns: merged
    /// channel×detector axis).
    pub fn plane(&self, spectrum: usize) -> &DMatrix<f64> {
        &self.planes[spectrum]
    }

    pub fn spectrum_count(&self) -> usize {
        self.planes.len()
    }

    pub fn sky_cells(&self) -> usize {
        self.planes[0].nrows()
    }

    /// False when the atmospheric contribution was unavailable for the
    /// bucket this tensor was built for.
    pub fn atmospheric_valid(&self) -> bool {
        self.atmospheric_valid
    }
}

/// Merge the two adjacent low-energy raw channels of every low-energy
/// detector: merged value = sum of both pre-merge values, applied exactly
/// once, in channel order.
pub fn merge_low_energy_plane(raw: &DMatrix<f64>) -> DMatrix<f64> {
    let nsky = raw.nrows();
    let mut merged = DMatrix::zeros(nsky, NAI_BLOCK);
    for det in 0..NAI_COUNT {
        for ch in 0..RAW_CHANNELS {
            let target = merged_channel(ch);
            for cell in 0..nsky {
                merged[(cell, det * NAI_CHANNELS + target)] +=
                    raw[(cell, det * RAW_CHANNELS + ch)];
            }
        }
    }
    merged
}

/// Post-merge channel index of a raw low-energy channel.
pub fn merged_channel(raw_channel: usize) -> usize {
    if raw_channel <= NAI_MERGE_LO {
        raw_channel
    } else if raw_channel == NAI_MERGE_HI {
        NAI_MERGE_LO
    } else {
        raw_channel - 1
    }
}

fn build_tensor(
    direct: &DirectResponse,
    tables: &dyn AtmosphericTables,
    bucket: OrientationBucket,
) -> ResponseTensor {
    let nsky = direct.sky_cells();
    let atmospheric = tables.lookup(bucket).filter(|table| {
        let ok = table.planes.len() == direct.spectrum_count()
            && table
                .planes
                .iter()
                .all(|p| p.nrows() == nsky && p.ncols() == NAI_BLOCK);
        if !ok {
            log::warn!(
                "atmospheric table for bucket {bucket:?} has a mismatched shape, treating as unavailable"
            );
        }
        ok
    });
    let atmospheric_valid = atmospheric.is_some();

    let planes = (0..direct.spectrum_count())
        .map(|s| {
            let mut low = merge_low_energy_plane(&direct.nai[s]);
            if let Some(table) = &atmospheric {
                low += &table.planes[s];
            }
            let high = &direct.bgo[s];
            DMatrix::from_fn(nsky, CHAN_DET, |cell, flat| {
                if flat < NAI_BLOCK {
                    low[(cell, flat)]
                } else {
                    high[(cell, flat - NAI_BLOCK)]
                }
            })
        })
        .collect();

    ResponseTensor {
        planes,
        atmospheric_valid,
    }
}

/// Single-tensor response cache keyed by orientation bucket.
///
/// Invariant: after [`resolve`](ResponseCache::resolve) returns, the held
/// tensor corresponds to the most recently requested bucket.
pub struct ResponseCache {
    direct: DirectResponse,
    tables: Box<dyn AtmosphericTables>,
    bucket: Option<OrientationBucket>,
    tensor: Option<ResponseTensor>,
    rebuilds: usize,
}

impl ResponseCache {
    pub fn new(direct: DirectResponse, tables: Box<dyn AtmosphericTables>) -> ResponseCache {
        ResponseCache {
            direct,
            tables,
            bucket: None,
            tensor: None,
            rebuilds: 0,
        }
    }

    /// Tensor for the given continuous orientation reading, rebuilding only
    /// when its quantized bucket differs from the cached one.
    pub fn resolve(&mut self, azimuth: Radian, zenith: Radian) -> &ResponseTensor {
        let bucket = OrientationBucket::from_angles(azimuth, zenith);
        if self.bucket != Some(bucket) || self.tensor.is_none() {
            // Release the previous tensor before assembling its replacement;
            // tensors are large relative to available memory.
            self.tensor = None;
            let tensor = build_tensor(&self.direct, self.tables.as_ref(), bucket);
            log::debug!(
                "response tensor rebuilt for bucket {bucket:?} (atmospheric {})",
                if tensor.atmospheric_valid() {
                    "available"
                } else {
                    "unavailable"
                }
            );
            self.tensor = Some(tensor);
            self.bucket = Some(bucket);
            self.rebuilds += 1;
        }
        match self.tensor.as_ref() {
            Some(tensor) => tensor,
            None => unreachable!("tensor assembled above"),
        }
    }

    /// Number of tensor rebuilds performed so far.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn spectrum_count(&self) -> usize {
        self.direct.spectrum_count()
    }

    pub fn sky_cells(&self) -> usize {
        self.direct.sky_cells()
    }
}
