//! # Instrument and celestial reference frames
//!
//! Directions are handled in two frames:
//!
//! - the **instrument frame**, a detector-fixed frame in which a direction is
//!   an (azimuth, zenith-angle) pair: azimuth in [0, 2π) around the +Z axis,
//!   zenith angle in [0, π] from +Z;
//! - the **celestial frame**, in which a direction is a (right ascension,
//!   declination) pair.
//!
//! The [`FrameTransform`] pair of rotation operators converts between the two
//! at a given mission time; it is supplied per window by the attitude
//! collaborator together with the instrument-frame geocenter and Sun
//! directions. All conversions go through unit vectors, and angular
//! separations use the `atan2` form, which stays accurate for both small and
//! near-antipodal separations.

use nalgebra::{Matrix3, Vector3};

use crate::constants::{Radian, DPI};

/// Rotation operators between the instrument and celestial frames at one
/// mission time, together with the reference-body directions needed by the
/// visibility mask and the event assembler.
#[derive(Debug, Clone)]
pub struct FrameTransform {
    /// Rotation taking instrument-frame vectors to the celestial frame.
    pub to_celestial: Matrix3<f64>,
    /// Rotation taking celestial-frame vectors to the instrument frame.
    pub to_instrument: Matrix3<f64>,
    /// Unit vector toward the geocenter, instrument frame.
    pub geocenter: Vector3<f64>,
    /// Unit vector toward the Sun, instrument frame.
    pub sun: Vector3<f64>,
}

impl FrameTransform {
    /// Build a transform from the instrument→celestial rotation and the
    /// celestial-frame geocenter and Sun directions.
    pub fn new(
        to_celestial: Matrix3<f64>,
        geocenter_celestial: &Vector3<f64>,
        sun_celestial: &Vector3<f64>,
    ) -> Self {
        let to_instrument = to_celestial.transpose();
        FrameTransform {
            to_celestial,
            to_instrument,
            geocenter: to_instrument * geocenter_celestial,
            sun: to_instrument * sun_celestial,
        }
    }

    /// Celestial (RA, Dec) of an instrument-frame (azimuth, zenith) direction.
    pub fn azzen_to_radec(&self, azimuth: Radian, zenith: Radian) -> (Radian, Radian) {
        unit_to_radec(&(self.to_celestial * azzen_to_unit(azimuth, zenith)))
    }

    /// Instrument-frame (azimuth, zenith) of a celestial (RA, Dec) direction.
    pub fn radec_to_azzen(&self, ra: Radian, dec: Radian) -> (Radian, Radian) {
        unit_to_azzen(&(self.to_instrument * radec_to_unit(ra, dec)))
    }
}

/// Unit vector of an instrument-frame (azimuth, zenith-angle) direction.
pub fn azzen_to_unit(azimuth: Radian, zenith: Radian) -> Vector3<f64> {
    let (sin_az, cos_az) = azimuth.sin_cos();
    let (sin_zen, cos_zen) = zenith.sin_cos();
    Vector3::new(sin_zen * cos_az, sin_zen * sin_az, cos_zen)
}

/// Instrument-frame (azimuth, zenith-angle) of a unit vector, azimuth wrapped
/// to [0, 2π).
pub fn unit_to_azzen(v: &Vector3<f64>) -> (Radian, Radian) {
    let azimuth = v.y.atan2(v.x).rem_euclid(DPI);
    let zenith = v.z.clamp(-1.0, 1.0).acos();
    (azimuth, zenith)
}

/// Unit vector of a celestial (RA, Dec) direction.
pub fn radec_to_unit(ra: Radian, dec: Radian) -> Vector3<f64> {
    let (sin_ra, cos_ra) = ra.sin_cos();
    let (sin_dec, cos_dec) = dec.sin_cos();
    Vector3::new(cos_dec * cos_ra, cos_dec * sin_ra, sin_dec)
}

/// Celestial (RA, Dec) of a unit vector, RA wrapped to [0, 2π).
pub fn unit_to_radec(v: &Vector3<f64>) -> (Radian, Radian) {
    let ra = v.y.atan2(v.x).rem_euclid(DPI);
    let dec = v.z.clamp(-1.0, 1.0).asin();
    (ra, dec)
}

/// Angular separation between two directions.
pub fn angular_separation(a: &Vector3<f64>, b: &Vector3<f64>) -> Radian {
    a.cross(b).norm().atan2(a.dot(b))
}

/// Rotation matrix of angle `alpha` around coordinate axis `k`
/// (0 = X, 1 = Y, 2 = Z), rotating the reference frame.
pub fn rotmt(alpha: Radian, k: usize) -> Matrix3<f64> {
    let (s, c) = alpha.sin_cos();
    match k {
        0 => Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c),
        1 => Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c),
        2 => Matrix3::new(c, s, 0.0, -s, c, 0.0, 0.0, 0.0, 1.0),
        _ => panic!("rotation axis must be 0, 1 or 2, got {k}"),
    }
}
