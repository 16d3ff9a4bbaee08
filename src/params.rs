//! # Scan configuration
//!
//! [`ScanParams`] centralizes everything a scan run needs beyond its
//! collaborators: the time interval, the window-duration ladder bounds, the
//! sky-grid resolution, the optional synthetic injection, the sky-prior
//! source, and where the output table goes. Parameters are validated once at
//! [`build`](ScanParamsBuilder::build) time; the engine assumes a valid set
//! afterwards.
//!
//! The struct deserializes from JSON job files, with the same defaults the
//! builder applies.
//!
//! ## Example
//!
//! ```rust
//! use burstscan::params::ScanParams;
//!
//! let params = ScanParams::builder()
//!     .start(524_666_400.0)
//!     .end(524_666_500.0)
//!     .min_duration(0.512)
//!     .max_duration(8.192)
//!     .prefix("gw_followup")
//!     .build()
//!     .unwrap();
//! assert_eq!(params.min_step, 0.128);
//! ```

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::constants::{Degree, Met, Seconds, DEFAULT_GRID_STEP_DEG, REFERENCE_DURATION};
use crate::injection::InjectionDescriptor;
use crate::scan_errors::ScanError;
use crate::sky_prior::SkyPriorSource;

fn default_min_duration() -> Seconds {
    REFERENCE_DURATION
}

fn default_max_duration() -> Seconds {
    16.0 * REFERENCE_DURATION
}

fn default_min_step() -> Seconds {
    REFERENCE_DURATION / 4.0
}

fn default_grid_step() -> Degree {
    DEFAULT_GRID_STEP_DEG
}

fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

fn default_prefix() -> String {
    "scan".to_string()
}

/// Validated configuration of one scan run.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanParams {
    /// Scan interval start, mission elapsed seconds.
    pub start: Met,
    /// Scan interval end, mission elapsed seconds.
    pub end: Met,
    /// Requested minimum window duration.
    #[serde(default = "default_min_duration")]
    pub min_duration: Seconds,
    /// Requested maximum window duration.
    #[serde(default = "default_max_duration")]
    pub max_duration: Seconds,
    /// Smallest allowed center step between windows of one duration.
    #[serde(default = "default_min_step")]
    pub min_step: Seconds,
    /// Angular step of the instrument-frame sky grid, degrees.
    #[serde(default = "default_grid_step")]
    pub grid_step_deg: Degree,
    /// Optional synthetic source folded into every window's fit.
    #[serde(default)]
    pub injection: Option<InjectionDescriptor>,
    /// Sky-prior source; uniform when absent.
    #[serde(default)]
    pub prior: SkyPriorSource,
    /// Directory receiving the output table.
    #[serde(default = "default_output_dir")]
    pub output_dir: Utf8PathBuf,
    /// Output file-name prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl ScanParams {
    pub fn builder() -> ScanParamsBuilder {
        ScanParamsBuilder::default()
    }

    /// Scan span in seconds.
    pub fn span(&self) -> Seconds {
        self.end - self.start
    }

    /// Re-run the builder validations (useful after deserialization).
    pub fn validate(&self) -> Result<(), ScanError> {
        if !(self.end > self.start) {
            return Err(ScanError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        if !(self.min_duration > 0.0 && self.max_duration > 0.0) {
            return Err(ScanError::InvalidDurationBounds {
                min: self.min_duration,
                max: self.max_duration,
            });
        }
        if !(self.min_step > 0.0) {
            return Err(ScanError::InvalidStep(self.min_step));
        }
        Ok(())
    }
}

/// Fluent builder for [`ScanParams`].
#[derive(Debug, Clone)]
pub struct ScanParamsBuilder {
    start: Met,
    end: Met,
    min_duration: Seconds,
    max_duration: Seconds,
    min_step: Seconds,
    grid_step_deg: Degree,
    injection: Option<InjectionDescriptor>,
    prior: SkyPriorSource,
    output_dir: Utf8PathBuf,
    prefix: String,
}

impl Default for ScanParamsBuilder {
    fn default() -> Self {
        ScanParamsBuilder {
            start: 0.0,
            end: 0.0,
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            min_step: default_min_step(),
            grid_step_deg: default_grid_step(),
            injection: None,
            prior: SkyPriorSource::Uniform,
            output_dir: default_output_dir(),
            prefix: default_prefix(),
        }
    }
}

impl ScanParamsBuilder {
    pub fn start(mut self, start: Met) -> Self {
        self.start = start;
        self
    }

    pub fn end(mut self, end: Met) -> Self {
        self.end = end;
        self
    }

    pub fn min_duration(mut self, min_duration: Seconds) -> Self {
        self.min_duration = min_duration;
        self
    }

    pub fn max_duration(mut self, max_duration: Seconds) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn min_step(mut self, min_step: Seconds) -> Self {
        self.min_step = min_step;
        self
    }

    pub fn grid_step_deg(mut self, grid_step_deg: Degree) -> Self {
        self.grid_step_deg = grid_step_deg;
        self
    }

    pub fn injection(mut self, injection: InjectionDescriptor) -> Self {
        self.injection = Some(injection);
        self
    }

    pub fn prior(mut self, prior: SkyPriorSource) -> Self {
        self.prior = prior;
        self
    }

    pub fn output_dir(mut self, output_dir: impl Into<Utf8PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ScanParams, ScanError> {
        let params = ScanParams {
            start: self.start,
            end: self.end,
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            min_step: self.min_step,
            grid_step_deg: self.grid_step_deg,
            injection: self.injection,
            prior: self.prior,
            output_dir: self.output_dir,
            prefix: self.prefix,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let params = ScanParams::builder().start(10.0).end(20.0).build().unwrap();
        assert_eq!(params.min_duration, REFERENCE_DURATION);
        assert_eq!(params.min_step, REFERENCE_DURATION / 4.0);
        assert_eq!(params.prefix, "scan");
        assert!(params.injection.is_none());
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        assert!(ScanParams::builder().start(20.0).end(10.0).build().is_err());
        assert!(ScanParams::builder().start(10.0).end(10.0).build().is_err());
    }

    #[test]
    fn non_positive_durations_and_steps_are_rejected() {
        assert!(ScanParams::builder()
            .start(0.0)
            .end(1.0)
            .min_duration(0.0)
            .build()
            .is_err());
        assert!(ScanParams::builder()
            .start(0.0)
            .end(1.0)
            .min_step(-0.5)
            .build()
            .is_err());
    }

    #[test]
    fn deserializes_from_a_job_file() {
        let params: ScanParams = serde_json::from_str(
            r#"{
                "start": 100.0,
                "end": 200.0,
                "prior": {"gaussian": {"ra_deg": 30.0, "dec_deg": -10.0, "sigma_deg": 5.0}},
                "injection": {
                    "time": 150.0, "duration": 1.0,
                    "ra_deg": 30.0, "dec_deg": -10.0,
                    "spectrum": "normal", "amplitude": 2.0
                }
            }"#,
        )
        .unwrap();
        params.validate().unwrap();
        assert_eq!(params.max_duration, 16.0 * REFERENCE_DURATION);
        assert!(matches!(params.prior, SkyPriorSource::Gaussian { .. }));
        assert_eq!(params.injection.unwrap().spectrum, "normal");
    }
}
