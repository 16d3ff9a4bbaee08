//! # TransientScan: the scan driver
//!
//! This module defines the [`TransientScan`] struct, the central façade that
//! wires together:
//!
//! 1. **Run configuration** ([`ScanParams`](crate::params::ScanParams)) —
//!    interval, duration ladder, injection, prior, output.
//! 2. **Run-wide geometry** — the instrument-frame
//!    [`SkyGrid`](crate::sky_grid::SkyGrid) and the
//!    [`SpectrumSet`](crate::spectra::SpectrumSet).
//! 3. **Response assembly** — the single-tensor
//!    [`ResponseCache`](crate::response::ResponseCache), rebuilt on
//!    orientation-bucket changes.
//! 4. **External collaborators** — data pre-fetch, background fitting,
//!    occultation prediction, and attitude reconstruction behind the
//!    [`providers`](crate::providers) traits.
//!
//! The design emphasizes *lazy initialization* and *strict sequential
//! iteration*: the data bundle is fetched on first use via
//! [`OnceCell`](once_cell::sync::OnceCell) and reused for the whole run, and
//! windows are processed, and records appended, strictly in the sorted
//! (time, duration) order of the generator. Each window is independent and
//! idempotent: re-running it against identical cached response and
//! orientation inputs yields an identical record, and a full re-run against
//! identical inputs yields a byte-identical table.
//!
//! ## Typical usage
//!
//! ```rust,no_run
//! use burstscan::params::ScanParams;
//! use burstscan::scan::TransientScan;
//! # fn collaborators() -> (burstscan::response::DirectResponse,
//! #     Box<dyn burstscan::response::AtmosphericTables>,
//! #     Box<dyn burstscan::providers::DataProvider>,
//! #     Box<dyn burstscan::providers::BackgroundFitter>,
//! #     Box<dyn burstscan::providers::OccultationProvider>,
//! #     Box<dyn burstscan::providers::AttitudeProvider>) { unimplemented!() }
//!
//! let params = ScanParams::builder()
//!     .start(524_666_400.0)
//!     .end(524_666_500.0)
//!     .build()
//!     .unwrap();
//! let (direct, tables, data, fitter, occ, attitude) = collaborators();
//! let mut scan = TransientScan::new(params, direct, tables, data, fitter, occ, attitude).unwrap();
//! let path = scan.run_to_file().unwrap();
//! println!("table written to {path}");
//! ```

use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use once_cell::sync::OnceCell;

use crate::constants::RADEG;
use crate::event::{assemble, EventRecord};
use crate::injection::{simulate, InjectedRates};
use crate::likelihood::evaluate;
use crate::marginalize::marginalize;
use crate::output::{output_file_name, preflight, print_summary, write_table};
use crate::params::ScanParams;
use crate::providers::{
    AttitudeProvider, BackgroundFitter, DataBundle, DataProvider, OccultationProvider,
};
use crate::quality::{merge_window_fit, FitMask};
use crate::ref_frame::{radec_to_unit, unit_to_azzen};
use crate::response::{AtmosphericTables, DirectResponse, ResponseCache};
use crate::scan_errors::ScanError;
use crate::sky_grid::SkyGrid;
use crate::sky_prior::{SkyPrior, SkyPriorSource};
use crate::spectra::SpectrumSet;
use crate::visibility::{OccultationSchedule, VisibilityMask};
use crate::windows::{scan_windows, Window};

use camino::Utf8PathBuf;

/// End-of-scan bookkeeping for the stdout summary.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Windows in the scan set.
    pub windows: usize,
    /// Windows whose full span fell inside a good-time interval.
    pub in_good_time: usize,
    /// Windows whose response tensor carried a valid atmospheric component.
    pub valid_response: usize,
    /// Windows that produced a full (non-degraded) record.
    pub analyzed: usize,
    /// Wall-clock time of the scan loop.
    pub elapsed: Duration,
}

/// Sequential scan over the window set; see the module documentation.
pub struct TransientScan {
    params: ScanParams,
    grid: SkyGrid,
    spectra: SpectrumSet,
    cache: ResponseCache,
    data_provider: Box<dyn DataProvider>,
    fitter: Box<dyn BackgroundFitter>,
    occultations: Box<dyn OccultationProvider>,
    attitude: Box<dyn AttitudeProvider>,
    data: OnceCell<DataBundle>,
}

impl TransientScan {
    /// Construct a scan context.
    ///
    /// The sky grid is built from the configured step and the spectrum set
    /// is the standard template triplet; the direct response tables must
    /// match both (same sky-cell and spectrum counts).
    pub fn new(
        params: ScanParams,
        direct: DirectResponse,
        tables: Box<dyn AtmosphericTables>,
        data_provider: Box<dyn DataProvider>,
        fitter: Box<dyn BackgroundFitter>,
        occultations: Box<dyn OccultationProvider>,
        attitude: Box<dyn AttitudeProvider>,
    ) -> Result<TransientScan, ScanError> {
        params.validate()?;
        let grid = SkyGrid::with_step(params.grid_step_deg)?;
        let spectra = SpectrumSet::standard();
        if direct.sky_cells() != grid.len() || direct.spectrum_count() != spectra.len() {
            return Err(ScanError::ResponseShape(format!(
                "direct response covers {} cells × {} spectra, run uses {} × {}",
                direct.sky_cells(),
                direct.spectrum_count(),
                grid.len(),
                spectra.len()
            )));
        }
        Ok(TransientScan {
            params,
            grid,
            spectra,
            cache: ResponseCache::new(direct, tables),
            data_provider,
            fitter,
            occultations,
            attitude,
            data: OnceCell::new(),
        })
    }

    pub fn params(&self) -> &ScanParams {
        &self.params
    }

    pub fn grid(&self) -> &SkyGrid {
        &self.grid
    }

    pub fn spectra(&self) -> &SpectrumSet {
        &self.spectra
    }

    /// Pre-fetched data bundle, fetched once on first use.
    ///
    /// A `None` from the provider is fatal to the whole run.
    fn bundle(&self) -> Result<&DataBundle, ScanError> {
        let (start, end) = (self.params.start, self.params.end);
        self.data.get_or_try_init(|| {
            self.data_provider
                .fetch(start, end)?
                .ok_or(ScanError::DataUnavailable { start, end })
        })
    }

    /// Resolve the configured injection against the response valid at the
    /// injection time.
    fn resolve_injection(&mut self) -> Result<Option<InjectedRates>, ScanError> {
        let Some(descriptor) = self.params.injection.clone() else {
            return Ok(None);
        };
        let bundle = self.bundle()?.clone();
        let transform = self.attitude.transforms(&bundle, descriptor.time);
        let (az, zen) = unit_to_azzen(&transform.geocenter);
        let tensor = self.cache.resolve(az, zen);
        let rates = simulate(&descriptor, &self.grid, &self.spectra, tensor, &transform)?;
        log::info!(
            "injection resolved to cell {} spectrum {} (amplitude {})",
            rates.cell,
            rates.spectrum,
            rates.amplitude
        );
        Ok(Some(rates))
    }

    /// Resolve the configured sky-prior source on the run's grid.
    fn resolve_prior(&self) -> Result<SkyPrior, ScanError> {
        match &self.params.prior {
            SkyPriorSource::Uniform => Ok(SkyPrior::uniform(self.grid.len())),
            SkyPriorSource::Weights(weights) => SkyPrior::from_weights(&self.grid, weights),
            SkyPriorSource::Gaussian {
                ra_deg,
                dec_deg,
                sigma_deg,
            } => {
                let bundle = self.bundle()?.clone();
                let mid = 0.5 * (self.params.start + self.params.end);
                let transform = self.attitude.transforms(&bundle, mid);
                let center =
                    transform.to_instrument * radec_to_unit(ra_deg * RADEG, dec_deg * RADEG);
                SkyPrior::gaussian(&self.grid, &center, *sigma_deg)
            }
        }
    }

    /// Run the scan and return the records in scan order.
    pub fn run(&mut self) -> Result<(Vec<EventRecord>, ScanSummary), ScanError> {
        let started = Instant::now();
        let windows = scan_windows(
            self.params.start,
            self.params.end,
            self.params.min_duration,
            self.params.max_duration,
            self.params.min_step,
        );
        log::info!(
            "scanning {} windows over [{}, {}]",
            windows.len(),
            self.params.start,
            self.params.end
        );

        let bundle = self.bundle()?.clone();
        let injection = self.resolve_injection()?;
        let prior = self.resolve_prior()?;
        let schedule = OccultationSchedule::from_steps(
            self.occultations
                .occultation_steps(self.params.start, self.params.end, &bundle)
                .into_values(),
        );

        let mut records = Vec::with_capacity(windows.len());
        let mut summary = ScanSummary {
            windows: windows.len(),
            in_good_time: 0,
            valid_response: 0,
            analyzed: 0,
            elapsed: Duration::ZERO,
        };

        let progress = ProgressBar::new(windows.len() as u64);
        for window in &windows {
            let record =
                self.process_window(window, &bundle, injection.as_ref(), &prior, &schedule);
            summary.in_good_time += record.in_good_time as usize;
            summary.valid_response += record.response_valid as usize;
            summary.analyzed += record.analyzable as usize;
            records.push(record);
            progress.inc(1);
        }
        progress.finish_and_clear();

        summary.elapsed = started.elapsed();
        log::info!(
            "scan finished: {}/{} windows analyzed in {:.2} s",
            summary.analyzed,
            summary.windows,
            summary.elapsed.as_secs_f64()
        );
        Ok((records, summary))
    }

    /// Pre-flight the output path, run the scan, persist the table, and
    /// print the stdout summary.
    pub fn run_to_file(&mut self) -> Result<Utf8PathBuf, ScanError> {
        let path = self.params.output_dir.join(output_file_name(&self.params));
        preflight(&path)?;
        let (records, summary) = self.run()?;
        write_table(&path, &records)?;
        print_summary(&summary, &records);
        Ok(path)
    }

    /// One window: fit, gate, score, marginalize, assemble. Any
    /// per-window failure degrades to a zeroed record; it never aborts the
    /// scan.
    fn process_window(
        &mut self,
        window: &Window,
        bundle: &DataBundle,
        injection: Option<&InjectedRates>,
        prior: &SkyPrior,
        schedule: &OccultationSchedule,
    ) -> EventRecord {
        let transform = self.attitude.transforms(bundle, window.center);
        let (az, zen) = unit_to_azzen(&transform.geocenter);
        let tensor = self.cache.resolve(az, zen);
        let response_valid = tensor.atmospheric_valid();

        let in_good_time = bundle.in_good_time(window.start(), window.stop());
        if !in_good_time {
            return EventRecord::degraded(window.center, window.duration, false, response_valid);
        }

        let fit = match self
            .fitter
            .fit(bundle, window.center, window.duration, injection)
        {
            Ok(Some(fit)) => fit,
            Ok(None) => {
                log::debug!("window t={} unfittable, degrading", window.center);
                return EventRecord::degraded(window.center, window.duration, true, response_valid);
            }
            Err(err) => {
                log::warn!("fit failed for window t={}: {err}", window.center);
                return EventRecord::degraded(window.center, window.duration, true, response_valid);
            }
        };
        if fit.validate().is_err() {
            log::warn!("fit returned malformed arrays for t={}", window.center);
            return EventRecord::degraded(window.center, window.duration, true, response_valid);
        }

        let merged = merge_window_fit(&fit);
        let mask = FitMask::assemble(&merged.quality, schedule.overlaps(window));
        let visibility = VisibilityMask::compute(&self.grid, &transform.geocenter);
        let surfaces = evaluate(tensor, &merged, &mask, &visibility, &self.spectra);

        match marginalize(&surfaces, prior) {
            Some(marginal) => assemble(
                window,
                true,
                response_valid,
                &merged,
                &mask,
                &self.grid,
                &surfaces,
                &marginal,
                &transform,
            ),
            None => EventRecord::degraded(window.center, window.duration, true, response_valid),
        }
    }
}
