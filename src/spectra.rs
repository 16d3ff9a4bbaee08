//! # Candidate emission spectra
//!
//! The scan marginalizes over a small fixed set of candidate photon spectra.
//! Each spectrum carries a **reference sensitivity**: the amplitude scale at
//! which the instrument response tables for that spectrum were computed. The
//! likelihood engine uses it to set the width of the amplitude prior, so a
//! spectrally hard template with strong coupling to the detectors is not
//! penalized the same way as a soft one.

use crate::scan_errors::ScanError;

/// One candidate emission model.
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Short label used in configuration and injection descriptors.
    pub label: String,
    /// Amplitude scale associated with the response tables for this model.
    pub reference_sensitivity: f64,
}

/// Fixed ordered list of candidate emission models; immutable for the run.
#[derive(Debug, Clone)]
pub struct SpectrumSet {
    spectra: Vec<Spectrum>,
}

impl SpectrumSet {
    /// The standard three-template set: hard, normal, and soft.
    pub fn standard() -> SpectrumSet {
        SpectrumSet {
            spectra: vec![
                Spectrum {
                    label: "hard".into(),
                    reference_sensitivity: 1.0,
                },
                Spectrum {
                    label: "normal".into(),
                    reference_sensitivity: 1.5,
                },
                Spectrum {
                    label: "soft".into(),
                    reference_sensitivity: 2.5,
                },
            ],
        }
    }

    /// Build a set from explicit templates (mainly for tests and
    /// mission-specific table sets).
    pub fn from_spectra(spectra: Vec<Spectrum>) -> SpectrumSet {
        SpectrumSet { spectra }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn get(&self, index: usize) -> &Spectrum {
        &self.spectra[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Spectrum> {
        self.spectra.iter()
    }

    /// Index of the spectrum with the given label.
    pub fn index_of(&self, label: &str) -> Result<usize, ScanError> {
        self.spectra
            .iter()
            .position(|s| s.label == label)
            .ok_or_else(|| ScanError::UnknownSpectrumLabel(label.to_string()))
    }
}

#[cfg(test)]
mod spectra_test {
    use super::*;

    #[test]
    fn standard_set_resolves_labels() {
        let set = SpectrumSet::standard();
        assert_eq!(set.len(), 3);
        assert_eq!(set.index_of("normal").unwrap(), 1);
        assert!(set.index_of("blackbody").is_err());
    }

    #[test]
    fn soft_template_has_widest_sensitivity_scale() {
        let set = SpectrumSet::standard();
        let soft = set.get(set.index_of("soft").unwrap());
        assert!(soft.reference_sensitivity > set.get(0).reference_sensitivity);
    }
}
