use hifitime::{Duration, Epoch};
use std::str::FromStr;

use crate::constants::Met;
use crate::scan_errors::ScanError;

/// Mission reference epoch: mission elapsed time zero.
pub fn mission_epoch() -> Epoch {
    Epoch::from_gregorian_utc(2001, 1, 1, 0, 0, 0, 0)
}

/// Convert a mission elapsed time in seconds to an absolute epoch.
///
/// Argument
/// --------
/// * `met`: mission elapsed time in seconds
///
/// Return
/// ------
/// * the corresponding [`hifitime::Epoch`]
pub fn met_to_epoch(met: Met) -> Epoch {
    mission_epoch() + Duration::from_seconds(met)
}

/// Convert an absolute epoch to mission elapsed time in seconds.
///
/// Argument
/// --------
/// * `epoch`: an absolute [`hifitime::Epoch`]
///
/// Return
/// ------
/// * mission elapsed time in seconds (negative before the mission epoch)
pub fn epoch_to_met(epoch: Epoch) -> Met {
    (epoch - mission_epoch()).to_seconds()
}

/// Parse an absolute UTC time string in the format YYYY-MM-ddTHH:mm:ss into
/// mission elapsed time.
///
/// Argument
/// --------
/// * `utc`: an absolute time string, e.g. `"2017-08-17T12:41:04"`
///
/// Return
/// ------
/// * mission elapsed time in seconds, or [`ScanError::InvalidTimeString`]
pub fn met_from_utc(utc: &str) -> Result<Met, ScanError> {
    let epoch =
        Epoch::from_str(utc).map_err(|e| ScanError::InvalidTimeString(format!("{utc}: {e}")))?;
    Ok(epoch_to_met(epoch))
}
