//! # Scan window generation
//!
//! The scan set is the union, over a power-of-two ladder of durations, of
//! center times stepped across the requested interval. Shorter durations are
//! scanned more densely: the center step for each duration is
//! `max(min_step, duration / 4)`, so a window always overlaps its neighbours
//! by at least three quarters.
//!
//! Durations are anchored at [`REFERENCE_DURATION`](crate::constants::REFERENCE_DURATION):
//! the requested minimum and maximum are rounded to the nearest power-of-two
//! multiple of the anchor, and never snap below it (which bounds
//! atmospheric-table cache churn for very short windows). The output is the
//! definitive scan order, sorted by center time then duration; the same
//! center time may appear once per duration.

use itertools::Itertools;

use crate::constants::{Met, Seconds, REFERENCE_DURATION};

/// One candidate (center-time, duration) interval to test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub center: Met,
    pub duration: Seconds,
}

impl Window {
    pub fn start(&self) -> Met {
        self.center - 0.5 * self.duration
    }

    pub fn stop(&self) -> Met {
        self.center + 0.5 * self.duration
    }
}

/// Power-of-two duration ladder between the rounded log2 bounds.
///
/// A `max_duration` that rounds below `min_duration` degrades to the single
/// minimum duration.
fn duration_ladder(min_duration: Seconds, max_duration: Seconds) -> Vec<Seconds> {
    let k_min = (min_duration / REFERENCE_DURATION).log2().round().max(0.0) as i32;
    let k_max = (max_duration / REFERENCE_DURATION).log2().round().max(0.0) as i32;
    (k_min..=k_max.max(k_min))
        .map(|k| REFERENCE_DURATION * f64::powi(2.0, k))
        .dedup()
        .collect()
}

/// Produce the ordered set of windows to scan.
///
/// Arguments
/// ---------
/// * `start`, `end`: scan interval (center times are generated in
///   `[start, end)`)
/// * `min_duration`, `max_duration`: requested window duration bounds
/// * `min_step`: smallest allowed center step
///
/// Return
/// ------
/// * all windows of every ladder duration, sorted by (center time, duration)
pub fn scan_windows(
    start: Met,
    end: Met,
    min_duration: Seconds,
    max_duration: Seconds,
    min_step: Seconds,
) -> Vec<Window> {
    let mut windows = Vec::new();
    for duration in duration_ladder(min_duration, max_duration) {
        let step = min_step.max(duration / 4.0);
        let mut center = start;
        while center < end {
            windows.push(Window { center, duration });
            center += step;
        }
    }
    windows.sort_by(|a, b| {
        a.center
            .total_cmp(&b.center)
            .then(a.duration.total_cmp(&b.duration))
    });
    windows
}

#[cfg(test)]
mod windows_test {
    use super::*;

    #[test]
    fn ladder_is_powers_of_two_of_the_anchor() {
        let ladder = duration_ladder(0.5, 9.0);
        assert_eq!(ladder, vec![0.512, 1.024, 2.048, 4.096, 8.192]);
        for dur in &ladder {
            let k = (dur / REFERENCE_DURATION).log2();
            assert!((k - k.round()).abs() < 1e-12);
        }
    }

    #[test]
    fn ladder_never_snaps_below_the_anchor() {
        assert_eq!(duration_ladder(0.05, 0.1), vec![REFERENCE_DURATION]);
    }

    #[test]
    fn inverted_bounds_degrade_to_one_duration() {
        assert_eq!(duration_ladder(4.0, 1.0), vec![4.096]);
    }

    #[test]
    fn windows_are_sorted_and_exclusive_of_end() {
        let windows = scan_windows(0.0, 10.0, 0.5, 2.0, 0.1);
        assert!(!windows.is_empty());
        for pair in windows.windows(2) {
            let ordered = pair[0].center < pair[1].center
                || (pair[0].center == pair[1].center && pair[0].duration <= pair[1].duration);
            assert!(ordered, "{:?} before {:?}", pair[0], pair[1]);
        }
        assert!(windows.iter().all(|w| w.center < 10.0));
    }

    #[test]
    fn short_durations_are_scanned_more_densely() {
        let windows = scan_windows(0.0, 100.0, 0.5, 8.0, 0.01);
        let count = |d: f64| windows.iter().filter(|w| w.duration == d).count();
        assert!(count(0.512) > count(8.192));
        // Step is a quarter of the duration when the minimum step allows it.
        let shortest: Vec<&Window> = windows.iter().filter(|w| w.duration == 0.512).collect();
        let step = shortest[1].center - shortest[0].center;
        assert!((step - 0.128).abs() < 1e-12);
    }

    #[test]
    fn minimum_step_bounds_the_density() {
        let windows = scan_windows(0.0, 50.0, 0.5, 0.5, 1.0);
        let first_two: Vec<&Window> = windows.iter().take(2).collect();
        assert!((first_two[1].center - first_two[0].center - 1.0).abs() < 1e-12);
    }
}
