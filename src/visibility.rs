//! # Geometric visibility and occultation overlap
//!
//! Two separate maskings derive from the occulting body:
//!
//! - a **sky mask**: cells within the occlusion cone around the geocenter
//!   direction are geometrically blocked and excluded from the likelihood
//!   grid for the window;
//! - a **channel filter**: while an occultation step of a strong source or
//!   the Sun overlaps the (padded) analysis interval, the lowest low-energy
//!   channels are untrustworthy. This affects specific energy channels, not
//!   specific sky directions, so it feeds the fit mask rather than the sky
//!   mask.

use nalgebra::Vector3;

use crate::constants::{occlusion_cos, Met, OCCULTATION_PAD};
use crate::sky_grid::SkyGrid;
use crate::windows::Window;

/// Per-window geometric visibility of the sky grid.
#[derive(Debug, Clone)]
pub struct VisibilityMask {
    visible: Vec<bool>,
    cells: Vec<usize>,
}

impl VisibilityMask {
    /// Mask of cells not blocked by the occulting body.
    ///
    /// A cell is visible iff the cosine of its separation from the geocenter
    /// direction does not exceed the occlusion-limit cosine.
    pub fn compute(grid: &SkyGrid, geocenter: &Vector3<f64>) -> VisibilityMask {
        let limit = occlusion_cos();
        let visible: Vec<bool> = grid.units().iter().map(|u| u.dot(geocenter) <= limit).collect();
        let cells = visible
            .iter()
            .enumerate()
            .filter_map(|(cell, &v)| v.then_some(cell))
            .collect();
        VisibilityMask { visible, cells }
    }

    pub fn is_visible(&self, cell: usize) -> bool {
        self.visible[cell]
    }

    /// Visible cell indices, ascending.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn visible_count(&self) -> usize {
        self.cells.len()
    }
}

/// Flattened, sorted occultation-step timestamps for the whole scan.
#[derive(Debug, Clone, Default)]
pub struct OccultationSchedule {
    steps: Vec<Met>,
}

impl OccultationSchedule {
    /// Flatten per-source step lists into one sorted schedule.
    pub fn from_steps<I>(per_source: I) -> OccultationSchedule
    where
        I: IntoIterator<Item = Vec<Met>>,
    {
        let mut steps: Vec<Met> = per_source.into_iter().flatten().collect();
        steps.sort_by(f64::total_cmp);
        OccultationSchedule { steps }
    }

    /// True when any step falls within the window span padded by
    /// [`OCCULTATION_PAD`](crate::constants::OCCULTATION_PAD) on each side.
    pub fn overlaps(&self, window: &Window) -> bool {
        let lo = window.start() - OCCULTATION_PAD;
        let hi = window.stop() + OCCULTATION_PAD;
        let first = self.steps.partition_point(|&t| t < lo);
        self.steps.get(first).is_some_and(|&t| t <= hi)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod visibility_test {
    use super::*;
    use crate::constants::RADEG;
    use crate::ref_frame::{angular_separation, azzen_to_unit};

    #[test]
    fn cells_near_the_geocenter_are_blocked() {
        let grid = SkyGrid::with_step(10.0).unwrap();
        let geocenter = azzen_to_unit(0.0, 150.0 * RADEG);
        let mask = VisibilityMask::compute(&grid, &geocenter);
        assert!(mask.visible_count() > 0);
        assert!(mask.visible_count() < grid.len());
        for cell in 0..grid.len() {
            let sep = angular_separation(grid.unit(cell), &geocenter);
            assert_eq!(
                mask.is_visible(cell),
                sep >= 67.0 * RADEG - 1e-12,
                "cell {cell} at separation {}",
                sep / RADEG
            );
        }
    }

    #[test]
    fn visible_cells_are_listed_in_order() {
        let grid = SkyGrid::with_step(15.0).unwrap();
        let mask = VisibilityMask::compute(&grid, &azzen_to_unit(1.0, 2.0));
        assert!(mask.cells().windows(2).all(|p| p[0] < p[1]));
        assert!(mask.cells().iter().all(|&c| mask.is_visible(c)));
    }

    #[test]
    fn overlap_uses_the_padded_span() {
        let schedule = OccultationSchedule::from_steps([vec![100.0], vec![205.0, 50.0]]);
        assert_eq!(schedule.len(), 3);
        let window = |center: f64, duration: f64| Window { center, duration };
        // Step at 100 falls inside the bare window span.
        assert!(schedule.overlaps(&window(100.3, 0.512)));
        // The pad reaches a step just outside the bare span.
        assert!(schedule.overlaps(&window(100.9, 0.512)));
        assert!(!schedule.overlaps(&window(103.0, 0.512)));
        assert!(!schedule.overlaps(&window(150.0, 8.192)));
        assert!(schedule.overlaps(&window(204.0, 1.024)));
    }

    #[test]
    fn empty_schedule_never_overlaps() {
        let schedule = OccultationSchedule::from_steps(Vec::<Vec<f64>>::new());
        assert!(!schedule.overlaps(&Window {
            center: 0.0,
            duration: 100.0
        }));
    }
}
