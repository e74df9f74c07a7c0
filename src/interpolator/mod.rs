//! The height-field model built from a probed sample grid.
//!
//! Three strategies share one [`SampleGrid`]: [`InterpolatorKind::Single`]
//! (a lone touch-off sample), [`InterpolatorKind::Linear`] (bilinear) and
//! [`InterpolatorKind::Bicubic`] (Catmull-Rom). They are modeled as one enum
//! over a shared grid rather than as trait objects, since the set of
//! strategies is closed and known at compile time.

mod bicubic;
mod grid;
mod linear;
mod single;

pub use grid::SampleGrid;
pub use single::SingleSample;

/// Identifies which interpolation strategy a grid-backed interpolator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolatorType {
    Single,
    Linear,
    Bicubic,
}

/// A constructed height-field model, ready to answer `interpolate` queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolator {
    Single(SingleSample),
    Linear(SampleGrid),
    Bicubic(SampleGrid),
}

impl Interpolator {
    pub fn type_tag(&self) -> InterpolatorType {
        match self {
            Interpolator::Single(_) => InterpolatorType::Single,
            Interpolator::Linear(_) => InterpolatorType::Linear,
            Interpolator::Bicubic(_) => InterpolatorType::Bicubic,
        }
    }

    /// Interpolates `(x, y)`, returning `(z, exact_match)`.
    pub fn interpolate(&self, x: f64, y: f64) -> (f64, bool) {
        match self {
            Interpolator::Single(s) => (s.z(), true),
            Interpolator::Linear(g) => linear::interpolate(g, x, y),
            Interpolator::Bicubic(g) => bicubic::interpolate(g, x, y),
        }
    }

    pub fn zmin(&self) -> f64 {
        match self {
            Interpolator::Single(s) => s.z(),
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => g.zmin(),
        }
    }

    pub fn zmax(&self) -> f64 {
        match self {
            Interpolator::Single(s) => s.z(),
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => g.zmax(),
        }
    }

    /// Arithmetic mean over all samples. Named `mean`, not `median`, to
    /// describe what it actually computes.
    pub fn mean(&self) -> f64 {
        match self {
            Interpolator::Single(s) => s.z(),
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => g.mean(),
        }
    }

    pub fn calculate_offset(&self, new_z: f64) -> f64 {
        match self {
            Interpolator::Single(s) => s.calculate_offset(new_z),
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => g.calculate_offset(new_z),
        }
    }

    /// Spacing of the first grid cell on the X axis. `0.0` for `Single`,
    /// which has no grid.
    pub fn x_grid_size(&self) -> f64 {
        match self {
            Interpolator::Single(_) => 0.0,
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => g.x_grid_size(),
        }
    }

    /// Spacing of the first grid cell on the Y axis. `0.0` for `Single`,
    /// which has no grid.
    pub fn y_grid_size(&self) -> f64 {
        match self {
            Interpolator::Single(_) => 0.0,
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => g.y_grid_size(),
        }
    }

    pub fn grid(&self) -> Option<&SampleGrid> {
        match self {
            Interpolator::Single(_) => None,
            Interpolator::Linear(g) | Interpolator::Bicubic(g) => Some(g),
        }
    }

    /// Converts any grid-backed interpolator to LINEAR over the same grid.
    /// Single-sample interpolators cannot be converted.
    pub fn to_linear(&self) -> Option<Interpolator> {
        self.grid().cloned().map(Interpolator::Linear)
    }

    /// Converts any grid-backed interpolator to BICUBIC over the same grid.
    /// Requires at least 2 ticks on each axis; single-sample interpolators
    /// cannot be converted.
    pub fn to_bicubic(&self) -> Option<Interpolator> {
        let g = self.grid()?;
        if g.nx() < 2 || g.ny() < 2 {
            return None;
        }
        Some(Interpolator::Bicubic(g.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SampleGrid {
        SampleGrid::new(
            vec![0.0, 10.0, 20.0],
            vec![0.0, 10.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            0.0,
        )
    }

    #[test]
    fn linear_exact_match() {
        let interp = Interpolator::Linear(grid());
        let (z, exact) = interp.interpolate(0.0, 0.0);
        assert!(exact);
        assert_eq!(z, 0.0);
    }

    #[test]
    fn single_always_exact() {
        let interp = Interpolator::Single(SingleSample::new(3.0, 0.0));
        assert_eq!(interp.interpolate(123.0, -45.0), (3.0, true));
    }

    #[test]
    fn cross_construct_linear_to_bicubic() {
        let interp = Interpolator::Linear(grid());
        let bicubic = interp.to_bicubic().expect("convertible");
        assert_eq!(bicubic.type_tag(), InterpolatorType::Bicubic);
    }

    #[test]
    fn single_grid_sizes_are_zero_not_a_panic() {
        let interp = Interpolator::Single(SingleSample::new(3.0, 0.0));
        assert_eq!(interp.x_grid_size(), 0.0);
        assert_eq!(interp.y_grid_size(), 0.0);
    }

    #[test]
    fn single_is_not_convertible() {
        let interp = Interpolator::Single(SingleSample::new(3.0, 0.0));
        assert!(interp.to_linear().is_none());
        assert!(interp.to_bicubic().is_none());
    }

    #[test]
    fn grid_extrema_preserved_across_conversion() {
        let interp = Interpolator::Linear(grid());
        let bicubic = interp.to_bicubic().unwrap();
        assert_eq!(interp.zmin(), bicubic.zmin());
        assert_eq!(interp.zmax(), bicubic.zmax());
    }
}
