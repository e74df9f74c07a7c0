/// A rectangular grid of probed heights, immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Row-major: `zs[j * nx + i]` is the sample at `(xs[i], ys[j])`.
    zs: Vec<f64>,
    zmin: f64,
    zmax: f64,
    mean: f64,
    initial_offset: f64,
}

impl SampleGrid {
    /// Builds a grid from raw axis ticks and row-major samples.
    ///
    /// `xs` and `ys` must be strictly increasing and `zs.len()` must equal
    /// `xs.len() * ys.len()`.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, zs: Vec<f64>, initial_offset: f64) -> Self {
        assert_eq!(zs.len(), xs.len() * ys.len());
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        assert!(ys.windows(2).all(|w| w[0] < w[1]));
        let zmin = zs.iter().cloned().fold(f64::INFINITY, f64::min);
        let zmax = zs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = zs.iter().sum::<f64>() / zs.len() as f64;
        Self {
            xs,
            ys,
            zs,
            zmin,
            zmax,
            mean,
            initial_offset,
        }
    }

    pub fn nx(&self) -> usize {
        self.xs.len()
    }
    pub fn ny(&self) -> usize {
        self.ys.len()
    }
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }
    pub fn zs(&self) -> &[f64] {
        &self.zs
    }
    pub fn z_at(&self, i: usize, j: usize) -> f64 {
        self.zs[j * self.nx() + i]
    }
    pub fn zmin(&self) -> f64 {
        self.zmin
    }
    pub fn zmax(&self) -> f64 {
        self.zmax
    }
    pub fn mean(&self) -> f64 {
        self.mean
    }
    pub fn initial_offset(&self) -> f64 {
        self.initial_offset
    }

    /// Spacing of the first grid cell on each axis; used to size segmenter
    /// sub-steps. Requires at least two ticks per axis.
    pub fn x_grid_size(&self) -> f64 {
        self.xs[1] - self.xs[0]
    }
    pub fn y_grid_size(&self) -> f64 {
        self.ys[1] - self.ys[0]
    }

    /// `new_z - zs[0] + initial_offset`, inverted: the offset that would
    /// make the origin sample read as `new_z`.
    pub fn calculate_offset(&self, new_z: f64) -> f64 {
        self.zs[0] - new_z + self.initial_offset
    }
}

/// Locates the bracketing ticks for a 1-D query, with edge clamping.
///
/// Returns `(indices, exact)`. `indices` has one entry for an exact match
/// or a clamp, two entries `[a, b]` for bilinear search, or four entries
/// `[a, b, c, d]` for cubic search (with edge duplication) depending on
/// `cubic`.
pub fn find_coefficients(values: &[f64], x: f64, cubic: bool) -> (Vec<usize>, bool) {
    let n = values.len();
    if x < values[0] {
        return (vec![0], true);
    }
    if x > values[n - 1] {
        return (vec![n - 1], true);
    }
    for j in 0..n {
        if (values[j] - x).abs() < f64::EPSILON {
            return (vec![j], true);
        }
        if j + 1 < n && x > values[j] && x < values[j + 1] {
            if !cubic {
                return (vec![j, j + 1], false);
            }
            return if j == 0 {
                (vec![0, j, j + 1, (j + 2).min(n - 1)], false)
            } else if j == n - 2 {
                (vec![j - 1, j, j + 1, j + 1], false)
            } else {
                (vec![j - 1, j, j + 1, j + 2], false)
            };
        }
    }
    unreachable!("x is within [values[0], values[n-1]] but no bracket found")
}

pub fn normalize_value(min: f64, max: f64, value: f64) -> f64 {
    (value - min) / (max - min)
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
    fn extrema_and_mean() {
        let g = grid();
        assert_eq!(g.zmin(), 0.0);
        assert_eq!(g.zmax(), 1.0);
        assert!((g.mean() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn grid_sizes() {
        let g = grid();
        assert_eq!(g.x_grid_size(), 10.0);
        assert_eq!(g.y_grid_size(), 10.0);
    }

    #[test]
    fn clamped_lookup_below_range() {
        let (idx, exact) = find_coefficients(&[0.0, 10.0, 20.0], -5.0, false);
        assert!(exact);
        assert_eq!(idx, vec![0]);
    }

    #[test]
    fn clamped_lookup_above_range() {
        let (idx, exact) = find_coefficients(&[0.0, 10.0, 20.0], 25.0, false);
        assert!(exact);
        assert_eq!(idx, vec![2]);
    }

    #[test]
    fn exact_tick_match() {
        let (idx, exact) = find_coefficients(&[0.0, 10.0, 20.0], 10.0, false);
        assert!(exact);
        assert_eq!(idx, vec![1]);
    }

    #[test]
    fn bilinear_bracket() {
        let (idx, exact) = find_coefficients(&[0.0, 10.0, 20.0], 5.0, false);
        assert!(!exact);
        assert_eq!(idx, vec![0, 1]);
    }

    #[test]
    fn cubic_bracket_edge_duplicates_left() {
        let (idx, exact) = find_coefficients(&[0.0, 10.0, 20.0, 30.0], 5.0, true);
        assert!(!exact);
        assert_eq!(idx, vec![0, 0, 1, 2]);
    }

    #[test]
    fn cubic_bracket_edge_duplicates_right() {
        let (idx, exact) = find_coefficients(&[0.0, 10.0, 20.0, 30.0], 25.0, true);
        assert!(!exact);
        assert_eq!(idx, vec![1, 2, 3, 3]);
    }
}
