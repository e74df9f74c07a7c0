//! The machine/work coordinate snapshot Marlin's position reports update.
//!
//! Marlin has no separate work-offset report, so `machine` and `work` are
//! always updated together from the same `M114` reply.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::geometry::Point;

/// A position snapshot. `machine` and `work` are identical in the Marlin
/// path covered here; the pair exists because a future Grbl-style firmware
/// path could report them independently.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CoordinatePair {
    pub machine: Point,
    pub work: Point,
}

impl CoordinatePair {
    pub fn from_point(p: Point) -> Self {
        Self { machine: p, work: p }
    }
}

static POSITION_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"X:\s*(-?\d+\.?\d*)\s*Y:\s*(-?\d+\.?\d*)\s*Z:\s*(-?\d+\.?\d*)").unwrap()
});

/// Parses an `M114` reply such as `"X:10.00 Y:0.00 Z:5.00 E:0.00"` into a
/// point. Returns `None` if the line does not contain all three axes.
pub fn parse_position_reply(line: &str) -> Option<Point> {
    let caps = POSITION_REPLY.captures(line)?;
    let x: f64 = caps[1].parse().ok()?;
    let y: f64 = caps[2].parse().ok()?;
    let z: f64 = caps[3].parse().ok()?;
    Some(Point::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_marlin_position_reply() {
        let p = parse_position_reply("X:10.00 Y:20.00 Z:5.00 E:0.00 Count X:800 Y:1600 Z:2000")
            .unwrap();
        assert_eq!(p, Point::new(10.0, 20.0, 5.0));
    }

    #[test]
    fn parses_tightly_packed_reply() {
        let p = parse_position_reply("X:1Y:2Z:3").unwrap();
        assert_eq!(p, Point::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn rejects_line_missing_an_axis() {
        assert!(parse_position_reply("X:10.00 Y:20.00").is_none());
    }

    #[test]
    fn coordinate_pair_from_point_mirrors_both_fields() {
        let pair = CoordinatePair::from_point(Point::new(1.0, 2.0, 3.0));
        assert_eq!(pair.machine, pair.work);
    }
}
