//! Subdivides straight and arc moves so that Z tracks the leveling
//! interpolator's surface rather than jumping once per source command.

use crate::command::GCommand;
use crate::geometry::{Point, Vector};
use crate::interpolator::Interpolator;

use super::state::RewriterState;

const MM_PER_ARC_SEGMENT: f64 = 0.5;

fn origin_or_default(state: &RewriterState) -> Point {
    state.last_leveling_point().unwrap_or(Point::new(0.0, 0.0, 0.0))
}

/// Splits a G0/G1 straight move into sub-segments no longer than
/// `min(xGridSize, yGridSize) / 3` in the XY plane, correcting Z at every
/// sub-segment from the interpolator. Intermediate segments carry only
/// X/Y/Z; the final segment carries the original command's full parameter
/// set.
pub fn segment_straight(
    cmd: &GCommand,
    state: &mut RewriterState,
    interp: &Interpolator,
    z_leveling_offset: f64,
) -> Vec<GCommand> {
    let origin = origin_or_default(state);
    let target = Point::new(
        cmd.x().unwrap_or(origin.x),
        cmd.y().unwrap_or(origin.y),
        cmd.z().unwrap_or(origin.z),
    );

    let planar = Vector::new(target.x - origin.x, target.y - origin.y, 0.0);
    let length = planar.length();
    let s_max = interp.x_grid_size().min(interp.y_grid_size()) / 3.0;

    let segments = if s_max > 0.0 && length > s_max {
        (length / s_max).ceil() as usize
    } else {
        1
    };

    let mut out = Vec::with_capacity(segments);
    for n in 1..segments {
        let t = n as f64 / segments as f64;
        let x = origin.x + (target.x - origin.x) * t;
        let y = origin.y + (target.y - origin.y) * t;
        let z_nominal = origin.z + (target.z - origin.z) * t;
        let (delta, _) = interp.interpolate(x, y);
        let mut seg = GCommand::new(cmd.code, cmd.fourth_letter);
        seg.set_point(x, y, z_nominal + delta - z_leveling_offset);
        out.push(seg);
    }

    let (delta_final, _) = interp.interpolate(target.x, target.y);
    let mut last = cmd.clone();
    last.set_point(target.x, target.y, target.z + delta_final - z_leveling_offset);
    out.push(last);

    state.set_last_leveling_point(target);
    out
}

/// Splits a G2 (clockwise) / G3 (counter-clockwise) arc move into chord
/// segments of roughly [`MM_PER_ARC_SEGMENT`] length, correcting Z at each.
/// The original feedrate, if any, is carried only on the first generated
/// segment; the final segment carries the original command's full
/// parameter set (minus the I/J center offsets, which a G1 has no use for).
pub fn segment_arc(
    cmd: &GCommand,
    state: &mut RewriterState,
    interp: &Interpolator,
    z_leveling_offset: f64,
) -> Vec<GCommand> {
    let origin = origin_or_default(state);
    let i = cmd.param('I').unwrap_or(0.0);
    let j = cmd.param('J').unwrap_or(0.0);
    let target = Point::new(
        cmd.x().unwrap_or(origin.x),
        cmd.y().unwrap_or(origin.y),
        cmd.z().unwrap_or(origin.z),
    );

    let radius = (i * i + j * j).sqrt();
    let center = Point::new(origin.x + i, origin.y + j, origin.z);

    let rx0 = origin.x - center.x;
    let ry0 = origin.y - center.y;
    let rtx = target.x - center.x;
    let rty = target.y - center.y;

    let cross = rx0 * rty - ry0 * rtx;
    let dot = rx0 * rtx + ry0 * rty;
    let mut angular_travel = cross.atan2(dot);
    if angular_travel < 0.0 {
        angular_travel += 2.0 * std::f64::consts::PI;
    }
    let clockwise = cmd.code == 2;
    if clockwise {
        angular_travel -= 2.0 * std::f64::consts::PI;
    }

    let delta_z = target.z - origin.z;
    let millimeters_of_travel = (angular_travel.abs() * radius).hypot(delta_z.abs());
    let segments = ((millimeters_of_travel / MM_PER_ARC_SEGMENT).floor() as i64).max(1) as usize;

    let mut out = Vec::with_capacity(segments);
    for n in 1..segments {
        let frac = n as f64 / segments as f64;
        let theta = angular_travel * frac;
        let x = center.x + rx0 * theta.cos() - ry0 * theta.sin();
        let y = center.y + rx0 * theta.sin() + ry0 * theta.cos();
        let z_nominal = origin.z + delta_z * frac;
        let (delta, _) = interp.interpolate(x, y);
        let mut seg = GCommand::new(1, cmd.fourth_letter);
        seg.set_point(x, y, z_nominal + delta - z_leveling_offset);
        if n == 1 {
            if let Some(f) = cmd.f() {
                seg.set_f(f);
            }
        }
        out.push(seg);
    }

    let mut last = GCommand::new(1, cmd.fourth_letter);
    for (letter, value) in cmd.iter_params() {
        if matches!(letter, 'X' | 'Y' | 'Z' | 'I' | 'J') {
            continue;
        }
        last.set_param(letter, value);
    }
    let (delta_final, _) = interp.interpolate(target.x, target.y);
    last.set_point(target.x, target.y, target.z + delta_final - z_leveling_offset);
    out.push(last);

    state.set_last_leveling_point(target);
    out
}
