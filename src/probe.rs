//! Serpentine grid probing: dialogues with the firmware to build a
//! [`SampleGrid`], then wraps it in the interpolator strategy the caller
//! selected.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::command::{Command, GCommand};
use crate::interpolator::{Interpolator, InterpolatorType, SampleGrid};

/// Errors raised while probing or fitting a height field.
#[derive(Debug, thiserror::Error)]
pub enum LevelingError {
    #[error("probe reply did not contain a parseable Z value: {0:?}")]
    UnparseableReply(String),
    #[error("leveling aborted by user")]
    Aborted,
    #[error("transport error during probing: {0}")]
    Transport(String),
}

/// The rectangular area to probe, in work coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

/// Everything the probe driver needs from whatever owns the serial link.
/// Implemented by the controller; kept minimal so this module does not
/// depend on the controller's full surface.
pub trait ProbeLink {
    /// Sends `cmd`, blocks for the firmware's reply, and returns the lines
    /// read before the terminating `ok`.
    fn send_command(&mut self, cmd: &Command) -> Result<String, LevelingError>;

    /// Polled between cells; true once the user has requested an abort.
    fn should_abort(&self) -> bool {
        false
    }

    fn report_progress(&mut self, _cells_done: usize, _cells_total: usize) {}
}

/// Fixed feedrate for the post-probe retract. Deliberately slow and
/// independent of `travel_feed` so a freshly-touched probe doesn't get
/// yanked off the bed.
const RETRACT_FEED: f64 = 100.0;

static PROBE_REPLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"Z: *(-?\d+\.\d+)").unwrap());

/// Parses a probe reply such as `"Z:12.345\nok\n"` into its Z value.
pub fn probe_result_to_value(reply: &str) -> Result<f64, LevelingError> {
    PROBE_REPLY
        .captures(reply)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| LevelingError::UnparseableReply(reply.to_string()))
}

fn g(code: u32) -> GCommand {
    GCommand::new(code, 'E')
}

/// Runs a serpentine probe over `extent` on a `nx` by `ny` grid and returns
/// the requested interpolator strategy.
///
/// Grid ticks are generated as `i * interval` starting at zero — the
/// interpolator's own coordinate frame — and the motion commands this
/// function issues move to those same 0-based coordinates directly.
#[allow(clippy::too_many_arguments)]
pub fn perform_z_leveling(
    link: &mut impl ProbeLink,
    extent: Extent,
    nx: usize,
    ny: usize,
    start_z: f64,
    travel_feed: f64,
    z_safe: f64,
    initial_offset: f64,
    kind: InterpolatorType,
) -> Result<Interpolator, LevelingError> {
    assert!(nx >= 1 && ny >= 1);

    let x_interval = if nx > 1 {
        (extent.right - extent.left) / (nx - 1) as f64
    } else {
        extent.right - extent.left
    };
    let y_interval = if ny > 1 {
        (extent.top - extent.bottom) / (ny - 1) as f64
    } else {
        extent.top - extent.bottom
    };

    let xs: Vec<f64> = (0..nx).map(|i| i as f64 * x_interval).collect();
    let ys: Vec<f64> = (0..ny).map(|j| j as f64 * y_interval).collect();
    let mut zs = vec![0.0f64; nx * ny];

    link.send_command(&Command::G(g(90)))?;

    let mut home_z = g(28);
    home_z.set_z(0.0);
    link.send_command(&Command::G(home_z))?;

    let mut home_xy = g(0);
    home_xy.set_x(0.0).set_y(0.0).set_f(travel_feed);
    link.send_command(&Command::G(home_xy))?;

    let mut rapid_z = g(0);
    rapid_z.set_z(start_z).set_f(travel_feed);
    link.send_command(&Command::G(rapid_z))?;

    let total = nx * ny;
    let mut done = 0usize;

    for i in 0..nx {
        let y_range: Box<dyn Iterator<Item = usize>> = if i % 2 == 0 {
            Box::new(0..ny)
        } else {
            Box::new((0..ny).rev())
        };
        for j in y_range {
            if link.should_abort() {
                warn!("leveling aborted at cell ({}, {})", i, j);
                return Err(LevelingError::Aborted);
            }

            let mut move_cmd = g(0);
            move_cmd
                .set_x(xs[i])
                .set_y(ys[j])
                .set_f(travel_feed);
            link.send_command(&Command::G(move_cmd))?;

            let reply = link.send_command(&Command::G(g(30)))?;
            let z = probe_result_to_value(&reply)?;
            zs[j * nx + i] = z;
            debug!(i, j, z, "probed cell");

            let mut retract = g(0);
            retract.set_z(z + z_safe).set_f(RETRACT_FEED);
            link.send_command(&Command::G(retract))?;

            done += 1;
            link.report_progress(done, total);
        }
    }

    let mut home_z_again = g(28);
    home_z_again.set_z(0.0);
    link.send_command(&Command::G(home_z_again))?;

    let mut home_origin = g(0);
    home_origin.set_x(0.0).set_y(0.0).set_f(travel_feed);
    link.send_command(&Command::G(home_origin))?;

    info!(nx, ny, "leveling grid complete");

    let grid = SampleGrid::new(xs, ys, zs, initial_offset);
    Ok(match kind {
        InterpolatorType::Single => {
            Interpolator::Single(crate::interpolator::SingleSample::new(
                grid.z_at(0, 0),
                initial_offset,
            ))
        }
        InterpolatorType::Linear => Interpolator::Linear(grid),
        InterpolatorType::Bicubic => Interpolator::Bicubic(grid),
    })
}
