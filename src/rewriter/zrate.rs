//! Z-rate limiting: caps how fast Z may move, splitting a combined XYZ move
//! into a Z-only line at the capped rate and a following XY line at a
//! separate restored rate when necessary.

use crate::command::GCommand;

use super::state::RewriterState;

/// Applies the Z-rate-limit policy to one already-expanded motion command.
///
/// Returns one line when the command has no Z component, is Z-only, or
/// already carries a feed at or below `z_rate_limit_amount`; returns two
/// lines (Z-only, then XY) when a combined XYZ move would otherwise exceed
/// the cap. The two-line case restores `xy_rate_amount` inline on the XY
/// line. A capped Z-only single line instead leaves a carry flag behind, so
/// that the next XY-only line with no explicit feed of its own picks up
/// `xy_rate_amount` in its place.
pub fn apply(
    cmd: &GCommand,
    state: &mut RewriterState,
    z_rate_limit_amount: f64,
    xy_rate_amount: f64,
) -> Vec<GCommand> {
    if cmd.z().is_none() {
        return apply_carry(cmd, state, xy_rate_amount);
    }

    let has_xy = cmd.x().is_some() || cmd.y().is_some();
    let feed = cmd.f();
    let in_limit = feed.map(|f| f > z_rate_limit_amount).unwrap_or(false);
    let within_budget_already = cmd.code != 0 && feed.is_some() && !in_limit;

    if !has_xy || within_budget_already {
        let mut out = cmd.clone();
        if out.code == 0 {
            out.code = 1;
        }
        let capped = in_limit || feed.is_none();
        if capped {
            out.set_f(z_rate_limit_amount);
        }
        if !has_xy && capped {
            state.set_xy_rate_carry(true);
        }
        return vec![out];
    }

    let mut z_line = GCommand::new(1, cmd.fourth_letter);
    z_line.set_z(cmd.z().unwrap());
    let capped_feed = feed.filter(|&f| f <= z_rate_limit_amount).unwrap_or(z_rate_limit_amount);
    z_line.set_f(capped_feed);

    let mut xy_line = GCommand::new(cmd.code, cmd.fourth_letter);
    if let Some(x) = cmd.x() {
        xy_line.set_x(x);
    }
    if let Some(y) = cmd.y() {
        xy_line.set_y(y);
    }
    xy_line.set_f(xy_rate_amount);

    vec![z_line, xy_line]
}

/// Handles a Z-free command that follows an immediately-prior split: an
/// XY move with no feed of its own inherits `xy_rate_amount`.
fn apply_carry(cmd: &GCommand, state: &mut RewriterState, xy_rate_amount: f64) -> Vec<GCommand> {
    if !state.xy_rate_carry() {
        return vec![cmd.clone()];
    }
    let has_xy = cmd.x().is_some() || cmd.y().is_some();
    if cmd.code != 0 && has_xy {
        state.set_xy_rate_carry(false);
        if cmd.f().is_none() {
            let mut out = cmd.clone();
            out.set_f(xy_rate_amount);
            return vec![out];
        }
    }
    vec![cmd.clone()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_only_move_gets_capped_feed_and_leaves_a_carry_for_the_next_xy_move() {
        let mut state = RewriterState::new();
        let mut cmd = GCommand::new(1, 'E');
        cmd.set_z(5.0).set_f(500.0);
        let out = apply(&cmd, &mut state, 100.0, 2000.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].f(), Some(100.0));
        assert!(state.xy_rate_carry());
    }

    #[test]
    fn feed_already_in_budget_passes_through_unsplit_with_no_carry() {
        let mut state = RewriterState::new();
        let mut cmd = GCommand::new(1, 'E');
        cmd.set_x(10.0).set_y(10.0).set_z(1.0).set_f(50.0);
        let out = apply(&cmd, &mut state, 100.0, 2000.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].f(), Some(50.0));
        assert!(!state.xy_rate_carry());
    }

    #[test]
    fn combined_xyz_over_budget_splits_in_two_and_restores_inline() {
        let mut state = RewriterState::new();
        let mut cmd = GCommand::new(1, 'E');
        cmd.set_x(10.0).set_y(10.0).set_z(1.0).set_f(500.0);
        let out = apply(&cmd, &mut state, 100.0, 2000.0);
        assert_eq!(out.len(), 2);
        assert!(out[0].z().is_some() && out[0].x().is_none());
        assert_eq!(out[0].f(), Some(100.0));
        assert_eq!(out[1].x(), Some(10.0));
        assert_eq!(out[1].f(), Some(2000.0));
        assert!(!state.xy_rate_carry());
    }

    #[test]
    fn g0_combined_move_is_forced_to_split_even_with_feed() {
        let mut state = RewriterState::new();
        let mut cmd = GCommand::new(0, 'E');
        cmd.set_x(10.0).set_z(1.0).set_f(50.0);
        let out = apply(&cmd, &mut state, 100.0, 2000.0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn xy_carry_applies_restored_feed_once() {
        let mut state = RewriterState::new();
        state.set_xy_rate_carry(true);
        let mut cmd = GCommand::new(1, 'E');
        cmd.set_x(5.0).set_y(5.0);
        let out = apply(&cmd, &mut state, 100.0, 2000.0);
        assert_eq!(out[0].f(), Some(2000.0));
        assert!(!state.xy_rate_carry());
    }
}
