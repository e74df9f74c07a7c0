//! End-to-end exercise of bed-leveling and modal-rewrite behavior, driven
//! through the crate's public API rather than module-internal unit tests.

use levelctl::command::{parse_g, GCommand};
use levelctl::config::ControlParameters;
use levelctl::interpolator::{Interpolator, InterpolatorType, SampleGrid};
use levelctl::probe::{probe_result_to_value, LevelingError};
use levelctl::rewriter::state::RewriterState;

fn bilinear_grid() -> Interpolator {
    let xs = vec![0.0, 10.0, 20.0];
    let ys = vec![0.0, 10.0];
    let zs = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    Interpolator::Linear(SampleGrid::new(xs, ys, zs, 0.0))
}

#[test]
fn bilinear_midpoint_exact_and_clamped() {
    let grid = bilinear_grid();
    let (mid, _) = grid.interpolate(5.0, 5.0);
    assert!((mid - 0.5).abs() < 1e-9);

    let (corner, exact) = grid.interpolate(20.0, 10.0);
    assert!((corner - 1.0).abs() < 1e-9);
    assert!(exact);

    let (clamped, _) = grid.interpolate(-5.0, 5.0);
    assert!((clamped - 0.5).abs() < 1e-9);
}

#[test]
fn long_straight_move_segments_into_twelve_pieces() {
    use levelctl::rewriter::segment::segment_straight;

    let xs = vec![0.0, 25.0, 50.0, 75.0, 100.0];
    let ys = xs.clone();
    let grid = Interpolator::Bicubic(SampleGrid::new(xs, ys, vec![0.0; 25], 0.0));

    let mut state = RewriterState::new();
    let mut cmd = GCommand::new(1, 'E');
    cmd.set_x(100.0).set_f(200.0);

    let segments = segment_straight(&cmd, &mut state, &grid, 0.0);
    assert_eq!(segments.len(), 12);

    let last = segments.last().unwrap();
    assert_eq!(last.x(), Some(100.0));
    assert_eq!(last.y(), Some(0.0));
    assert_eq!(last.f(), Some(200.0));
}

#[test]
fn bare_xy_after_g1_inherits_code_but_not_a_stale_feed() {
    use levelctl::rewriter::modal::make_marlin_friendly;

    let mut state = RewriterState::new();
    let config = ControlParameters::default();

    let first = make_marlin_friendly("G1 X0 Y0 F150", &mut state, 'E', config.g0_feed)
        .unwrap()
        .unwrap();
    assert_eq!(first.to_string(), "G1 X0 Y0 F150");

    let second = make_marlin_friendly("X10 Y10", &mut state, 'E', config.g0_feed)
        .unwrap()
        .unwrap();
    assert_eq!(second.to_string(), "G1 X10 Y10");
}

#[test]
fn bare_feed_expands_to_g1_and_is_not_restamped_onto_an_unrelated_move() {
    use levelctl::rewriter::modal::make_marlin_friendly;

    let mut state = RewriterState::new();
    let config = ControlParameters::default();

    let first = make_marlin_friendly("F500", &mut state, 'E', config.g0_feed)
        .unwrap()
        .unwrap();
    assert_eq!(first.to_string(), "G1 F500");
    assert_eq!(state.last_explicit_feed(), Some(500.0));

    let second = make_marlin_friendly("G1 X5", &mut state, 'E', config.g0_feed)
        .unwrap()
        .unwrap();
    assert_eq!(second.to_string(), "G1 X5");
}

#[test]
fn probe_reply_parsing() {
    assert_eq!(probe_result_to_value("Z:12.345\nok\n").unwrap(), 12.345);
    assert!(matches!(
        probe_result_to_value("ok\n"),
        Err(LevelingError::UnparseableReply(_))
    ));
}

#[test]
fn cancellation_is_observed_through_the_probe_link_trait() {
    use levelctl::probe::{perform_z_leveling, Extent, ProbeLink};
    use levelctl::command::Command;

    struct AbortingLink;
    impl ProbeLink for AbortingLink {
        fn send_command(&mut self, _cmd: &Command) -> Result<String, LevelingError> {
            Ok("ok\n".to_string())
        }
        fn should_abort(&self) -> bool {
            true
        }
    }

    let mut link = AbortingLink;
    let extent = Extent {
        left: 0.0,
        right: 50.0,
        top: 50.0,
        bottom: 0.0,
    };
    let result = perform_z_leveling(
        &mut link,
        extent,
        5,
        5,
        5.0,
        1000.0,
        2.0,
        0.0,
        InterpolatorType::Linear,
    );
    assert!(matches!(result, Err(LevelingError::Aborted)));
}

#[test]
fn round_trip_canonical_serialization() {
    let cmd = parse_g(1, "X10 Y20 F300", 'E');
    let rendered = cmd.to_string();
    let reparsed = parse_g(1, rendered.trim_start_matches("G1"), 'E');
    assert_eq!(reparsed.to_string(), rendered);
}
