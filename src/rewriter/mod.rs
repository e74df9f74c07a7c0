//! The streaming pipeline (§4.E): reads a program file one line at a time,
//! filters and normalizes it, expands Marlin's lack of modal state, applies
//! leveling segmentation when an interpolator is active, optionally trims
//! precision and caps the Z feed rate, then dispatches the result.
//!
//! Everything here is pure/testable against a [`Dispatcher`] mock; the
//! concrete transport lives in `crate::controller`.

pub mod filter;
pub mod modal;
pub mod precision;
pub mod segment;
pub mod state;
pub mod zrate;

pub use state::RewriterState;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::command::{Command, GCommand, ParseError};
use crate::config::ControlParameters;
use crate::interpolator::Interpolator;

/// Errors raised opening or reading the program file. Per-line command
/// errors (`CommandParseError`, `FilterDrop`) are not part of this type —
/// they are logged and the stream continues, per §7.
#[derive(Debug, thiserror::Error)]
pub enum RewriterError {
    #[error("I/O error reading program file: {0}")]
    Io(#[from] std::io::Error),
}

/// What the rewriter needs from whatever will actually put a line on the
/// wire and wait for the firmware's reply. Implemented by the controller;
/// kept minimal so this module stays decoupled from the controller's full
/// surface, mirroring `probe::ProbeLink`.
pub trait Dispatcher {
    type Error: std::fmt::Display;

    /// Sends one already-formatted line and blocks for the firmware's `ok`.
    fn dispatch(&mut self, line: &str) -> Result<(), Self::Error>;

    /// Polled before each source line and after each dispatched sub-command;
    /// true once the user has requested an abort.
    fn should_abort(&self) -> bool {
        false
    }

    fn report_progress(&mut self, _lines_done: usize, _lines_total: usize) {}

    /// Called for every emitted G0/G1/G2/G3, before serialization, so the
    /// caller can update its own coordinate snapshot (§4.E stage 9). This
    /// substitutes for Marlin's lack of an asynchronous position report.
    fn track_position(&mut self, _cmd: &GCommand) {}
}

/// Outcome of a [`send_file`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    Aborted,
}

/// Runs `path` through the full streaming pipeline, dispatching each
/// resulting line through `dispatcher` and awaiting it before reading the
/// next source line.
pub fn send_file<D: Dispatcher>(
    path: &Path,
    dispatcher: &mut D,
    config: &ControlParameters,
    fourth_letter: char,
    interpolator: Option<&Interpolator>,
) -> Result<SendOutcome, RewriterError> {
    let total = BufReader::new(File::open(path)?).lines().count();
    let reader = BufReader::new(File::open(path)?);

    let mut state = RewriterState::new();
    let mut done = 0usize;

    for line in reader.lines() {
        let raw = line?;
        done += 1;
        dispatcher.report_progress(done, total);

        if dispatcher.should_abort() {
            return Ok(SendOutcome::Aborted);
        }

        let Some(commands) =
            process_line(&raw, &mut state, config, fourth_letter, interpolator)
        else {
            continue;
        };

        for cmd in commands {
            if let Command::G(g) = &cmd {
                dispatcher.track_position(g);
            }

            let line = cmd.to_string();
            if let Err(e) = dispatcher.dispatch(&line) {
                warn!(error = %e, line = %line, "dispatch failed, continuing stream");
            }

            if dispatcher.should_abort() {
                return Ok(SendOutcome::Aborted);
            }
        }
    }

    Ok(SendOutcome::Completed)
}

/// Runs one source line through stages 2-8 of the pipeline, returning the
/// commands to dispatch (`None`/empty if the line was dropped or blank).
fn process_line(
    raw: &str,
    state: &mut RewriterState,
    config: &ControlParameters,
    fourth_letter: char,
    interpolator: Option<&Interpolator>,
) -> Option<Vec<Command>> {
    let stripped = filter::strip_comment(raw);
    let normalized = if config.filter_file_commands {
        filter::strip_line_numbers(&filter::normalize_spacing(stripped))
    } else {
        stripped.trim().to_string()
    };

    if normalized.is_empty() {
        return None;
    }

    let cmd = match modal::make_marlin_friendly(&normalized, state, fourth_letter, config.g0_feed) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => return None,
        Err(ParseError::BadLine(line)) => {
            warn!(line = %line, "dropping malformed command line");
            return None;
        }
        Err(ParseError::BadCode) => {
            warn!(line = %raw, "dropping command line with unparseable code");
            return None;
        }
    };

    let gcmd = match cmd {
        Command::M(m) => {
            if config.filter_file_commands && !filter::is_m_code_allowed(m.code) {
                warn!(code = m.code, "dropping unsupported M-code");
                return None;
            }
            return Some(vec![Command::M(m)]);
        }
        Command::G(g) => {
            if config.filter_file_commands && !filter::is_g_code_allowed(g.code) {
                warn!(code = g.code, "dropping unsupported G-code");
                return None;
            }
            g
        }
    };

    let mut expanded = if config.use_z_leveling_data && matches!(gcmd.code, 0 | 1 | 2 | 3) {
        match interpolator {
            Some(interp) if gcmd.code >= 2 && (gcmd.param('I').is_some() || gcmd.param('J').is_some()) => {
                segment::segment_arc(&gcmd, state, interp, config.z_leveling_offset)
            }
            Some(interp) => segment::segment_straight(&gcmd, state, interp, config.z_leveling_offset),
            None => vec![gcmd],
        }
    } else {
        vec![gcmd]
    };

    if config.reduce_precision {
        expanded = expanded
            .into_iter()
            .map(|c| {
                let (reduced, insufficient) =
                    precision::reduce_precision_command(&c, config.grbl_line_buffer_len);
                if insufficient {
                    warn!(line = %reduced, "precision reduction could not reach target buffer length");
                }
                reduced
            })
            .collect();
    }

    if config.z_rate_limit {
        expanded = expanded
            .into_iter()
            .flat_map(|c| zrate::apply(&c, state, config.z_rate_limit_amount, config.xy_rate_amount))
            .collect();
    }

    Some(expanded.into_iter().map(Command::G).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolator::SampleGrid;
    use std::cell::RefCell;
    use std::io::Write;

    struct RecordingDispatcher {
        lines: RefCell<Vec<String>>,
    }

    impl Dispatcher for RecordingDispatcher {
        type Error = std::convert::Infallible;
        fn dispatch(&mut self, line: &str) -> Result<(), Self::Error> {
            self.lines.borrow_mut().push(line.to_string());
            Ok(())
        }
    }

    #[test]
    fn comment_only_line_is_dropped() {
        let mut state = RewriterState::new();
        let config = ControlParameters::default();
        let out = process_line("; just a comment", &mut state, &config, 'E', None);
        assert!(out.is_none());
    }

    #[test]
    fn unsupported_g_code_is_dropped() {
        let mut state = RewriterState::new();
        let mut config = ControlParameters::default();
        config.filter_file_commands = true;
        let out = process_line("G17", &mut state, &config, 'E', None);
        assert!(out.is_none());
    }

    #[test]
    fn bare_feed_is_expanded_and_recorded() {
        let mut state = RewriterState::new();
        let config = ControlParameters::default();
        let first = process_line("F500", &mut state, &config, 'E', None).unwrap();
        assert_eq!(first[0].to_string(), "G1 F500");
        assert_eq!(state.last_explicit_feed(), Some(500.0));
    }

    #[test]
    fn g0_then_g1_restores_the_feed_g0_overrode() {
        let mut state = RewriterState::new();
        let config = ControlParameters::default();
        let rapid = process_line("G1 F150", &mut state, &config, 'E', None).unwrap();
        assert_eq!(rapid[0].to_string(), "G1 F150");
        let g0 = process_line("G0 X5", &mut state, &config, 'E', None).unwrap();
        assert_eq!(g0[0].to_string(), "G0 X5 F300");
        let g1 = process_line("G1 X10", &mut state, &config, 'E', None).unwrap();
        assert_eq!(g1[0].to_string(), "G1 X10 F150");
    }

    #[test]
    fn leveling_segments_a_long_straight_move() {
        let mut state = RewriterState::new();
        let mut config = ControlParameters::default();
        config.use_z_leveling_data = true;
        let xs = vec![0.0, 25.0, 50.0, 75.0, 100.0];
        let ys = xs.clone();
        let grid = Interpolator::Bicubic(SampleGrid::new(xs, ys, vec![0.0; 25], 0.0));
        let out = process_line("G1 X100 F200", &mut state, &config, 'E', Some(&grid)).unwrap();
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn send_file_streams_every_line_and_reports_completion() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("levelctl_test_{}.gcode", std::process::id()));
        {
            let mut f = File::create(&tmp).unwrap();
            writeln!(f, "G28").unwrap();
            writeln!(f, "G1 X10 Y10 F200").unwrap();
            writeln!(f, "; a comment only line").unwrap();
        }

        let mut dispatcher = RecordingDispatcher { lines: RefCell::new(Vec::new()) };
        let config = ControlParameters::default();
        let outcome = send_file(&tmp, &mut dispatcher, &config, 'E', None).unwrap();
        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(dispatcher.lines.borrow().len(), 2);

        let _ = std::fs::remove_file(&tmp);
    }

    struct AbortAfterOne {
        sent: usize,
    }

    impl Dispatcher for AbortAfterOne {
        type Error = std::convert::Infallible;
        fn dispatch(&mut self, _line: &str) -> Result<(), Self::Error> {
            self.sent += 1;
            Ok(())
        }
        fn should_abort(&self) -> bool {
            self.sent >= 1
        }
    }

    #[test]
    fn abort_flag_stops_the_stream_after_the_current_command() {
        let mut tmp = std::env::temp_dir();
        tmp.push(format!("levelctl_test_abort_{}.gcode", std::process::id()));
        {
            let mut f = File::create(&tmp).unwrap();
            writeln!(f, "G28").unwrap();
            writeln!(f, "G1 X10").unwrap();
            writeln!(f, "G1 X20").unwrap();
        }

        let mut dispatcher = AbortAfterOne { sent: 0 };
        let config = ControlParameters::default();
        let outcome = send_file(&tmp, &mut dispatcher, &config, 'E', None).unwrap();
        assert_eq!(outcome, SendOutcome::Aborted);
        assert_eq!(dispatcher.sent, 1);

        let _ = std::fs::remove_file(&tmp);
    }
}
