//! Modal expansion: Marlin is not modal, so bare feed/motion lines and
//! implicit feed carry-over must be made explicit before dispatch.

use crate::command::{parse_g, parse_line, Command, ParseError};

use super::state::RewriterState;

/// Expands `line` into a fully-qualified [`Command`], updating `state`'s
/// modal fields as it goes. Returns `Ok(None)` for a blank line.
pub fn make_marlin_friendly(
    line: &str,
    state: &mut RewriterState,
    fourth_letter: char,
    g0_feed: f64,
) -> Result<Option<Command>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let first = trimmed.chars().next().unwrap();

    if first == 'M' {
        return Ok(Some(parse_line(trimmed, fourth_letter)?));
    }

    let mut cmd = if first == 'F' {
        let mut g = parse_g(1, trimmed, fourth_letter);
        if let Some(f) = g.f() {
            state.record_explicit_feed(f);
        }
        g.code = 1;
        g
    } else if first == 'X' || first == 'Y' || first == 'Z' || first == fourth_letter.to_ascii_uppercase() {
        let code = state.last_g_command().unwrap_or(1);
        parse_g(code, trimmed, fourth_letter)
    } else if first == 'G' {
        match parse_line(trimmed, fourth_letter)? {
            Command::G(g) => g,
            other @ Command::M(_) => return Ok(Some(other)),
        }
    } else {
        return Err(ParseError::BadLine(line.to_string()));
    };

    state.set_last_g_command(cmd.code);

    match cmd.code {
        0 => {
            if cmd.f().is_none() {
                cmd.set_f(g0_feed);
                state.set_manual_feed_set(true);
            }
        }
        1 | 2 | 3 => {
            if let Some(f) = cmd.f() {
                state.record_explicit_feed(f);
            } else if state.manual_feed_set() {
                if let Some(last) = state.last_explicit_feed() {
                    cmd.set_f(last);
                }
                state.set_manual_feed_set(false);
            }
        }
        _ => {}
    }

    Ok(Some(Command::G(cmd)))
}
