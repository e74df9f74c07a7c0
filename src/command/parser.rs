use once_cell::sync::Lazy;
use regex::Regex;

use super::{Command, GCommand, MCommand};

/// Errors raised while turning a line of text into a [`Command`].
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("error parsing command code")]
    BadCode,
    #[error("error parsing command line: {0}")]
    BadLine(String),
}

static G_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^G(\d+)(.*)$").unwrap());
static M_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^M(\d+)(.*)$").unwrap());

/// Parses the parameter tail of a G-command (everything after the code).
///
/// Each whitespace-separated token must be one letter followed by a number;
/// ill-formed tokens are silently skipped, mirroring how stripped comments
/// sometimes leave stray fragments behind.
pub fn parse_g(code: u32, tail: &str, fourth_letter: char) -> GCommand {
    let mut cmd = GCommand::new(code, fourth_letter);
    for token in tail.split_whitespace() {
        let mut chars = token.chars();
        let Some(letter) = chars.next() else { continue };
        if !letter.is_ascii_alphabetic() {
            continue;
        }
        let rest: &str = &token[letter.len_utf8()..];
        if let Ok(value) = rest.parse::<f64>() {
            cmd.set_param(letter.to_ascii_uppercase(), value);
        }
    }
    cmd
}

/// Parses a free-form M-command line, e.g. `"M92 E140.0"`.
pub fn parse_m(line: &str) -> Result<MCommand, ParseError> {
    let caps = M_LINE.captures(line.trim()).ok_or_else(|| {
        ParseError::BadLine(line.to_string())
    })?;
    let code: u32 = caps[1].parse().map_err(|_| ParseError::BadCode)?;
    let parameters = caps[2].trim().to_string();
    Ok(MCommand::new(code, parameters))
}

/// Parses a line into either a [`Command::G`] or [`Command::M`].
///
/// Lines matching neither pattern return [`ParseError::BadLine`].
pub fn parse_line(line: &str, fourth_letter: char) -> Result<Command, ParseError> {
    let trimmed = line.trim();
    if let Some(caps) = G_LINE.captures(trimmed) {
        let code: u32 = caps[1].parse().map_err(|_| ParseError::BadCode)?;
        return Ok(Command::G(parse_g(code, caps[2].trim(), fourth_letter)));
    }
    if M_LINE.is_match(trimmed) {
        return Ok(Command::M(parse_m(trimmed)?));
    }
    Err(ParseError::BadLine(line.to_string()))
}
