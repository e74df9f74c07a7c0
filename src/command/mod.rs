//! Typed G-code and M-code command model with canonical serialization.

mod parser;

pub use parser::{parse_g, ParseError};

use std::fmt;

/// One parameter letter/value pair in a command's argument list.
const MAX_PARAMS: usize = 26;

/// The argument bag for a G-command: one optional `f64` per letter A-Z,
/// in insertion order for iteration but canonical order for serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamBag {
    values: [Option<f64>; MAX_PARAMS],
}

fn letter_index(letter: char) -> Option<usize> {
    let letter = letter.to_ascii_uppercase();
    if letter.is_ascii_uppercase() {
        Some((letter as u8 - b'A') as usize)
    } else {
        None
    }
}

impl ParamBag {
    pub fn get(&self, letter: char) -> Option<f64> {
        letter_index(letter).and_then(|i| self.values[i])
    }

    pub fn set(&mut self, letter: char, value: f64) {
        if let Some(i) = letter_index(letter) {
            self.values[i] = Some(value);
        }
    }

    pub fn contains(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    /// Iterates present letters in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.values.iter().enumerate().filter_map(|(i, v)| {
            v.map(|value| ((b'A' + i as u8) as char, value))
        })
    }
}

/// A G-command: integer code plus a typed parameter bag.
///
/// `fourth_letter` names the configured fourth-axis letter (E/A/B/C); it
/// determines which parameter is exposed through [`GCommand::fourth`].
#[derive(Debug, Clone, PartialEq)]
pub struct GCommand {
    pub code: u32,
    pub fourth_letter: char,
    params: ParamBag,
}

impl GCommand {
    pub fn new(code: u32, fourth_letter: char) -> Self {
        Self {
            code,
            fourth_letter,
            params: ParamBag::default(),
        }
    }

    pub fn x(&self) -> Option<f64> {
        self.params.get('X')
    }
    pub fn y(&self) -> Option<f64> {
        self.params.get('Y')
    }
    pub fn z(&self) -> Option<f64> {
        self.params.get('Z')
    }
    pub fn f(&self) -> Option<f64> {
        self.params.get('F')
    }
    pub fn fourth(&self) -> Option<f64> {
        self.params.get(self.fourth_letter)
    }
    pub fn param(&self, letter: char) -> Option<f64> {
        self.params.get(letter)
    }

    pub fn set_x(&mut self, v: f64) -> &mut Self {
        self.params.set('X', v);
        self
    }
    pub fn set_y(&mut self, v: f64) -> &mut Self {
        self.params.set('Y', v);
        self
    }
    pub fn set_z(&mut self, v: f64) -> &mut Self {
        self.params.set('Z', v);
        self
    }
    pub fn set_f(&mut self, v: f64) -> &mut Self {
        self.params.set('F', v);
        self
    }
    pub fn set_fourth(&mut self, v: f64) -> &mut Self {
        let letter = self.fourth_letter;
        self.params.set(letter, v);
        self
    }
    pub fn set_param(&mut self, letter: char, v: f64) -> &mut Self {
        self.params.set(letter, v);
        self
    }

    pub fn set_point(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.set_x(x).set_y(y).set_z(z);
        self
    }

    /// Iterates all present parameters in alphabetical order.
    pub fn iter_params(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.params.iter()
    }
}

impl fmt::Display for GCommand {
    /// Canonical order: `G<code>`, X, Y, Z, fourth axis, other letters
    /// alphabetically, F last — matching the ordering the firmware parses
    /// most reliably.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.code)?;
        let mut consumed = [false; MAX_PARAMS];
        let mark = |letter: char, consumed: &mut [bool; MAX_PARAMS]| {
            if let Some(i) = letter_index(letter) {
                consumed[i] = true;
            }
        };
        for letter in ['X', 'Y', 'Z', self.fourth_letter] {
            if let Some(v) = self.params.get(letter) {
                write!(f, " {}{}", letter, v)?;
            }
            mark(letter, &mut consumed);
        }
        for (letter, value) in self.params.iter() {
            if letter == 'F' {
                continue;
            }
            if let Some(i) = letter_index(letter) {
                if consumed[i] {
                    continue;
                }
            }
            write!(f, " {}{}", letter, value)?;
        }
        if let Some(fval) = self.params.get('F') {
            write!(f, " F{}", fval)?;
        }
        Ok(())
    }
}

/// An M-command: integer code plus an opaque, unparsed parameter string.
#[derive(Debug, Clone, PartialEq)]
pub struct MCommand {
    pub code: u32,
    pub parameters: String,
}

impl MCommand {
    pub fn new(code: u32, parameters: impl Into<String>) -> Self {
        Self {
            code,
            parameters: parameters.into(),
        }
    }
}

impl fmt::Display for MCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.is_empty() {
            write!(f, "M{}", self.code)
        } else {
            write!(f, "M{} {}", self.code, self.parameters)
        }
    }
}

/// Any parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    G(GCommand),
    M(MCommand),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::G(g) => g.fmt(f),
            Command::M(m) => m.fmt(f),
        }
    }
}

pub use parser::{parse_g, parse_line, parse_m};
