//! Trims trailing decimal digits so a rebuilt line fits a fixed buffer
//! length, shaving the commands with the most decimals first.

use crate::command::{parse_g, GCommand};

fn decimal_count(token: &str) -> usize {
    token.find('.').map(|i| token.len() - i - 1).unwrap_or(0)
}

/// Reduces `line`'s precision to fit within `max_len` bytes.
///
/// Returns the (possibly unchanged) line and a flag that is set when the
/// available decimal reduction was insufficient to reach the budget.
pub fn reduce_precision(line: &str, max_len: usize) -> (String, bool) {
    let trimmed = line.trim_start();
    let Some(first) = trimmed.chars().next() else {
        return (line.to_string(), false);
    };
    if !first.is_ascii_alphabetic() {
        return (line.to_string(), false);
    }

    let cut = trimmed.find('(').map(|i| &trimmed[..i]).unwrap_or(trimmed);
    let cut = cut.trim_end();

    if cut.len() <= max_len {
        return (cut.to_string(), false);
    }

    let mut chars_to_remove = cut.len() - max_len;
    let mut tokens: Vec<String> = cut.split_whitespace().map(String::from).collect();
    let mut tier = tokens.iter().map(|t| decimal_count(t)).max().unwrap_or(0);

    while chars_to_remove > 0 && tier > 1 {
        let mut removed_any = false;
        for tok in tokens.iter_mut() {
            if chars_to_remove == 0 {
                break;
            }
            if decimal_count(tok) == tier {
                tok.pop();
                chars_to_remove -= 1;
                removed_any = true;
            }
        }
        if !removed_any || tokens.iter().all(|t| decimal_count(t) != tier) {
            tier -= 1;
        }
    }

    (tokens.join(" "), chars_to_remove > 0)
}

/// Structured counterpart of [`reduce_precision`]: renders `cmd`, trims its
/// decimal tokens to fit `max_len`, then reparses the reduced line back into
/// a command so the rest of the pipeline (Z-rate limiting) keeps working
/// with structured data instead of text.
pub fn reduce_precision_command(cmd: &GCommand, max_len: usize) -> (GCommand, bool) {
    let rendered = cmd.to_string();
    let (reduced, insufficient) = reduce_precision(&rendered, max_len);
    let tail = reduced.splitn(2, ' ').nth(1).unwrap_or("");
    (parse_g(cmd.code, tail, cmd.fourth_letter), insufficient)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_unchanged() {
        let (line, insufficient) = reduce_precision("G1 X10.5", 50);
        assert_eq!(line, "G1 X10.5");
        assert!(!insufficient);
    }

    #[test]
    fn non_command_line_unchanged() {
        let (line, insufficient) = reduce_precision("  not a code", 4);
        assert_eq!(line, "  not a code");
        assert!(!insufficient);
    }

    #[test]
    fn trims_longest_decimal_tokens_first() {
        let long = "G1 X10.123456 Y20.1 Z5.1";
        let (line, insufficient) = reduce_precision(long, 20);
        assert!(line.len() <= 20 || insufficient);
        assert!(line.starts_with("G1"));
    }

    #[test]
    fn command_variant_round_trips_through_the_parser() {
        let mut cmd = GCommand::new(1, 'E');
        cmd.set_x(10.123456).set_y(20.1).set_f(300.0);
        let (reduced, insufficient) = reduce_precision_command(&cmd, 20);
        assert!(!insufficient);
        assert_eq!(reduced.code, 1);
        assert_eq!(reduced.f(), Some(300.0));
        assert!(reduced.x().unwrap() < cmd.x().unwrap());
    }

    #[test]
    fn flags_insufficient_when_budget_unreachable() {
        let long = "G1 X1.1 Y1.1";
        let (_, insufficient) = reduce_precision(long, 1);
        assert!(insufficient);
    }
}
