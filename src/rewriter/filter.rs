//! Comment stripping, whitespace normalization, and the unsupported-code
//! allow-list filter.

const ALLOWED_G_CODES: &[u32] = &[0, 1, 2, 3, 4, 10, 11, 28, 29, 30, 31, 90, 91, 92];
const ALLOWED_M_CODES: &[u32] = &[0, 1, 3, 4, 5, 17, 18, 84, 92, 104, 105, 109, 110, 114, 115, 117, 119, 400, 999];

/// Truncates `line` at the first `(`, `;`, or `%`, whichever comes first.
pub fn strip_comment(line: &str) -> &str {
    let cut = [line.find('('), line.find(';'), line.find('%')]
        .into_iter()
        .flatten()
        .min();
    match cut {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Trims, uppercases, and inserts a space before each letter so that
/// `G1X10Y20` becomes `G1 X10 Y20`.
pub fn normalize_spacing(line: &str) -> String {
    let trimmed = line.trim().to_ascii_uppercase();
    let mut out = String::with_capacity(trimmed.len() * 2);
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_alphabetic() && i != 0 && !out.ends_with(' ') {
            out.push(' ');
        }
        out.push(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes N-line-numbers (`N123`) and their value from the token stream.
pub fn strip_line_numbers(line: &str) -> String {
    line.split_whitespace()
        .filter(|tok| !tok.starts_with('N') && !tok.starts_with('n'))
        .collect::<Vec<_>>()
        .join(" ")
}

/// True if `code` is a supported G-code under the allow-list.
pub fn is_g_code_allowed(code: u32) -> bool {
    ALLOWED_G_CODES.contains(&code)
}

/// True if `code` is a supported M-code under the allow-list.
pub fn is_m_code_allowed(code: u32) -> bool {
    ALLOWED_M_CODES.contains(&code)
}
