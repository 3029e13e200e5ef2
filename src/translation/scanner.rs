#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Bracketed,
    LineComment,
    BlockComment(u32),
}

pub(super) fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'#' | b'$')
}

/// Names of the form `P<digits>` collide with the positional placeholders the rewriter emits.
pub(super) fn is_positional_name(name: &str) -> bool {
    match name.as_bytes().split_first() {
        Some((b'P' | b'p', digits)) => !digits.is_empty() && digits.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// Scan a variable name starting at `start`; returns the end index and the name.
pub(super) fn scan_identifier(sql: &str, start: usize) -> Option<(usize, &str)> {
    let bytes = sql.as_bytes();
    let mut idx = start;
    while idx < bytes.len() && is_identifier_byte(bytes[idx]) {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        Some((idx, &sql[start..idx]))
    }
}
