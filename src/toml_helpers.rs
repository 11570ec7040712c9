// Position helpers for TOML parse errors.

/// Convert a byte offset into a 1-based (line, column) pair within `src`.
#[must_use]
pub fn line_col_at(src: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(src.len());
    let before = src.get(..offset).unwrap_or(src);
    let line = before.matches('\n').count() + 1;
    let col = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, col)
}

/// Render a `toml` deserialization error as `"{what} parse error at L:C: msg"`,
/// falling back to the bare message when the error carries no span.
#[must_use]
pub fn describe_toml_error(what: &str, src: &str, err: &toml::de::Error) -> String {
    match err.span() {
        Some(span) => {
            let (line, col) = line_col_at(src, span.start);
            format!("{what} parse error at {line}:{col}: {}", err.message())
        }
        None => format!("{what} parse error: {}", err.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        assert_eq!(line_col_at("abc", 0), (1, 1));
    }

    #[test]
    fn counts_lines_and_columns() {
        let src = "a = 1\nbb = x\n";
        assert_eq!(line_col_at(src, 11), (2, 6));
        // clamped past the end
        assert_eq!(line_col_at(src, 999), (3, 1));
    }

    #[test]
    fn describes_span() {
        let src = "[[variant]]\nmodel = \n";
        let err = toml::from_str::<toml::Table>(src).expect_err("invalid toml");
        let msg = describe_toml_error("variants.toml", src, &err);
        assert!(msg.starts_with("variants.toml parse error at 2:"), "{msg}");
    }
}
