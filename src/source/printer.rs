// src/source/printer.rs

//! Deterministic output normalization for Java sources
//!
//! Every `.java` file of a patched tree goes through [`normalize`], so two
//! runs over the same input produce byte-identical trees no matter which
//! files were edited.

const BOM: char = '\u{feff}';

/// Normalize line endings and whitespace
///
/// - A leading byte order mark is dropped
/// - CRLF and lone CR become LF
/// - Trailing spaces and tabs are removed from every line
/// - Trailing blank lines collapse so the file ends in exactly one newline
///
/// An input that is empty after normalization stays empty.
pub fn normalize(text: &str) -> String {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len() + 1);
    for line in unified.split('\n') {
        out.push_str(line.trim_end_matches([' ', '\t']));
        out.push('\n');
    }

    let trimmed_len = out.trim_end_matches('\n').len();
    out.truncate(trimmed_len);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings_and_trailing_space() {
        let input = "\u{feff}package a;\r\n\r\nclass A {  \r\n\tint x;\t\r}\r\n\r\n\r\n";
        assert_eq!(normalize(input), "package a;\n\nclass A {\n\tint x;\n}\n");
    }

    #[test]
    fn test_normalize_adds_final_newline() {
        assert_eq!(normalize("class A {}"), "class A {}\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("class A {\r\n  void f() { }   \r\n}");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n\n  \n"), "");
    }
}
