//! Dot-escaping for user-supplied names.
//!
//! Identifiers travel through the SQL-AST with `.` as the qualifier
//! separator. A user-supplied name containing a literal dot would be
//! indistinguishable from a qualifier boundary, so it is replaced by a
//! sentinel on ingress and restored by the formatter's final unescape pass.

const DOT_SENTINEL: &str = "\u{1}DOT\u{1}";

/// Replace literal `.` in a user-supplied name with the dot sentinel.
pub fn escape_dots(name: &str) -> String {
    name.replace('.', DOT_SENTINEL)
}

/// Restore sentinel-escaped dots in a fully rendered SQL string.
pub fn unescape_dots(sql: &str) -> String {
    sql.replace(DOT_SENTINEL, ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_dotted_names() {
        let escaped = escape_dots("weird.name");
        assert!(!escaped.contains('.'));
        assert_eq!(unescape_dots(&escaped), "weird.name");
    }

    #[test]
    fn leaves_plain_names_untouched() {
        assert_eq!(escape_dots("plain"), "plain");
        assert_eq!(unescape_dots("plain"), "plain");
    }
}
