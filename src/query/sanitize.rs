//! Denylist-based sanitization for tokens that end up interpolated into
//! query text. Filter keywords are bound as parameters instead (see
//! `QuerySpec::params`); this is a second line of defense for the few
//! places that still build query fragments from input, not a full guard.

/// Tokens stripped before a value may appear inside SQL text.
const SQL_DENYLIST: &[&str] = &[
    "DELETE", "DROP", "TRUNCATE", "UPDATE", "INSERT", "ALTER", "EXEC", "EXECUTE", ";", "--",
    "/*", "*/", "xp_", "sp_",
];

/// Tokens stripped before a value may appear inside Cypher text.
const CYPHER_DENYLIST: &[&str] = &[
    "DELETE", "DETACH", "DROP", "CREATE", "MERGE", "SET", "REMOVE", ";", "//", "/*", "*/", "--",
];

fn strip_denylisted(text: &str, denylist: &[&str]) -> String {
    let mut sanitized = text.to_string();
    for pattern in denylist {
        sanitized = sanitized.replace(pattern, "");
        sanitized = sanitized.replace(&pattern.to_lowercase(), "");
    }
    sanitized
}

/// Sanitize a value for interpolation into SQL text.
pub fn sanitize_sql(text: &str) -> String {
    strip_denylisted(text, SQL_DENYLIST).replace('\'', "''")
}

/// Sanitize a value for interpolation into Cypher text.
pub fn sanitize_cypher(text: &str) -> String {
    strip_denylisted(text, CYPHER_DENYLIST).replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_strips_statements_and_comments() {
        // Stripped tokens leave their surrounding whitespace in place.
        assert_eq!(sanitize_sql("Iowa; DROP TABLE farms--"), "Iowa  TABLE farms");
        assert_eq!(sanitize_sql("delete from farms"), " from farms");
    }

    #[test]
    fn test_sql_escapes_quotes() {
        assert_eq!(sanitize_sql("O'Brien"), "O''Brien");
    }

    #[test]
    fn test_cypher_strips_mutations() {
        assert_eq!(sanitize_cypher("x MERGE (n) DETACH"), "x  (n) ");
        assert_eq!(sanitize_cypher("a//comment"), "acomment");
    }

    #[test]
    fn test_cypher_escapes_quotes() {
        assert_eq!(sanitize_cypher("O'Brien"), "O\\'Brien");
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(sanitize_sql("corn belt iowa"), "corn belt iowa");
        assert_eq!(sanitize_cypher("corn belt iowa"), "corn belt iowa");
    }
}
