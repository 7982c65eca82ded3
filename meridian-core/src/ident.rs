//! Identifier validation and name slugging.
//!
//! `is_valid_identifier` is the primary injection defense: a table or
//! field name that fails it must never reach SQL text. It is applied
//! at every entry point that accepts a caller-or-dataset-supplied
//! identifier, not only at the outer API boundary.

/// Check a store/field identifier against `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Convert a dataset display name to a URL-safe slug.
///
/// Lowercase, strip everything that is not a word character, space or
/// hyphen, then collapse separator runs to a single underscore. Used
/// for ESRI service-name resolution when exact name match fails.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == ' ' || *c == '-')
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.chars() {
        if c == ' ' || c == '-' {
            in_separator = true;
        } else {
            if in_separator && !slug.is_empty() {
                slug.push('_');
            }
            in_separator = false;
            slug.push(c);
        }
    }
    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_identifiers() {
        assert!(is_valid_identifier("table_1"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("A"));
    }

    #[test]
    fn invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1table"));
        assert!(!is_valid_identifier("bad-name"));
        assert!(!is_valid_identifier("drop table;--"));
        assert!(!is_valid_identifier("a\"b"));
    }

    #[test]
    fn slugify_names() {
        assert_eq!(slugify("City Parks"), "city_parks");
        assert_eq!(slugify("Rivers & Streams"), "rivers_streams");
        assert_eq!(slugify("already_slugged"), "already_slugged");
        assert_eq!(slugify("--edge case--"), "edge_case");
    }
}
