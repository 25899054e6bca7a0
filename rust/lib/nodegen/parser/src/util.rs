//! Shared lexical helpers for the `.nodes` front-end.

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a comma-separated list, trimming entries.
/// e.g. `"Location, Type"` → `["Location", "Type"]`
pub fn split_list(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    s.split(',').map(str::trim).collect()
}

/// Split a line into its leading keyword and the remainder.
/// e.g. `"node Word : Node {"` → `("node", "Word : Node {")`
pub fn split_keyword(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (line, ""),
    }
}

/// Plain `//` comment; `///` is documentation.
pub fn is_comment(line: &str) -> bool {
    line.starts_with("//") && !line.starts_with("///")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("parenthesesCount"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn lists_and_keywords() {
        assert_eq!(split_list("Location, Type ,Env"), vec!["Location", "Type", "Env"]);
        assert!(split_list("  ").is_empty());
        assert_eq!(split_keyword("root   BasicASTNode"), ("root", "BasicASTNode"));
        assert_eq!(split_keyword("}"), ("}", ""));
        assert!(is_comment("// note"));
        assert!(!is_comment("/// doc"));
    }
}
