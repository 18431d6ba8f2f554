//! Name, path and route validation
//!
//! Resource names end up as file names inside release trees, so anything that
//! could escape a directory or confuse a shell is rejected up front.

use crate::errors::ValidationError;
use regex::Regex;
use std::sync::OnceLock;

pub const MAX_NAME_LEN: usize = 128;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_-]*$").expect("static regex"))
}

/// Validate a website, environment or resource name
pub fn validate_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyName {
            field: field.to_string(),
        });
    }
    let invalid = |reason: &str| ValidationError::InvalidName {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    if value.len() > MAX_NAME_LEN {
        return Err(invalid("longer than 128 characters"));
    }
    if !name_pattern().is_match(value) {
        return Err(invalid(
            "must start with a letter or digit and contain only letters, digits, '-' or '_'",
        ));
    }
    Ok(())
}

/// Clean a bundle-relative path and reject anything that could escape its root.
///
/// `.` segments and repeated separators are dropped; absolute paths, `..`
/// segments, backslashes and control characters are errors.
pub fn sanitize_rel_path(path: &str) -> Result<String, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if path.trim().is_empty() {
        return Err(invalid("empty path"));
    }
    if path.chars().any(char::is_control) {
        return Err(invalid("contains control characters"));
    }
    if path.contains('\\') {
        return Err(invalid("contains a backslash"));
    }
    if path.starts_with('/') {
        return Err(invalid("absolute paths are not allowed"));
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid("path traversal is not allowed")),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments.join("/"))
}

/// Leading slash, no trailing slash; the root route is `/`.
pub fn normalize_route(route: &str) -> String {
    let trimmed = route.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["home", "Home-2", "a_b", "0day"] {
            assert!(validate_name("name", name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "-lead", "../etc", "a/b", "a b", "tab\there", "dot.ted"] {
            assert!(validate_name("name", name).is_err(), "{:?}", name);
        }
        assert!(validate_name("name", &"a".repeat(129)).is_err());
        assert!(validate_name("name", &"a".repeat(128)).is_ok());
    }

    #[test]
    fn test_sanitize_cleans_redundant_segments() {
        assert_eq!(sanitize_rel_path("assets//./logo.png").unwrap(), "assets/logo.png");
        assert_eq!(sanitize_rel_path("styles/tokens.css/").unwrap(), "styles/tokens.css");
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        for path in ["", "/etc/passwd", "../x", "a/../../x", "a/..", "a\\b", "a\u{0}b", "./"] {
            assert!(sanitize_rel_path(path).is_err(), "{:?}", path);
        }
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route(""), "/");
        assert_eq!(normalize_route("/"), "/");
        assert_eq!(normalize_route("about/"), "/about");
        assert_eq!(normalize_route("/docs/intro"), "/docs/intro");
    }
}
