//! URL helper functions

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::SiteConfig;

/// Characters kept as-is when encoding a URL path
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Generate a URL with the root path of the base URL
///
/// # Examples
/// ```ignore
/// url_for(&config, "/css/style.css") // -> "/kb/css/style.css"
/// ```
pub fn url_for(config: &SiteConfig, path: &str) -> String {
    if is_external(path) {
        return path.to_string();
    }

    let root = config.root();
    let root = root.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        format!("{}/", root)
    } else {
        format!("{}/{}", root, path)
    }
}

/// Generate a full URL including the domain
///
/// # Examples
/// ```ignore
/// full_url_for(&config, "/go/") // -> "https://example.com/kb/go/"
/// ```
pub fn full_url_for(config: &SiteConfig, path: &str) -> String {
    if is_external(path) {
        return path.to_string();
    }
    format!(
        "{}/{}",
        config.base_url_trimmed(),
        path.trim_start_matches('/')
    )
}

/// Whether a link leaves the site (scheme, protocol-relative, mailto, ...)
pub fn is_external(link: &str) -> bool {
    link.starts_with("//")
        || link
            .split_once(':')
            .map(|(scheme, _)| {
                !scheme.is_empty()
                    && scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            })
            .unwrap_or(false)
}

/// Build a site path from segments, slugifying each one when asked
///
/// Always starts and ends with `/`.
pub fn join_url<S: AsRef<str>>(segments: &[S], slugify: bool) -> String {
    let parts: Vec<String> = segments
        .iter()
        .map(|s| s.as_ref().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .map(|s| {
            if slugify {
                slug::slugify(s)
            } else {
                s.to_string()
            }
        })
        .collect();

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", parts.join("/"))
    }
}

/// Resolve `target` against the directory URL `base`, collapsing `.` and `..`
///
/// # Examples
/// ```ignore
/// resolve_path("/go/errors/", "../context/") // -> "/go/context/"
/// ```
pub fn resolve_path(base: &str, target: &str) -> String {
    let joined = if target.starts_with('/') {
        target.to_string()
    } else {
        let dir = match base.rfind('/') {
            Some(pos) => &base[..=pos],
            None => "/",
        };
        format!("{}{}", dir, target)
    };

    let trailing_slash = joined.ends_with('/') || joined.ends_with("/.") || joined.ends_with("/..");
    let mut stack: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    let mut path = format!("/{}", stack.join("/"));
    if trailing_slash && path != "/" {
        path.push('/');
    }
    path
}

/// Calculate relative URL from one path to another
///
/// # Examples
/// ```ignore
/// relative_url("/foo/bar/", "/css/style.css") // -> "../../css/style.css"
/// ```
pub fn relative_url(from: &str, to: &str) -> String {
    let from_parts: Vec<&str> = from.trim_matches('/').split('/').filter(|p| !p.is_empty()).collect();
    let to_parts: Vec<&str> = to.trim_matches('/').split('/').filter(|p| !p.is_empty()).collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = "../".repeat(from_parts.len() - common);
    result.push_str(&to_parts[common..].join("/"));

    if result.is_empty() {
        "./".to_string()
    } else {
        result.trim_end_matches('/').to_string()
    }
}

/// Encode a URL path, keeping `/` and the unreserved punctuation
pub fn encode_url(path: &str) -> String {
    utf8_percent_encode(path, PATH_SAFE).to_string()
}

/// Turn free text into a URL-safe path fragment
pub fn urlize(text: &str) -> String {
    let lowered = text.trim().to_lowercase().replace(char::is_whitespace, "-");
    encode_url(&lowered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SiteConfig {
        SiteConfig {
            base_url: "https://example.com/kb/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_for() {
        let config = test_config();
        assert_eq!(url_for(&config, "/css/style.css"), "/kb/css/style.css");
        assert_eq!(url_for(&config, "go/"), "/kb/go/");
        assert_eq!(url_for(&config, "/"), "/kb/");
        assert_eq!(url_for(&config, "https://go.dev/"), "https://go.dev/");
    }

    #[test]
    fn test_full_url_for() {
        let config = test_config();
        assert_eq!(full_url_for(&config, "/go/"), "https://example.com/kb/go/");
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("https://go.dev"));
        assert!(is_external("mailto:someone@example.com"));
        assert!(is_external("//cdn.example.com/x.js"));
        assert!(!is_external("/go/errors/"));
        assert!(!is_external("../errors/"));
        assert!(!is_external("#usage"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url(&["Go", "Error Handling"], true), "/go/error-handling/");
        assert_eq!(join_url(&["Go", "Error Handling"], false), "/Go/Error Handling/");
        assert_eq!(join_url::<&str>(&[], true), "/");
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("/go/errors/", "../context/"), "/go/context/");
        assert_eq!(resolve_path("/go/errors/", "wrap/"), "/go/errors/wrap/");
        assert_eq!(resolve_path("/go/errors/", "/css/"), "/css/");
        assert_eq!(resolve_path("/go/errors/", "diagram.png"), "/go/errors/diagram.png");
        assert_eq!(resolve_path("/", "../../x"), "/x");
        assert_eq!(resolve_path("/a/b/", ".."), "/a/");
    }

    #[test]
    fn test_relative_url() {
        assert_eq!(
            relative_url("/foo/bar/", "/css/style.css"),
            "../../css/style.css"
        );
        assert_eq!(relative_url("/go/", "/go/"), "./");
    }

    #[test]
    fn test_urlize() {
        assert_eq!(urlize("Go Idioms"), "go-idioms");
        assert_eq!(urlize("C# & F#"), "c%23-%26-f%23");
    }
}
