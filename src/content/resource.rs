//! Page bundle resources
//!
//! Files that live next to a bundle's `index.md` (leaf bundle) or
//! `_index.md` (branch bundle) belong to that page. They are copied next to
//! the rendered page and exposed to templates through [`Resources`].

use glob::{MatchOptions, Pattern, PatternError};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// MIME type split into its two halves
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaType {
    pub main_type: String,
    pub sub_type: String,
}

impl MediaType {
    fn new(main_type: &str, sub_type: &str) -> Self {
        Self {
            main_type: main_type.to_string(),
            sub_type: sub_type.to_string(),
        }
    }

    /// Media type from a file extension; unknown types are octet streams
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let (main_type, sub_type) = match ext.as_str() {
            "png" => ("image", "png"),
            "jpg" | "jpeg" => ("image", "jpeg"),
            "gif" => ("image", "gif"),
            "svg" => ("image", "svg+xml"),
            "webp" => ("image", "webp"),
            "ico" => ("image", "x-icon"),
            "md" | "markdown" => ("text", "markdown"),
            "txt" => ("text", "plain"),
            "csv" => ("text", "csv"),
            "css" => ("text", "css"),
            "html" | "htm" => ("text", "html"),
            "go" => ("text", "x-go"),
            "rs" => ("text", "x-rust"),
            "js" => ("text", "javascript"),
            "json" => ("application", "json"),
            "yaml" | "yml" => ("application", "yaml"),
            "toml" => ("application", "toml"),
            "xml" => ("application", "xml"),
            "pdf" => ("application", "pdf"),
            "zip" => ("application", "zip"),
            "mp4" => ("video", "mp4"),
            "webm" => ("video", "webm"),
            "mp3" => ("audio", "mpeg"),
            "woff" => ("font", "woff"),
            "woff2" => ("font", "woff2"),
            _ => ("application", "octet-stream"),
        };
        Self::new(main_type, sub_type)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
    }
}

/// A file that belongs to a page bundle
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    /// Path relative to the bundle directory, `/`-separated
    pub name: String,
    pub title: String,
    /// Site path, e.g. `/go/errors/diagram.png`
    pub url: String,
    pub permalink: String,
    pub media_type: MediaType,
    #[serde(rename = "media_type_str")]
    pub media_type_name: String,
    pub size: u64,
    #[serde(skip)]
    pub source: PathBuf,
}

impl Resource {
    /// Create a resource for `source`, which sits at `name` inside the bundle
    pub fn new(name: &str, source: PathBuf, page_url: &str, base_url: &str, size: u64) -> Self {
        let media_type = MediaType::from_path(&source);
        let url = format!("{}{}", page_url, name);
        let permalink = format!("{}{}", base_url.trim_end_matches('/'), url);
        Self {
            name: name.to_string(),
            title: name.to_string(),
            url,
            permalink,
            media_type_name: media_type.to_string(),
            media_type,
            size,
            source,
        }
    }
}

/// Resources of one page, in name order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Resources(Vec<Resource>);

impl Resources {
    pub fn new(mut resources: Vec<Resource>) -> Self {
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        Self(resources)
    }

    pub fn push(&mut self, resource: Resource) {
        let pos = self
            .0
            .binary_search_by(|r| r.name.as_str().cmp(&resource.name))
            .unwrap_or_else(|pos| pos);
        self.0.insert(pos, resource);
    }

    /// Exact match on the bundle-relative name
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.0.iter().find(|r| r.name == name)
    }

    /// Glob match on names, e.g. `images/*.png`; `*` also crosses `/`
    pub fn matching(&self, pattern: &str) -> Result<Vec<&Resource>, PatternError> {
        let pattern = Pattern::new(pattern)?;
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        Ok(self
            .0
            .iter()
            .filter(|r| pattern.matches_with(&r.name, options))
            .collect())
    }

    /// Resources whose main media type is `main_type` (`image`, `text`, ...)
    pub fn by_type(&self, main_type: &str) -> Vec<&Resource> {
        self.0
            .iter()
            .filter(|r| r.media_type.main_type == main_type)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Resources {
        let names = [
            "images/diagram.PNG",
            "images/flow.svg",
            "data/latency.csv",
            "cover.jpg",
            "notes.pdf",
        ];
        Resources::new(
            names
                .iter()
                .map(|name| {
                    Resource::new(
                        name,
                        PathBuf::from("content/http/timeouts").join(name),
                        "/http/timeouts/",
                        "https://example.com/",
                        10,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_media_types() {
        assert_eq!(
            MediaType::from_path(Path::new("a/b.JPEG")).to_string(),
            "image/jpeg"
        );
        assert_eq!(
            MediaType::from_path(Path::new("Makefile")).to_string(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_resource_urls() {
        let resources = resources();
        let cover = resources.get("cover.jpg").unwrap();
        assert_eq!(cover.url, "/http/timeouts/cover.jpg");
        assert_eq!(cover.permalink, "https://example.com/http/timeouts/cover.jpg");
        assert_eq!(cover.media_type_name, "image/jpeg");
    }

    #[test]
    fn test_get_is_exact() {
        let resources = resources();
        assert!(resources.get("images/diagram.PNG").is_some());
        assert!(resources.get("images/diagram.png").is_none());
        assert!(resources.get("diagram.PNG").is_none());
        assert!(resources.get("missing.png").is_none());
    }

    #[test]
    fn test_matching() {
        let resources = resources();
        let images: Vec<_> = resources
            .matching("images/*")
            .unwrap()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(images, vec!["images/diagram.PNG", "images/flow.svg"]);

        let png = resources.matching("*.png").unwrap();
        assert_eq!(png.len(), 1);

        assert!(resources.matching("[").is_err());
    }

    #[test]
    fn test_by_type() {
        let resources = resources();
        assert_eq!(resources.by_type("image").len(), 3);
        assert_eq!(resources.by_type("application").len(), 1);
        assert_eq!(resources.by_type("text").len(), 1);
    }

    #[test]
    fn test_push_keeps_order() {
        let mut resources = resources();
        resources.push(Resource::new(
            "b.txt",
            PathBuf::from("b.txt"),
            "/x/",
            "https://example.com",
            1,
        ));
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
