//! Site configuration (config.toml / config.yml)

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::menu::MenuEntryConfig;

/// Config file names, in lookup order
pub const CONFIG_FILES: &[&str] = &["config.toml", "hugo.toml", "config.yaml", "config.yml"];

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    #[serde(alias = "baseURL", alias = "baseurl")]
    pub base_url: String,
    #[serde(alias = "languageCode")]
    pub language_code: String,
    pub author: String,
    pub description: String,
    /// IANA timezone used for naive front-matter dates
    pub timezone: String,

    // Directory
    #[serde(alias = "contentDir")]
    pub content_dir: String,
    #[serde(alias = "publishDir")]
    pub public_dir: String,
    #[serde(alias = "staticDir")]
    pub static_dir: String,
    #[serde(alias = "layoutDir")]
    pub layouts_dir: String,
    #[serde(alias = "archetypeDir")]
    pub archetype_dir: String,
    pub tags_dir: String,

    // Build
    #[serde(alias = "buildDrafts")]
    pub build_drafts: bool,
    #[serde(alias = "buildFuture")]
    pub build_future: bool,
    #[serde(alias = "buildExpired")]
    pub build_expired: bool,
    pub slugify_urls: bool,

    // Listing
    pub paginate: usize,
    #[serde(alias = "summaryLength")]
    pub summary_length: usize,
    pub feed_limit: usize,

    #[serde(default)]
    pub highlight: HighlightConfig,

    /// Menus keyed by name (e.g. `main`, `footer`)
    #[serde(default)]
    pub menu: IndexMap<String, Vec<MenuEntryConfig>>,

    #[serde(default)]
    pub lint: LintConfig,

    /// Site params, visible to templates and used as page param fallback
    #[serde(default)]
    pub params: IndexMap<String, serde_json::Value>,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Notes".to_string(),
            base_url: "http://localhost:1313/".to_string(),
            language_code: "en-us".to_string(),
            author: String::new(),
            description: String::new(),
            timezone: "UTC".to_string(),

            content_dir: "content".to_string(),
            public_dir: "public".to_string(),
            static_dir: "static".to_string(),
            layouts_dir: "layouts".to_string(),
            archetype_dir: "archetypes".to_string(),
            tags_dir: "tags".to_string(),

            build_drafts: false,
            build_future: false,
            build_expired: false,
            slugify_urls: true,

            paginate: 10,
            summary_length: 70,
            feed_limit: 20,

            highlight: HighlightConfig::default(),
            menu: IndexMap::new(),
            lint: LintConfig::default(),
            params: IndexMap::new(),
            extra: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file, picking the format from its extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;

        let config: SiteConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {:?}", path))?,
            Some("yml") | Some("yaml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {:?}", path))?,
            _ => bail!("Unsupported config format: {:?}", path),
        };

        if config.paginate == 0 {
            bail!("paginate must be at least 1");
        }

        Ok(config)
    }

    /// Find the config file in a site directory
    pub fn discover(base_dir: &Path) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| base_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Timezone for naive dates, UTC when the name is unknown
    pub fn tz(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("Unknown timezone {:?}, using UTC", self.timezone);
                Tz::UTC
            }
        }
    }

    /// Base URL without trailing slash
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Path component of the base URL, always with leading and trailing slash
    pub fn root(&self) -> String {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        let path = without_scheme
            .find('/')
            .map(|pos| &without_scheme[pos..])
            .unwrap_or("/");
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        }
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// syntect theme name
    pub theme: String,
    pub line_numbers: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_numbers: false,
        }
    }
}

/// Documentation lint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Treat warnings as failures in `check`
    pub deny_warnings: bool,
    /// Verify `#fragment` targets against heading ids
    pub check_fragments: bool,
    /// Glob patterns of link targets that are never reported
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            deny_warnings: false,
            check_fragments: true,
            ignore: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.content_dir, "content");
        assert!(!config.build_drafts);
        assert_eq!(config.paginate, 10);
        assert_eq!(config.root(), "/");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
baseURL = "https://notes.example.org/kb/"
title = "Engineering Notes"
buildDrafts = true
paginate = 5

[params]
github = "notes"

[[menu.main]]
name = "Go"
url = "/go/"
weight = 10
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.title, "Engineering Notes");
        assert!(config.build_drafts);
        assert_eq!(config.paginate, 5);
        assert_eq!(config.root(), "/kb/");
        assert_eq!(config.menu["main"].len(), 1);
        assert_eq!(config.menu["main"][0].weight, 10);
        assert_eq!(config.params["github"], serde_json::json!("notes"));
    }

    #[test]
    fn test_parse_yaml_config() {
        let yaml = r#"
title: My Notes
base_url: https://example.com
timezone: Europe/Berlin
menu:
  main:
    - name: CSS
      url: /css/
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Notes");
        assert_eq!(config.tz(), chrono_tz::Europe::Berlin);
        assert_eq!(config.menu["main"][0].name.as_deref(), Some("CSS"));
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let config = SiteConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert_eq!(config.tz(), Tz::UTC);
    }

    #[test]
    fn test_load_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SiteConfig::discover(dir.path()).is_none());

        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "title = \"Disk\"").unwrap();

        assert_eq!(SiteConfig::discover(dir.path()), Some(path.clone()));
        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.title, "Disk");
    }

    #[test]
    fn test_zero_paginate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "paginate = 0\n").unwrap();
        assert!(SiteConfig::load(&path).is_err());
    }
}
