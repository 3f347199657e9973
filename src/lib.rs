//! quire: a static site builder for topic-organized Markdown notes
//!
//! This crate reads a content tree of Markdown files with front matter,
//! orders pages inside sections, assembles menus and renders everything
//! through Tera templates with an embedded default theme. It also lints
//! the corpus for broken links and structural problems.

pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod helpers;
pub mod lint;
pub mod menu;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// The main quire application
#[derive(Debug, Clone)]
pub struct Quire {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Site directory
    pub base_dir: PathBuf,
    /// Config file in use, if any
    pub config_path: Option<PathBuf>,
    /// Markdown content directory
    pub content_dir: PathBuf,
    /// Output directory
    pub public_dir: PathBuf,
    /// Files copied verbatim into the output
    pub static_dir: PathBuf,
    /// Template overrides
    pub layouts_dir: PathBuf,
    /// Scaffolds for `quire new`
    pub archetype_dir: PathBuf,
}

impl Quire {
    /// Open the site in `base_dir`, reading its config file when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = config::SiteConfig::discover(&base_dir);

        let config = match &config_path {
            Some(path) => config::SiteConfig::load(path)?,
            None => {
                tracing::debug!("No config file in {:?}, using defaults", base_dir);
                config::SiteConfig::default()
            }
        };

        let mut quire = Self::with_config(base_dir, config);
        quire.config_path = config_path;
        Ok(quire)
    }

    /// Create an instance from an in-memory config
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self {
            content_dir: base_dir.join(&config.content_dir),
            public_dir: base_dir.join(&config.public_dir),
            static_dir: base_dir.join(&config.static_dir),
            layouts_dir: base_dir.join(&config.layouts_dir),
            archetype_dir: base_dir.join(&config.archetype_dir),
            config_path: None,
            config,
            base_dir,
        }
    }

    /// Build the site into the public directory
    pub fn build(&self) -> Result<generator::BuildSummary> {
        commands::build::run(self)
    }

    /// Lint the content
    pub fn check(&self) -> Result<lint::Report> {
        commands::check::run(self)
    }

    /// Remove the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_new_without_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let quire = Quire::new(dir.path()).unwrap();
        assert!(quire.config_path.is_none());
        assert_eq!(quire.content_dir, dir.path().join("content"));
        assert_eq!(quire.public_dir, dir.path().join("public"));
    }

    #[test]
    fn test_new_reads_config_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "title = \"KB\"\npublishDir = \"dist\"\ncontentDir = \"notes\"\n",
        )
        .unwrap();

        let quire = Quire::new(dir.path()).unwrap();
        assert_eq!(quire.config.title, "KB");
        assert_eq!(quire.public_dir, dir.path().join("dist"));
        assert_eq!(quire.content_dir, dir.path().join("notes"));
        assert!(quire.config_path.is_some());
    }
}
