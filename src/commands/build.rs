//! Build the site, once or on every change

use anyhow::{Context as _, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::content::ContentLoader;
use crate::generator::{BuildSummary, Generator};
use crate::Quire;

/// Command-line overrides applied on top of the site config
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub drafts: bool,
    pub future: bool,
    pub expired: bool,
    pub base_url: Option<String>,
}

impl BuildOptions {
    pub fn apply(&self, quire: &mut Quire) {
        let config = &mut quire.config;
        config.build_drafts |= self.drafts;
        config.build_future |= self.future;
        config.build_expired |= self.expired;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
    }

    /// Open the site in `base_dir` with these overrides
    pub fn open(&self, base_dir: &Path) -> Result<Quire> {
        let mut quire = Quire::new(base_dir)?;
        self.apply(&mut quire);
        Ok(quire)
    }
}

/// Load the content and render it into the public directory
pub fn run(quire: &Quire) -> Result<BuildSummary> {
    let start = Instant::now();

    let site = ContentLoader::new(quire)
        .load()
        .context("Failed to load content")?;
    tracing::info!(
        "Loaded {} pages ({} excluded)",
        site.pages().len(),
        site.excluded.len()
    );

    let generator = Generator::new(quire, &site)?;
    let summary = generator.generate(&site)?;

    let duration = start.elapsed();
    tracing::info!("Built in {:.2}s", duration.as_secs_f64());
    Ok(summary)
}

/// Paths whose changes trigger a rebuild
pub fn watch_paths(quire: &Quire) -> Vec<(PathBuf, RecursiveMode)> {
    let mut paths: Vec<(PathBuf, RecursiveMode)> = [
        &quire.content_dir,
        &quire.layouts_dir,
        &quire.static_dir,
    ]
    .into_iter()
    .filter(|dir| dir.exists())
    .map(|dir| (dir.clone(), RecursiveMode::Recursive))
    .collect();

    if let Some(config_path) = &quire.config_path {
        paths.push((config_path.clone(), RecursiveMode::NonRecursive));
    }
    paths
}

/// Editor droppings and VCS files never trigger a rebuild
fn is_relevant(event: &DebouncedEvent) -> bool {
    let path_str = event.path.to_string_lossy();
    !path_str.contains(".git")
        && !path_str.contains(".DS_Store")
        && !path_str.contains("node_modules")
        && !path_str.ends_with('~')
        && !path_str.ends_with(".swp")
}

/// Rebuild on every change until the watcher goes away
///
/// The site is reopened for each build so config edits apply. `on_build`
/// runs after every successful rebuild. Blocks the calling thread.
pub fn watch<F>(base_dir: &Path, options: &BuildOptions, on_build: F) -> Result<()>
where
    F: Fn(&BuildSummary),
{
    let quire = options.open(base_dir)?;
    let (tx, rx) = channel();

    // Create debouncer to avoid multiple rapid rebuilds
    let mut debouncer = new_debouncer(Duration::from_millis(300), tx)?;
    for (path, mode) in watch_paths(&quire) {
        debouncer
            .watcher()
            .watch(&path, mode)
            .with_context(|| format!("Failed to watch {:?}", path))?;
        tracing::debug!("Watching: {:?}", path);
    }

    tracing::info!("Watching for changes. Press Ctrl+C to stop.");

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant: Vec<_> = events.iter().filter(|e| is_relevant(e)).collect();
                if relevant.is_empty() {
                    continue;
                }
                for event in &relevant {
                    tracing::info!("Changed: {}", event.path.display());
                }

                match options.open(base_dir).and_then(|quire| run(&quire)) {
                    Ok(summary) => on_build(&summary),
                    Err(e) => tracing::error!("Build failed: {:#}", e),
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::debug!("Watcher closed: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_options_override_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "baseURL = \"https://notes.example.com/\"\n",
        )
        .unwrap();

        let quire = BuildOptions::default().open(dir.path()).unwrap();
        assert!(!quire.config.build_drafts);
        assert_eq!(quire.config.base_url, "https://notes.example.com/");

        let options = BuildOptions {
            drafts: true,
            future: true,
            expired: false,
            base_url: Some("http://127.0.0.1:1313/".to_string()),
        };
        let quire = options.open(dir.path()).unwrap();
        assert!(quire.config.build_drafts);
        assert!(quire.config.build_future);
        assert!(!quire.config.build_expired);
        assert_eq!(quire.config.base_url, "http://127.0.0.1:1313/");
    }

    #[test]
    fn test_run_builds_site() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(content.join("go")).unwrap();
        fs::write(content.join("_index.md"), "---\ntitle: Home\n---\n").unwrap();
        fs::write(
            content.join("go/errors.md"),
            "---\ntitle: Errors\ndate: 2024-01-01\n---\nWrap them.\n",
        )
        .unwrap();

        let quire = Quire::new(dir.path()).unwrap();
        let summary = run(&quire).unwrap();
        assert_eq!(summary.pages, 1);
        assert!(quire.public_dir.join("go/errors/index.html").is_file());
    }

    #[test]
    fn test_run_reports_broken_front_matter() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        fs::create_dir_all(&content).unwrap();
        fs::write(content.join("bad.md"), "+++\ntitle = \n+++\n").unwrap();

        let quire = Quire::new(dir.path()).unwrap();
        let err = run(&quire).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.md"));
        assert!(!quire.public_dir.exists());
    }

    #[test]
    fn test_watch_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("content")).unwrap();
        fs::write(dir.path().join("config.toml"), "title = \"x\"\n").unwrap();

        let quire = Quire::new(dir.path()).unwrap();
        let paths: Vec<_> = watch_paths(&quire).into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![dir.path().join("content"), dir.path().join("config.toml")]
        );
    }
}
