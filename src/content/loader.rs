//! Content loader - walks the content directory and builds the section tree

use chrono::{DateTime, FixedOffset, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use super::site::{ExcludedPage, Exclusion};
use super::{
    FrontMatter, FrontMatterError, MarkdownRenderer, Page, PageKind, Resource, Resources, Section,
    Site,
};
use crate::helpers::{
    count_words, full_url_for, join_url, resolve_path, strip_html, truncate_words,
};
use crate::Quire;

/// Errors raised while loading content
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {source}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: failed to render markdown: {message}", .path.display())]
    Render { path: PathBuf, message: String },

    #[error("duplicate URL {url}: {first} and {second}")]
    DuplicateUrl {
        url: String,
        first: String,
        second: String,
    },

    #[error("{}", describe_failures(.0))]
    Multiple(Vec<LoadError>),
}

impl LoadError {
    /// Content-relative source the error is about, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            LoadError::FrontMatter { path, .. }
            | LoadError::Io { path, .. }
            | LoadError::Render { path, .. } => Some(path),
            LoadError::DuplicateUrl { .. } | LoadError::Multiple(_) => None,
        }
    }
}

fn describe_failures(failures: &[LoadError]) -> String {
    let mut out = format!("{} content file(s) failed to load:", failures.len());
    for failure in failures {
        let _ = write!(out, "\n  - {}", failure);
    }
    out
}

/// Everything the loader found, including files that failed
#[derive(Debug)]
pub struct LoadOutcome {
    pub site: Site,
    pub failures: Vec<LoadError>,
}

/// Markdown files and resources of the content dir, classified
#[derive(Debug, Default)]
struct Inventory {
    markdown: Vec<PathBuf>,
    /// Leaf bundle dir -> its index file
    leaf_bundles: BTreeMap<PathBuf, PathBuf>,
    /// Non-Markdown files
    assets: Vec<PathBuf>,
    /// Entries the walk could not read
    errors: Vec<LoadError>,
}

/// Loads content from the content directory
pub struct ContentLoader<'a> {
    quire: &'a Quire,
    renderer: MarkdownRenderer,
    now: DateTime<FixedOffset>,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(quire: &'a Quire) -> Self {
        let highlight = &quire.config.highlight;
        let renderer = MarkdownRenderer::with_options(&highlight.theme, highlight.line_numbers);
        Self {
            quire,
            renderer,
            now: Utc::now().fixed_offset(),
        }
    }

    /// Evaluate future/expired filters against a fixed instant
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    /// Load the site, failing with every broken file listed
    pub fn load(&self) -> Result<Site, LoadError> {
        let LoadOutcome { site, mut failures } = self.load_all();
        match failures.len() {
            0 => Ok(site),
            1 => Err(failures.remove(0)),
            _ => Err(LoadError::Multiple(failures)),
        }
    }

    /// Load every file it can, collecting failures instead of stopping
    pub fn load_all(&self) -> LoadOutcome {
        let content_dir = &self.quire.content_dir;
        let mut inventory = self.scan(content_dir);
        let mut failures = std::mem::take(&mut inventory.errors);

        // Resources grouped by the page that owns them
        let mut bundle_resources: HashMap<PathBuf, Vec<PathBuf>> = HashMap::new();
        for asset in &inventory.assets {
            match owner_of(asset, &inventory) {
                Some(owner) => bundle_resources.entry(owner).or_default().push(asset.clone()),
                None => tracing::debug!("Ignoring {:?}: not inside a bundle", asset),
            }
        }

        // Markdown inside a leaf bundle is a resource of that bundle
        let mut sources = Vec::new();
        for path in &inventory.markdown {
            match enclosing_leaf_bundle(path, &inventory) {
                Some(bundle) if inventory.leaf_bundles.get(&bundle) != Some(path) => {
                    bundle_resources
                        .entry(inventory.leaf_bundles[&bundle].clone())
                        .or_default()
                        .push(path.clone());
                }
                _ => sources.push(path),
            }
        }

        let mut indexes = Vec::new();
        let mut pages = Vec::new();
        let mut excluded = Vec::new();

        for path in sources {
            let resources = bundle_resources.remove(path).unwrap_or_default();
            let page = match self.load_page(path, &resources) {
                Ok(page) => page,
                Err(e) => {
                    tracing::debug!("Failed to load {:?}: {}", path, e);
                    failures.push(e);
                    continue;
                }
            };

            if let Some(reason) = self.exclusion(&page) {
                tracing::debug!("Skipping {} ({:?})", page.source, reason);
                excluded.push(ExcludedPage {
                    source: page.source.clone(),
                    url: page.url.clone(),
                    title: page.title.clone(),
                    reason,
                });
                continue;
            }

            match page.kind {
                PageKind::Page => pages.push(page),
                PageKind::Home | PageKind::Section => indexes.push(page),
            }
        }

        let root = Section::build(indexes, pages, |path| self.synthesize_index(path));
        let site = Site { root, excluded };

        failures.extend(duplicate_urls(&site));

        tracing::debug!(
            "Loaded {} pages ({} excluded, {} failed)",
            site.pages().len(),
            site.excluded.len(),
            failures.len()
        );

        LoadOutcome { site, failures }
    }

    /// Walk the content dir and classify what is in it
    fn scan(&self, content_dir: &Path) -> Inventory {
        let mut inventory = Inventory::default();
        if !content_dir.exists() {
            tracing::warn!("Content directory {:?} does not exist", content_dir);
            return inventory;
        }

        let walker = WalkDir::new(content_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Unreadable content entry: {}", e);
                    inventory.errors.push(walk_error(e, content_dir));
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if is_markdown_file(path) {
                if is_leaf_index(path) {
                    if let Some(dir) = path.parent() {
                        if dir != content_dir {
                            inventory
                                .leaf_bundles
                                .insert(dir.to_path_buf(), path.to_path_buf());
                        }
                    }
                }
                inventory.markdown.push(path.to_path_buf());
            } else {
                inventory.assets.push(path.to_path_buf());
            }
        }

        inventory
    }

    /// Load and render a single Markdown file
    fn load_page(&self, path: &Path, resource_files: &[PathBuf]) -> Result<Page, LoadError> {
        let config = &self.quire.config;
        let content_dir = &self.quire.content_dir;

        let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let (fm, body) = FrontMatter::parse(&content).map_err(|source| LoadError::FrontMatter {
            path: path.to_path_buf(),
            source,
        })?;
        let dates = fm
            .dates(config.tz())
            .map_err(|source| LoadError::FrontMatter {
                path: path.to_path_buf(),
                source,
            })?;

        let source = relative_source(path, content_dir);
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let dir = path.parent().unwrap_or(content_dir);
        let dir_rel = relative_source(dir, content_dir);

        let (kind, section, name) = if is_section_index(file_name) {
            let kind = if dir_rel.is_empty() {
                PageKind::Home
            } else {
                PageKind::Section
            };
            (kind, dir_rel.clone(), last_segment(&dir_rel).to_string())
        } else if is_leaf_index(path) && !dir_rel.is_empty() {
            let parent = super::section::parent_path(&dir_rel).to_string();
            (PageKind::Page, parent, last_segment(&dir_rel).to_string())
        } else {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("untitled")
                .to_string();
            (PageKind::Page, dir_rel.clone(), stem)
        };

        let title = fm.title.clone().unwrap_or_else(|| match kind {
            PageKind::Home => config.title.clone(),
            _ => title_from_name(&name),
        });

        let url = match &fm.url {
            Some(url) => normalize_url_override(url),
            None => match kind {
                PageKind::Home => "/".to_string(),
                PageKind::Section => join_url(&segments(&section), config.slugify_urls),
                PageKind::Page => {
                    let slug = fm.slug.clone().unwrap_or(name);
                    let mut parts = segments(&section);
                    parts.push(slug);
                    join_url(&parts, config.slugify_urls)
                }
            },
        };

        let (manual_summary, full_md) = MarkdownRenderer::split_summary(body);
        let rendered = self
            .renderer
            .render(&full_md)
            .map_err(|e| LoadError::Render {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let (summary, truncated) = match manual_summary {
            Some(md) => {
                let html = self
                    .renderer
                    .render(&md)
                    .map_err(|e| LoadError::Render {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })?
                    .html;
                (html, true)
            }
            None => truncate_words(&strip_html(&rendered.html), config.summary_length),
        };

        let lastmod = dates.lastmod.or_else(|| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .map(|t| DateTime::<Utc>::from(t).with_timezone(&config.tz()).fixed_offset())
        });

        let mut page = Page::new(kind, title, source);
        page.link_title = fm.link_title;
        page.description = fm.description;
        page.date = dates.date;
        page.lastmod = lastmod;
        page.publish_date = dates.publish_date;
        page.expiry_date = dates.expiry_date;
        page.weight = fm.weight;
        page.draft = fm.draft;
        page.tags = fm.tags;
        page.aliases = fm.aliases.iter().map(|a| normalize_url_override(a)).collect();
        page.layout = fm.layout;
        page.toc_enabled = fm.toc.unwrap_or(true);
        page.menus = fm.menu;
        page.raw = body.to_string();
        page.word_count = count_words(&rendered.html);
        page.content = rendered.html;
        page.headings = rendered.headings;
        page.summary = summary;
        page.truncated = truncated;
        page.full_source = path.to_path_buf();
        page.section = section;
        page.permalink = full_url_for(config, &url);
        page.resources = self.resources_for(path, &url, resource_files);
        page.url = url;
        page.params = fm.params;

        Ok(page)
    }

    fn resources_for(&self, index: &Path, url: &str, files: &[PathBuf]) -> Resources {
        let bundle_dir = index.parent().unwrap_or(&self.quire.content_dir);
        let resources = files
            .iter()
            .map(|file| {
                let name = relative_source(file, bundle_dir);
                let size = fs::metadata(file).map(|m| m.len()).unwrap_or(0);
                Resource::new(&name, file.clone(), url, &self.quire.config.base_url, size)
            })
            .collect();
        Resources::new(resources)
    }

    /// Index page for a section directory without `_index.md`
    fn synthesize_index(&self, path: &str) -> Page {
        let config = &self.quire.config;
        let (kind, title) = if path.is_empty() {
            (PageKind::Home, config.title.clone())
        } else {
            (PageKind::Section, title_from_name(last_segment(path)))
        };
        let source = if path.is_empty() {
            "_index.md".to_string()
        } else {
            format!("{}/_index.md", path)
        };

        let mut page = Page::new(kind, title, source);
        page.full_source = self.quire.content_dir.join(path).join("_index.md");
        page.section = path.to_string();
        page.url = join_url(&segments(path), config.slugify_urls);
        page.permalink = full_url_for(config, &page.url);
        page
    }

    /// Which filter, if any, keeps the page out of the build
    fn exclusion(&self, page: &Page) -> Option<Exclusion> {
        let config = &self.quire.config;
        if page.draft && !config.build_drafts {
            Some(Exclusion::Draft)
        } else if page.is_future(&self.now) && !config.build_future {
            Some(Exclusion::Future)
        } else if page.is_expired(&self.now) && !config.build_expired {
            Some(Exclusion::Expired)
        } else {
            None
        }
    }
}

/// Two pages, or a page and an alias, claiming the same URL
fn duplicate_urls(site: &Site) -> Vec<LoadError> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut errors = Vec::new();
    let mut reported = HashSet::new();

    for page in site.pages() {
        let claims = std::iter::once(page.url.as_str()).chain(page.aliases.iter().map(|a| a.as_str()));
        for url in claims {
            match seen.get(url) {
                Some(first) if *first != page.source.as_str() => {
                    if reported.insert(url) {
                        errors.push(LoadError::DuplicateUrl {
                            url: url.to_string(),
                            first: first.to_string(),
                            second: page.source.clone(),
                        });
                    }
                }
                Some(_) => {}
                None => {
                    seen.insert(url, page.source.as_str());
                }
            }
        }
    }

    errors
}

/// Page that owns a non-Markdown file
fn owner_of(asset: &Path, inventory: &Inventory) -> Option<PathBuf> {
    if let Some(bundle) = enclosing_leaf_bundle(asset, inventory) {
        return inventory.leaf_bundles.get(&bundle).cloned();
    }
    // Branch bundle: only files directly next to `_index.md`
    let dir = asset.parent()?;
    inventory
        .markdown
        .iter()
        .find(|md| {
            md.parent() == Some(dir)
                && md
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(is_section_index)
        })
        .cloned()
}

/// Closest ancestor directory of `path` that is a leaf bundle
fn enclosing_leaf_bundle(path: &Path, inventory: &Inventory) -> Option<PathBuf> {
    path.ancestors()
        .skip(1)
        .find(|dir| inventory.leaf_bundles.contains_key(*dir))
        .map(|dir| dir.to_path_buf())
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}

fn is_section_index(file_name: &str) -> bool {
    file_name == "_index.md" || file_name == "_index.markdown"
}

fn is_leaf_index(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some("index.md") | Some("index.markdown")
    )
}

/// Dotfiles and `_`-prefixed files are skipped, except section indexes
/// Dangling links, loops and unreadable dirs as a load failure
fn walk_error(error: walkdir::Error, content_dir: &Path) -> LoadError {
    let path = error
        .path()
        .unwrap_or(content_dir)
        .to_path_buf();
    let message = error.to_string();
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message));
    LoadError::Io { path, source }
}

fn is_hidden(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    name.starts_with('.') || (name.starts_with('_') && !is_section_index(name))
}

/// `/`-separated path relative to `base`, empty for `base` itself
fn relative_source(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `go-idioms` -> `Go idioms`
pub(crate) fn title_from_name(name: &str) -> String {
    let spaced = name.replace(['-', '_'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Untitled".to_string(),
    }
}

/// Front-matter `url`/`aliases` value as a site path; `..` stops at the root
fn normalize_url_override(url: &str) -> String {
    let resolved = resolve_path("/", url.trim());
    let trimmed = resolved.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.ends_with(".html") || trimmed.ends_with(".xml") {
        format!("/{}", trimmed)
    } else {
        format!("/{}/", trimmed)
    }
}
