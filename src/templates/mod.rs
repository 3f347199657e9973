//! Built-in theme templates using the Tera template engine
//!
//! The default theme is embedded in the binary. Any `*.html` file in the
//! site's `layouts/` directory replaces the embedded template of the same
//! name, or adds a new one (e.g. `go/single.html` or a custom `layout`).

use anyhow::{Context as _, Result};
use chrono::DateTime;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use walkdir::WalkDir;

use crate::config::SiteConfig;
use crate::content::{Page, Resource, Section, Term};
use crate::helpers::{self, Helpers};

/// Embedded default theme, `(name, source)`
const THEME: &[(&str, &str)] = &[
    ("base.html", include_str!("theme/base.html")),
    ("home.html", include_str!("theme/home.html")),
    ("section.html", include_str!("theme/section.html")),
    ("single.html", include_str!("theme/single.html")),
    ("taxonomy.html", include_str!("theme/taxonomy.html")),
    ("term.html", include_str!("theme/term.html")),
    ("404.html", include_str!("theme/404.html")),
    ("alias.html", include_str!("theme/alias.html")),
    // Partials
    ("partials/head.html", include_str!("theme/partials/head.html")),
    ("partials/menu.html", include_str!("theme/partials/menu.html")),
    (
        "partials/breadcrumbs.html",
        include_str!("theme/partials/breadcrumbs.html"),
    ),
    (
        "partials/pagination.html",
        include_str!("theme/partials/pagination.html"),
    ),
    (
        "partials/resources.html",
        include_str!("theme/partials/resources.html"),
    ),
    (
        "partials/page_meta.html",
        include_str!("theme/partials/page_meta.html"),
    ),
];

/// Stylesheet of the embedded theme, written to `css/style.css` unless the site ships one
pub const STYLESHEET: &str = include_str!("theme/style.css");

/// Template renderer with the embedded theme and site overrides
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Load the embedded theme, then the overrides found in `layouts_dir`
    pub fn new(config: &SiteConfig, layouts_dir: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();

        // Content is rendered HTML and must not be escaped
        tera.autoescape_on(vec![]);

        tera.add_raw_templates(THEME.to_vec())
            .context("Failed to load embedded theme")?;

        if let Some(dir) = layouts_dir {
            let overrides = find_layouts(dir);
            if !overrides.is_empty() {
                tracing::debug!("Loading {} layout override(s) from {:?}", overrides.len(), dir);
                tera.add_template_files(
                    overrides
                        .into_iter()
                        .map(|(path, name)| (path, Some(name)))
                        .collect::<Vec<(PathBuf, Option<String>)>>(),
                )
                .with_context(|| format!("Failed to load layouts from {:?}", dir))?;
            }
        }

        // Register custom filters
        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("date_format", date_format_filter);
        tera.register_filter("urlize", urlize_filter);

        let rel_config = config.clone();
        tera.register_filter(
            "relurl",
            move |value: &tera::Value, _: &HashMap<String, tera::Value>| {
                let s = tera::try_get_value!("relurl", "value", String, value);
                Ok(tera::Value::String(helpers::url_for(&rel_config, &s)))
            },
        );
        let abs_config = config.clone();
        tera.register_filter(
            "absurl",
            move |value: &tera::Value, _: &HashMap<String, tera::Value>| {
                let s = tera::try_get_value!("absurl", "value", String, value);
                Ok(tera::Value::String(helpers::full_url_for(&abs_config, &s)))
            },
        );

        Ok(Self { tera })
    }

    /// Whether a template with this name is loaded
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// First loaded template among `candidates`
    pub fn lookup<'a>(&self, candidates: &'a [String]) -> Option<&'a str> {
        candidates
            .iter()
            .find(|name| self.has_template(name))
            .map(|name| name.as_str())
    }

    /// Template for a regular page
    pub fn page_template(&self, page: &Page) -> String {
        let mut candidates = Vec::new();
        if let Some(layout) = &page.layout {
            candidates.push(format!("{}.html", layout));
        }
        if !page.first_section().is_empty() {
            candidates.push(format!("{}/single.html", page.first_section()));
        }
        candidates.push("single.html".to_string());
        self.lookup(&candidates).unwrap_or("single.html").to_string()
    }

    /// Template for a section list page
    pub fn section_template(&self, section: &Section) -> String {
        let mut candidates = Vec::new();
        if let Some(layout) = &section.index.layout {
            candidates.push(format!("{}.html", layout));
        }
        if !section.index.first_section().is_empty() {
            candidates.push(format!("{}/list.html", section.index.first_section()));
        }
        candidates.push("section.html".to_string());
        self.lookup(&candidates).unwrap_or("section.html").to_string()
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        self.tera
            .render(template_name, context)
            .with_context(|| format!("Failed to render template {}", template_name))
    }
}

/// `*.html` files under `dir`, named by their `/`-separated relative path
fn find_layouts(dir: &Path) -> Vec<(PathBuf, String)> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "html"))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((e.path().to_path_buf(), name))
        })
        .collect()
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(helpers::strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };
    Ok(tera::Value::String(helpers::truncate(
        s.trim(),
        length,
        Some(&omission),
    )))
}

/// Tera filter: reformat an RFC 3339 date with a Go-style layout
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let layout = match args.get("layout") {
        Some(val) => tera::try_get_value!("date_format", "layout", String, val),
        None => helpers::DEFAULT_DATE_LAYOUT.to_string(),
    };

    match DateTime::parse_from_rfc3339(&s) {
        Ok(date) => Ok(tera::Value::String(helpers::format_date(&date, &layout))),
        // Already formatted, leave as-is
        Err(_) => Ok(tera::Value::String(s)),
    }
}

/// Tera filter: text to URL path fragment
fn urlize_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("urlize", "value", String, value);
    Ok(tera::Value::String(helpers::urlize(&s)))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub language_code: String,
    pub base_url: String,
    pub root: String,
    pub generator: String,
    pub params: IndexMap<String, serde_json::Value>,
}

impl SiteData {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language_code: config.language_code.clone(),
            base_url: config.base_url.clone(),
            root: config.root(),
            generator: helpers::meta_generator(),
            params: config.params.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub url: String,
}

/// The page being rendered
#[derive(Debug, Clone, Serialize)]
pub struct PageData {
    pub kind: String,
    pub title: String,
    pub link_title: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub date_iso: Option<String>,
    pub lastmod: Option<String>,
    pub url: String,
    pub permalink: String,
    pub content: String,
    pub summary: String,
    pub truncated: bool,
    pub toc: Option<String>,
    pub tags: Vec<TagLink>,
    pub section: String,
    pub first_section: String,
    pub weight: i64,
    pub draft: bool,
    pub word_count: usize,
    pub reading_time: usize,
    pub resources: Vec<Resource>,
    pub params: IndexMap<String, serde_json::Value>,
}

impl PageData {
    pub fn new(page: &Page, helper: &Helpers, config: &SiteConfig) -> Self {
        let toc = if page.toc_enabled && page.is_page() {
            Some(helpers::toc(&page.headings, 3)).filter(|t| !t.is_empty())
        } else {
            None
        };

        // Page params fall back to site params
        let mut params = config.params.clone();
        for (key, value) in &page.params {
            params.insert(key.clone(), value.clone());
        }

        Self {
            kind: page.kind.as_str().to_string(),
            title: page.title.clone(),
            link_title: page.link_title().to_string(),
            description: page.description.clone(),
            date: page.date.as_ref().map(|d| helper.date(d, None)),
            date_iso: page.date.as_ref().map(helpers::date_xml),
            lastmod: page.lastmod.as_ref().map(|d| helper.date(d, None)),
            url: helper.url_for(&page.url),
            permalink: page.permalink.clone(),
            content: page.content.clone(),
            summary: page.summary.clone(),
            truncated: page.truncated,
            toc,
            tags: page
                .tags
                .iter()
                .map(|tag| TagLink {
                    name: tag.clone(),
                    url: helper.url_for(&helpers::join_url(
                        &[config.tags_dir.as_str(), tag.as_str()],
                        true,
                    )),
                })
                .collect(),
            section: page.section.clone(),
            first_section: page.first_section().to_string(),
            weight: page.weight,
            draft: page.draft,
            word_count: page.word_count,
            reading_time: page.reading_time(),
            resources: page.resources.iter().cloned().collect(),
            params,
        }
    }
}

/// A page in a list, or a prev/next link
#[derive(Debug, Clone, Serialize)]
pub struct NavPage {
    pub title: String,
    pub url: String,
    pub date: Option<String>,
    pub date_iso: Option<String>,
    pub description: Option<String>,
    pub summary: String,
    pub section: String,
    pub reading_time: usize,
}

impl NavPage {
    pub fn new(page: &Page, helper: &Helpers) -> Self {
        Self {
            title: page.link_title().to_string(),
            url: helper.url_for(&page.url),
            date: page.date.as_ref().map(|d| helper.date(d, None)),
            date_iso: page.date.as_ref().map(helpers::date_xml),
            description: page.description.clone(),
            summary: page.summary.clone(),
            section: page.section.clone(),
            reading_time: page.reading_time(),
        }
    }
}

/// A section in a list
#[derive(Debug, Clone, Serialize)]
pub struct SectionData {
    pub title: String,
    pub path: String,
    pub url: String,
    pub description: Option<String>,
    pub page_count: usize,
}

impl SectionData {
    pub fn new(section: &Section, helper: &Helpers) -> Self {
        Self {
            title: section.index.link_title().to_string(),
            path: section.path.clone(),
            url: helper.url_for(&section.index.url),
            description: section.index.description.clone(),
            page_count: section.regular_pages_recursive().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Breadcrumb {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PagerLink {
    pub number: usize,
    pub url: String,
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationData {
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub current: usize,
    pub current_url: String,
    pub prev_link: String,
    pub next_link: String,
    pub pagers: Vec<PagerLink>,
}

impl PaginationData {
    /// Pager for page `current` (1-based) of a list rooted at `base_url`
    ///
    /// Page 1 lives at `base_url`, page N at `base_url/page/N/`.
    pub fn new(base_url: &str, current: usize, per_page: usize, total_items: usize) -> Self {
        let total_pages = total_items.div_ceil(per_page).max(1);
        let link = |n: usize| {
            if n == 1 {
                base_url.to_string()
            } else {
                format!("{}page/{}/", base_url, n)
            }
        };

        Self {
            per_page,
            total_items,
            total_pages,
            current,
            current_url: link(current),
            prev_link: if current > 1 {
                link(current - 1)
            } else {
                String::new()
            },
            next_link: if current < total_pages {
                link(current + 1)
            } else {
                String::new()
            },
            pagers: (1..=total_pages)
                .map(|n| PagerLink {
                    number: n,
                    url: link(n),
                    current: n == current,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TermData {
    pub name: String,
    pub slug: String,
    pub url: String,
    pub count: usize,
    pub pages: Vec<NavPage>,
}

impl TermData {
    pub fn new(term: &Term<'_>, helper: &Helpers, tags_dir: &str) -> Self {
        Self {
            name: term.name.clone(),
            slug: term.slug.clone(),
            url: helper.url_for(&helpers::join_url(&[tags_dir, term.slug.as_str()], false)),
            count: term.pages.len(),
            pages: term.pages.iter().map(|p| NavPage::new(p, helper)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PageKind;
    use crate::menu::MenuItemData;
    use std::fs;

    fn page_context(config: &SiteConfig, page: &Page) -> Context {
        let helpers = Helpers::new(config.clone());
        let mut context = Context::new();
        context.insert("site", &SiteData::new(config));
        context.insert("page", &PageData::new(page, &helpers, config));
        context.insert("main_menu", &Vec::<MenuItemData>::new());
        context.insert("breadcrumbs", &Vec::<Breadcrumb>::new());
        context.insert("prev", &None::<NavPage>);
        context.insert("next", &None::<NavPage>);
        context.insert("now_year", "2024");
        context
    }

    #[test]
    fn test_embedded_theme_renders_single() {
        let config = SiteConfig::default();
        let renderer = TemplateRenderer::new(&config, None).unwrap();
        assert!(renderer.has_template("partials/menu.html"));

        let mut page = Page::new(PageKind::Page, "Timeouts".to_string(), "http/timeouts.md".to_string());
        page.url = "/http/timeouts/".to_string();
        page.content = "<p>Set deadlines.</p>".to_string();
        page.section = "http".to_string();

        let context = page_context(&config, &page);
        let html = renderer.render("single.html", &context).unwrap();
        assert!(html.contains("<h1>Timeouts</h1>"));
        assert!(html.contains("<p>Set deadlines.</p>"));
        assert!(html.contains("<title>Timeouts | Notes</title>"));
    }

    #[test]
    fn test_layout_overrides_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("go")).unwrap();
        fs::write(dir.path().join("go/single.html"), "GO {{ page.title }}").unwrap();
        fs::write(dir.path().join("404.html"), "custom missing").unwrap();
        fs::write(dir.path().join("wide.html"), "WIDE {{ page.title }}").unwrap();

        let config = SiteConfig::default();
        let renderer = TemplateRenderer::new(&config, Some(dir.path())).unwrap();

        let mut page = Page::new(PageKind::Page, "Errors".to_string(), "go/errors.md".to_string());
        page.section = "go".to_string();
        assert_eq!(renderer.page_template(&page), "go/single.html");

        page.layout = Some("wide".to_string());
        assert_eq!(renderer.page_template(&page), "wide.html");

        page.layout = Some("missing".to_string());
        page.section = "css".to_string();
        assert_eq!(renderer.page_template(&page), "single.html");

        let context = page_context(&config, &page);
        assert_eq!(renderer.render("404.html", &context).unwrap(), "custom missing");
    }

    #[test]
    fn test_menu_macro_walks_children() {
        let config = SiteConfig::default();
        let renderer = TemplateRenderer::new(&config, None).unwrap();
        let page = Page::new(PageKind::Home, "Home".to_string(), "_index.md".to_string());

        let child = MenuItemData {
            identifier: "errors".to_string(),
            name: "Errors".to_string(),
            url: "/go/errors/".to_string(),
            pre: String::new(),
            post: String::new(),
            weight: 0,
            active: true,
            ancestor_active: false,
            children: Vec::new(),
        };
        let parent = MenuItemData {
            identifier: "go".to_string(),
            name: "Go".to_string(),
            url: "/go/".to_string(),
            pre: String::new(),
            post: String::new(),
            weight: 1,
            active: false,
            ancestor_active: true,
            children: vec![child],
        };

        let mut context = page_context(&config, &page);
        context.insert("main_menu", &vec![parent]);
        context.insert("sections", &Vec::<SectionData>::new());
        context.insert("recent", &Vec::<NavPage>::new());
        let html = renderer.render("home.html", &context).unwrap();

        assert!(html.contains("menu-depth-0"));
        assert!(html.contains("menu-depth-1"));
        assert!(html.contains(r#"<a href="/go/errors/" aria-current="page">Errors</a>"#));
        assert!(html.contains("menu-item ancestor"));
    }

    #[test]
    fn test_filters() {
        let config = SiteConfig {
            base_url: "https://example.com/kb/".to_string(),
            ..Default::default()
        };
        let mut renderer = TemplateRenderer::new(&config, None).unwrap();
        renderer
            .tera
            .add_raw_template(
                "filters.html",
                r#"{{ "/go/" | relurl }} {{ "/go/" | absurl }} {{ "<b>x</b>" | strip_html }} {{ "Hello World" | urlize }} {{ d | date_format(layout="2006-01-02") }} {{ long | truncate_chars(length=5, omission="~") }}"#,
            )
            .unwrap();

        let mut context = Context::new();
        context.insert("d", "2024-03-05T10:00:00+00:00");
        context.insert("long", "abcdefghij");
        let out = renderer.render("filters.html", &context).unwrap();
        assert_eq!(
            out,
            "/kb/go/ https://example.com/kb/go/ x hello-world 2024-03-05 abcd~"
        );
    }

    #[test]
    fn test_pagination_links() {
        let first = PaginationData::new("/go/", 1, 10, 25);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.prev_link, "");
        assert_eq!(first.next_link, "/go/page/2/");

        let last = PaginationData::new("/go/", 3, 10, 25);
        assert_eq!(last.prev_link, "/go/page/2/");
        assert_eq!(last.next_link, "");
        assert!(last.pagers[2].current);

        let empty = PaginationData::new("/go/", 1, 10, 0);
        assert_eq!(empty.total_pages, 1);
    }
}
