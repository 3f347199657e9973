//! Page model

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::path::PathBuf;

use super::{Heading, Resources};
use crate::helpers::reading_time;
use crate::menu::{weight_order, PageMenus};

/// What a page renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// The content root (`content/_index.md`)
    Home,
    /// A section index (`<dir>/_index.md`, or synthesized)
    Section,
    /// A regular content page
    Page,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Home => "home",
            PageKind::Section => "section",
            PageKind::Page => "page",
        }
    }
}

/// A content page
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub kind: PageKind,

    /// Page title
    pub title: String,

    /// Short title for menus and breadcrumbs
    pub link_title: Option<String>,

    pub description: Option<String>,

    pub date: Option<DateTime<FixedOffset>>,
    pub lastmod: Option<DateTime<FixedOffset>>,
    pub publish_date: Option<DateTime<FixedOffset>>,
    pub expiry_date: Option<DateTime<FixedOffset>>,

    /// Sort key among siblings, 0 means unset
    pub weight: i64,

    pub draft: bool,

    pub tags: Vec<String>,

    /// Old URLs redirecting here
    pub aliases: Vec<String>,

    /// Layout template override
    pub layout: Option<String>,

    /// Whether the table of contents is rendered
    pub toc_enabled: bool,

    #[serde(skip)]
    pub menus: Option<PageMenus>,

    /// Markdown body without front matter
    #[serde(skip)]
    pub raw: String,

    /// Rendered HTML content
    pub content: String,

    /// Rendered summary
    pub summary: String,

    /// Whether content continues past the summary
    pub truncated: bool,

    /// Heading outline of the content
    pub headings: Vec<Heading>,

    pub word_count: usize,

    /// Source path relative to the content dir, `/`-separated
    pub source: String,

    #[serde(skip)]
    pub full_source: PathBuf,

    /// Section path, `/`-separated, empty for top-level content
    pub section: String,

    /// Site path, e.g. `/go/errors/`
    pub url: String,

    /// Absolute URL
    pub permalink: String,

    pub resources: Resources,

    /// Front-matter keys that are not known fields
    pub params: IndexMap<String, serde_json::Value>,
}

impl Page {
    /// Create a page with defaults for everything but kind, title and source
    pub fn new(kind: PageKind, title: String, source: String) -> Self {
        Self {
            kind,
            title,
            link_title: None,
            description: None,
            date: None,
            lastmod: None,
            publish_date: None,
            expiry_date: None,
            weight: 0,
            draft: false,
            tags: Vec::new(),
            aliases: Vec::new(),
            layout: None,
            toc_enabled: true,
            menus: None,
            raw: String::new(),
            content: String::new(),
            summary: String::new(),
            truncated: false,
            headings: Vec::new(),
            word_count: 0,
            full_source: PathBuf::from(&source),
            source,
            section: String::new(),
            url: "/".to_string(),
            permalink: String::new(),
            resources: Resources::default(),
            params: IndexMap::new(),
        }
    }

    /// `linkTitle`, or the title when unset
    pub fn link_title(&self) -> &str {
        self.link_title.as_deref().unwrap_or(&self.title)
    }

    pub fn is_home(&self) -> bool {
        self.kind == PageKind::Home
    }

    pub fn is_section(&self) -> bool {
        self.kind == PageKind::Section
    }

    pub fn is_page(&self) -> bool {
        self.kind == PageKind::Page
    }

    pub fn is_draft(&self) -> bool {
        self.draft
    }

    /// Top-level section name, empty for the home page and root pages
    pub fn first_section(&self) -> &str {
        self.section.split('/').next().unwrap_or("")
    }

    /// Minutes to read
    pub fn reading_time(&self) -> usize {
        reading_time(self.word_count)
    }

    /// Page param, falling back to the site params
    pub fn param<'a>(
        &'a self,
        key: &str,
        site_params: &'a IndexMap<String, serde_json::Value>,
    ) -> Option<&'a serde_json::Value> {
        self.params.get(key).or_else(|| site_params.get(key))
    }

    /// Date the page goes live: `publishDate`, else `date`
    pub fn effective_publish_date(&self) -> Option<&DateTime<FixedOffset>> {
        self.publish_date.as_ref().or(self.date.as_ref())
    }

    /// Whether the page is not published yet at `now`
    pub fn is_future(&self, now: &DateTime<FixedOffset>) -> bool {
        self.effective_publish_date().is_some_and(|d| d > now)
    }

    /// Whether the page has expired at `now`
    pub fn is_expired(&self, now: &DateTime<FixedOffset>) -> bool {
        self.expiry_date.as_ref().is_some_and(|d| d <= now)
    }

    /// Output path relative to the public dir, e.g. `go/errors/index.html`
    pub fn output_path(&self) -> PathBuf {
        let trimmed = self.url.trim_matches('/');
        if trimmed.is_empty() {
            PathBuf::from("index.html")
        } else if trimmed.ends_with(".html") {
            PathBuf::from(trimmed)
        } else {
            PathBuf::from(trimmed).join("index.html")
        }
    }

    /// Sibling order: weight (0 last), newest first, link title, source
    pub fn compare_order(a: &Page, b: &Page) -> Ordering {
        weight_order(a.weight, b.weight)
            .then_with(|| match (&a.date, &b.date) {
                (Some(a), Some(b)) => b.cmp(a),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| {
                a.link_title()
                    .to_lowercase()
                    .cmp(&b.link_title().to_lowercase())
            })
            .then_with(|| a.source.cmp(&b.source))
    }
}
