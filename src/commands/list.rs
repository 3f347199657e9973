//! List site content

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use clap::ValueEnum;

use crate::content::{ContentLoader, Page};
use crate::Quire;

/// What `quire list` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListKind {
    /// Every page with its status
    All,
    Drafts,
    /// Pages whose publish date has not come yet
    Future,
    Expired,
    /// The section tree with page counts
    Sections,
}

/// One line of `quire list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub source: String,
    pub title: String,
    pub url: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub draft: bool,
    pub future: bool,
    pub expired: bool,
}

impl ListEntry {
    fn new(page: &Page, now: &DateTime<FixedOffset>) -> Self {
        Self {
            source: page.source.clone(),
            title: page.title.clone(),
            url: page.url.clone(),
            date: page.date,
            draft: page.draft,
            future: page.is_future(now),
            expired: page.is_expired(now),
        }
    }

    fn status(&self) -> String {
        let flags: Vec<&str> = [
            (self.draft, "draft"),
            (self.future, "future"),
            (self.expired, "expired"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        flags.join(",")
    }
}

/// Pages of `kind` at `now`, in site order; filters are ignored while loading
pub fn collect(quire: &Quire, kind: ListKind, now: DateTime<FixedOffset>) -> Result<Vec<ListEntry>> {
    let mut quire = quire.clone();
    quire.config.build_drafts = true;
    quire.config.build_future = true;
    quire.config.build_expired = true;

    let site = ContentLoader::new(&quire).with_now(now).load()?;
    let entries = site
        .pages()
        .into_iter()
        .filter(|p| kind == ListKind::All || p.is_page())
        .map(|p| ListEntry::new(p, &now))
        .filter(|e| match kind {
            ListKind::All | ListKind::Sections => true,
            ListKind::Drafts => e.draft,
            ListKind::Future => e.future,
            ListKind::Expired => e.expired,
        })
        .collect();
    Ok(entries)
}

/// Section tree lines: `(depth, title, url, regular page count)`
pub fn sections(quire: &Quire) -> Result<Vec<(usize, String, String, usize)>> {
    let site = ContentLoader::new(quire).load()?;
    let mut lines = Vec::new();
    site.root.walk(|section, depth| {
        lines.push((
            depth,
            section.title().to_string(),
            section.index.url.clone(),
            section.regular_pages_recursive().len(),
        ));
    });
    Ok(lines)
}

/// List site content by kind
pub fn run(quire: &Quire, kind: ListKind) -> Result<()> {
    if kind == ListKind::Sections {
        for (depth, title, url, count) in sections(quire)? {
            println!("{}{} {} ({})", "  ".repeat(depth), title, url, count);
        }
        return Ok(());
    }

    let now = Utc::now().fixed_offset();
    let entries = collect(quire, kind, now)?;
    println!("{:?} ({}):", kind, entries.len());
    for entry in entries {
        let date = entry
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        let status = entry.status();
        if status.is_empty() {
            println!("  {} {} {} [{}]", date, entry.title, entry.url, entry.source);
        } else {
            println!(
                "  {} {} {} [{}] ({})",
                date, entry.title, entry.url, entry.source, status
            );
        }
    }

    Ok(())
}
