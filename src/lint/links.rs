//! Internal link checks: broken targets, missing fragments, links to drafts

use glob::Pattern;
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::{Report, Rule};
use crate::content::{Exclusion, Page, Site};
use crate::helpers::{is_external, join_url, resolve_path};
use crate::Quire;

lazy_static! {
    static ref LINK_RE: Regex = Regex::new(r#"(?:href|src)\s*=\s*["']([^"']*)["']"#).unwrap();
    static ref ID_RE: Regex = Regex::new(r#"\sid\s*=\s*["']([^"']+)["']"#).unwrap();
}

/// Files the generator writes besides pages
const GENERATED: &[&str] = &[
    "/index.xml",
    "/sitemap.xml",
    "/search.json",
    "/404.html",
    "/css/style.css",
];

/// Every site path a link may point at, with the anchors of each page
pub struct LinkIndex {
    targets: HashSet<String>,
    anchors: HashMap<String, HashSet<String>>,
    unpublished: HashMap<String, (String, Exclusion)>,
    ignore: Vec<Pattern>,
}

impl LinkIndex {
    pub fn new(quire: &Quire, site: &Site) -> Self {
        let config = &quire.config;
        let mut targets: HashSet<String> = GENERATED.iter().map(|s| s.to_string()).collect();
        let mut anchors = HashMap::new();

        for page in site.pages() {
            targets.insert(page.url.clone());
            targets.extend(page.aliases.iter().cloned());
            targets.extend(page.resources.iter().map(|r| r.url.clone()));
            anchors.insert(page.url.clone(), anchors_of(page));
        }

        site.root.walk(|section, _| {
            let pages = section.pages.len();
            let total = pages.div_ceil(config.paginate.max(1));
            for n in 2..=total {
                targets.insert(format!("{}page/{}/", section.index.url, n));
            }
        });

        targets.insert(join_url(&[config.tags_dir.as_str()], true));
        for term in site.tags() {
            targets.insert(join_url(&[config.tags_dir.as_str(), term.slug.as_str()], true));
        }

        // Static files are checked on disk when a link is resolved
        let unpublished = site
            .excluded
            .iter()
            .map(|p| (p.url.clone(), (p.title.clone(), p.reason)))
            .collect();

        let ignore = config
            .lint
            .ignore
            .iter()
            .filter_map(|pattern| match Pattern::new(pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!("Ignoring invalid lint.ignore pattern {:?}: {}", pattern, e);
                    None
                }
            })
            .collect();

        Self {
            targets,
            anchors,
            unpublished,
            ignore,
        }
    }

    fn is_ignored(&self, link: &str, path: &str) -> bool {
        self.ignore
            .iter()
            .any(|p| p.matches(link) || p.matches(path))
    }

    /// The known target a path refers to, trying the directory form too
    fn lookup(&self, path: &str) -> Option<String> {
        let mut candidates = vec![path.to_string()];
        if let Some(dir) = path.strip_suffix("index.html") {
            candidates.push(dir.to_string());
        }
        if !path.ends_with('/') {
            candidates.push(format!("{}/", path));
        }
        candidates.into_iter().find(|c| self.targets.contains(c))
    }
}

/// Heading ids plus every other `id` attribute in the content
fn anchors_of(page: &Page) -> HashSet<String> {
    let mut ids: HashSet<String> = page.headings.iter().map(|h| h.id.clone()).collect();
    for cap in ID_RE.captures_iter(&page.content) {
        ids.insert(cap[1].to_string());
    }
    ids
}

/// Link targets found in rendered HTML, in document order
pub(crate) fn extract_links(html: &str) -> Vec<String> {
    LINK_RE
        .captures_iter(html)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}

fn is_checkable(link: &str) -> bool {
    !(link.is_empty()
        || is_external(link)
        || link.starts_with("mailto:")
        || link.starts_with("tel:")
        || link.starts_with("data:")
        || link.starts_with("javascript:"))
}

/// Check every internal link of a page
pub(crate) fn check(quire: &Quire, index: &LinkIndex, page: &Page, report: &mut Report) {
    let root = quire.config.root();
    let check_fragments = quire.config.lint.check_fragments;

    for link in extract_links(&page.content) {
        if !is_checkable(&link) {
            continue;
        }

        let (target, fragment) = match link.split_once('#') {
            Some((t, f)) => (t, Some(f)),
            None => (link.as_str(), None),
        };
        let target = target.split('?').next().unwrap_or_default();

        // A bare `#fragment` points into the page itself
        let path = if target.is_empty() {
            page.url.clone()
        } else {
            let decoded = percent_decode_str(target).decode_utf8_lossy().to_string();
            let resolved = resolve_path(&page.url, &decoded);
            match resolved.strip_prefix(root.trim_end_matches('/')) {
                Some(rest) if root != "/" && rest.starts_with('/') => rest.to_string(),
                _ => resolved,
            }
        };

        if index.is_ignored(&link, &path) {
            continue;
        }

        if let Some((title, reason)) = index
            .unpublished
            .get(&path)
            .or_else(|| index.unpublished.get(&format!("{}/", path)))
        {
            match reason {
                Exclusion::Draft => report.error(
                    Rule::DraftLink,
                    &page.source,
                    format!("link to draft page {:?} ({})", title, link),
                ),
                Exclusion::Future | Exclusion::Expired => report.error(
                    Rule::BrokenLink,
                    &page.source,
                    format!(
                        "link to unpublished page {:?} ({}, {})",
                        title,
                        link,
                        if *reason == Exclusion::Future { "future" } else { "expired" }
                    ),
                ),
            }
            continue;
        }

        let found = index.lookup(&path);
        let exists = found.is_some()
            || quire
                .static_dir
                .join(path.trim_start_matches('/'))
                .is_file();
        if !exists {
            report.error(
                Rule::BrokenLink,
                &page.source,
                format!("link target not found: {}", link),
            );
            continue;
        }

        let (Some(fragment), true) = (fragment, check_fragments) else {
            continue;
        };
        if fragment.is_empty() {
            continue;
        }
        let anchors = found.as_ref().and_then(|url| index.anchors.get(url));
        if let Some(anchors) = anchors {
            let fragment = percent_decode_str(fragment).decode_utf8_lossy();
            if !anchors.contains(fragment.as_ref()) {
                report.warning(
                    Rule::BrokenLink,
                    &page.source,
                    format!("no heading #{} in {}", fragment, path),
                );
            }
        }
    }
}
