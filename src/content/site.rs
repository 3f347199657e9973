//! Loaded site: the section tree plus what the filters left out

use serde::Serialize;
use std::collections::BTreeMap;

use super::{Page, Section};

/// Why a page is not part of the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Exclusion {
    Draft,
    Future,
    Expired,
}

/// A page dropped by the draft/future/expired filters
#[derive(Debug, Clone)]
pub struct ExcludedPage {
    pub source: String,
    pub url: String,
    pub title: String,
    pub reason: Exclusion,
}

/// A taxonomy term with its pages
#[derive(Debug, Clone)]
pub struct Term<'a> {
    pub name: String,
    pub slug: String,
    pub pages: Vec<&'a Page>,
}

/// Content loaded from the content dir
#[derive(Debug, Clone)]
pub struct Site {
    /// Home section, root of the tree
    pub root: Section,
    pub excluded: Vec<ExcludedPage>,
}

impl Site {
    /// Every rendered page, section indexes included
    pub fn pages(&self) -> Vec<&Page> {
        self.root.all_pages()
    }

    /// Regular pages of the whole site in sibling order
    pub fn regular_pages(&self) -> Vec<&Page> {
        self.root.regular_pages_recursive()
    }

    /// Regular pages, newest first
    pub fn recent_pages(&self) -> Vec<&Page> {
        let mut pages = self.regular_pages();
        pages.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.source.cmp(&b.source)));
        pages
    }

    pub fn find_by_url(&self, url: &str) -> Option<&Page> {
        self.pages().into_iter().find(|p| p.url == url)
    }

    pub fn find_by_source(&self, source: &str) -> Option<&Page> {
        self.pages().into_iter().find(|p| p.source == source)
    }

    /// Section containing a regular page
    pub fn section_of(&self, page: &Page) -> Option<&Section> {
        self.root.find(&page.section)
    }

    /// Tags with their pages, sorted by term slug; pages in sibling order
    pub fn tags(&self) -> Vec<Term<'_>> {
        let mut terms: BTreeMap<String, Term<'_>> = BTreeMap::new();
        for page in self.regular_pages() {
            for tag in &page.tags {
                let slug = slug::slugify(tag);
                if slug.is_empty() {
                    continue;
                }
                let term = terms.entry(slug.clone()).or_insert_with(|| Term {
                    name: tag.clone(),
                    slug,
                    pages: Vec::new(),
                });
                if !term.pages.iter().any(|p| p.source == page.source) {
                    term.pages.push(page);
                }
            }
        }
        terms.into_values().collect()
    }

    /// Excluded page at `url`, if any
    pub fn excluded_at(&self, url: &str) -> Option<&ExcludedPage> {
        self.excluded.iter().find(|p| p.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PageKind;

    fn site() -> Site {
        let mut home = Page::new(PageKind::Home, "Home".to_string(), "_index.md".to_string());
        home.url = "/".to_string();

        let mut pages = Vec::new();
        for (title, tags) in [
            ("Errors", vec!["Go", "errors"]),
            ("Context", vec!["go"]),
            ("Untagged", vec![]),
        ] {
            let mut page = Page::new(
                PageKind::Page,
                title.to_string(),
                format!("go/{}.md", title.to_lowercase()),
            );
            page.section = "go".to_string();
            page.url = format!("/go/{}/", title.to_lowercase());
            page.tags = tags.into_iter().map(String::from).collect();
            pages.push(page);
        }

        let root = Section::build(vec![home], pages, |path| {
            let mut page = Page::new(PageKind::Section, path.to_string(), String::new());
            page.section = path.to_string();
            page.url = format!("/{}/", path);
            page
        });
        Site {
            root,
            excluded: vec![ExcludedPage {
                source: "go/wip.md".to_string(),
                url: "/go/wip/".to_string(),
                title: "WIP".to_string(),
                reason: Exclusion::Draft,
            }],
        }
    }

    #[test]
    fn test_lookup() {
        let site = site();
        assert_eq!(site.pages().len(), 5);
        assert_eq!(site.regular_pages().len(), 3);
        assert_eq!(site.find_by_url("/go/errors/").unwrap().title, "Errors");
        assert!(site.find_by_url("/go/").unwrap().is_section());
        assert_eq!(site.find_by_source("go/context.md").unwrap().title, "Context");

        let page = site.find_by_source("go/errors.md").unwrap();
        assert_eq!(site.section_of(page).unwrap().path, "go");

        assert_eq!(site.excluded_at("/go/wip/").unwrap().reason, Exclusion::Draft);
    }

    #[test]
    fn test_tags_merge_by_slug() {
        let site = site();
        let tags = site.tags();
        let slugs: Vec<_> = tags.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, vec!["errors", "go"]);

        let go = &tags[1];
        assert_eq!(go.pages.len(), 2);
    }
}
