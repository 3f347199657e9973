//! Section tree
//!
//! Sections mirror the directories under `content/`. The content root is the
//! home section; every directory holding an `_index.md` or at least one page
//! is a section below it. Sections without an `_index.md` get a synthesized
//! index page.

use std::collections::{BTreeSet, HashMap};

use super::Page;

/// A directory of content pages
#[derive(Debug, Clone)]
pub struct Section {
    /// Section path relative to the content dir, empty for home
    pub path: String,
    /// `_index.md` page (kind `Home` or `Section`)
    pub index: Page,
    /// Regular pages directly inside this section
    pub pages: Vec<Page>,
    /// Child sections
    pub sections: Vec<Section>,
}

impl Section {
    /// Assemble the tree from section indexes and regular pages
    ///
    /// `synthesize` creates an index for section paths that have none.
    pub fn build<F>(indexes: Vec<Page>, pages: Vec<Page>, synthesize: F) -> Section
    where
        F: Fn(&str) -> Page,
    {
        let mut index_map: HashMap<String, Page> = indexes
            .into_iter()
            .map(|page| (page.section.clone(), page))
            .collect();

        let mut page_map: HashMap<String, Vec<Page>> = HashMap::new();
        for page in pages {
            page_map.entry(page.section.clone()).or_default().push(page);
        }

        let mut paths: BTreeSet<String> = BTreeSet::new();
        for path in index_map.keys().chain(page_map.keys()) {
            let mut current = path.as_str();
            while !current.is_empty() {
                paths.insert(current.to_string());
                current = parent_path(current);
            }
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for path in &paths {
            children
                .entry(parent_path(path).to_string())
                .or_default()
                .push(path.clone());
        }

        let mut root = assemble("", &mut index_map, &mut page_map, &children, &synthesize);
        root.sort();
        root
    }

    /// Section title, from its index page
    pub fn title(&self) -> &str {
        &self.index.title
    }

    /// Find a section by path (`go/idioms`, `/go/idioms/`, or empty for home)
    pub fn find(&self, path: &str) -> Option<&Section> {
        let path = path.trim_matches('/');
        if self.path == path {
            return Some(self);
        }
        if !self.path.is_empty() && !path.starts_with(&format!("{}/", self.path)) {
            return None;
        }
        self.sections.iter().find_map(|s| s.find(path))
    }

    /// Visit every section depth-first, pre-order
    pub fn walk<'a, F: FnMut(&'a Section, usize)>(&'a self, mut visitor: F) {
        fn go<'a, F: FnMut(&'a Section, usize)>(section: &'a Section, depth: usize, visitor: &mut F) {
            visitor(section, depth);
            for child in &section.sections {
                go(child, depth + 1, visitor);
            }
        }
        go(self, 0, &mut visitor);
    }

    /// Regular pages of this section and every descendant, sorted
    pub fn regular_pages_recursive(&self) -> Vec<&Page> {
        let mut pages = Vec::new();
        self.walk(|section, _| pages.extend(section.pages.iter()));
        pages.sort_by(|a, b| Page::compare_order(a, b));
        pages
    }

    /// Every page in the tree: section indexes and regular pages
    pub fn all_pages(&self) -> Vec<&Page> {
        let mut pages = Vec::new();
        self.walk(|section, _| {
            pages.push(&section.index);
            pages.extend(section.pages.iter());
        });
        pages
    }

    /// Sections from the root down to `path`, both included
    pub fn ancestors(&self, path: &str) -> Vec<&Section> {
        let path = path.trim_matches('/');
        let mut chain = vec![self];
        let mut current = self;
        while current.path != path {
            match current.sections.iter().find(|s| {
                path == s.path || path.starts_with(&format!("{}/", s.path))
            }) {
                Some(next) => {
                    chain.push(next);
                    current = next;
                }
                None => return Vec::new(),
            }
        }
        chain
    }

    /// Previous and next regular page around `source` inside its section
    pub fn siblings(&self, source: &str) -> (Option<&Page>, Option<&Page>) {
        let pos = match self.pages.iter().position(|p| p.source == source) {
            Some(pos) => pos,
            None => return (None, None),
        };
        let prev = pos.checked_sub(1).and_then(|i| self.pages.get(i));
        let next = self.pages.get(pos + 1);
        (prev, next)
    }

    /// Sort pages and child sections at every level
    pub fn sort(&mut self) {
        self.pages.sort_by(Page::compare_order);
        self.sections
            .sort_by(|a, b| Page::compare_order(&a.index, &b.index));
        for child in &mut self.sections {
            child.sort();
        }
    }
}

fn assemble<F>(
    path: &str,
    index_map: &mut HashMap<String, Page>,
    page_map: &mut HashMap<String, Vec<Page>>,
    children: &HashMap<String, Vec<String>>,
    synthesize: &F,
) -> Section
where
    F: Fn(&str) -> Page,
{
    let index = index_map
        .remove(path)
        .unwrap_or_else(|| synthesize(path));
    let pages = page_map.remove(path).unwrap_or_default();
    let sections = children
        .get(path)
        .map(|paths| {
            paths
                .iter()
                .map(|child| assemble(child, index_map, page_map, children, synthesize))
                .collect()
        })
        .unwrap_or_default();

    Section {
        path: path.to_string(),
        index,
        pages,
        sections,
    }
}

/// `a/b/c` -> `a/b`, `a` -> ``
pub(crate) fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}
