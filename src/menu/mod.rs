//! Navigation menus
//!
//! Menus are assembled from two sources: `[[menu.<name>]]` entries in the
//! site config and `menu` settings in page front matter. Entries name their
//! parent by identifier; the builder nests them into a tree and sorts every
//! level by weight. Templates receive the tree with `active` flags computed
//! for the page being rendered and walk it recursively.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::content::Page;

/// Menu entry as written in the site config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuEntryConfig {
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    /// Content path such as `/go/idioms`, resolved to the page URL
    #[serde(alias = "pageRef")]
    pub page_ref: Option<String>,
    pub weight: i64,
    pub parent: Option<String>,
    pub pre: Option<String>,
    pub post: Option<String>,
}

/// Per-menu settings in a page's front matter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMenuConfig {
    pub identifier: Option<String>,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub weight: Option<i64>,
    pub pre: Option<String>,
    pub post: Option<String>,
}

/// The `menu` front-matter field: `"main"`, `["main", "footer"]` or a table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageMenus {
    Single(String),
    List(Vec<String>),
    Map(IndexMap<String, PageMenuConfig>),
}

impl PageMenus {
    /// Menu names with their settings
    pub fn entries(&self) -> Vec<(String, PageMenuConfig)> {
        match self {
            PageMenus::Single(name) => vec![(name.clone(), PageMenuConfig::default())],
            PageMenus::List(names) => names
                .iter()
                .map(|name| (name.clone(), PageMenuConfig::default()))
                .collect(),
            PageMenus::Map(map) => map
                .iter()
                .map(|(name, config)| (name.clone(), config.clone()))
                .collect(),
        }
    }
}

/// A resolved menu entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuEntry {
    pub identifier: String,
    pub name: String,
    pub url: String,
    pub weight: i64,
    pub parent: Option<String>,
    pub pre: String,
    pub post: String,
    /// Source path of the page that contributed this entry
    pub page: Option<String>,
    pub children: Vec<MenuEntry>,
}

impl MenuEntry {
    /// Whether this entry points at `url`
    pub fn is_current(&self, url: &str) -> bool {
        !self.url.is_empty() && normalize_url(&self.url) == normalize_url(url)
    }

    /// Whether any descendant points at `url`
    pub fn has_current(&self, url: &str) -> bool {
        self.children
            .iter()
            .any(|child| child.is_current(url) || child.has_current(url))
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    fn walk<F: FnMut(&MenuEntry, usize)>(&self, depth: usize, f: &mut F) {
        f(self, depth);
        for child in &self.children {
            child.walk(depth + 1, f);
        }
    }

    fn find(&self, identifier: &str) -> Option<&MenuEntry> {
        if self.identifier == identifier {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(identifier))
    }
}

/// A named menu: top-level entries with nested children
#[derive(Debug, Clone, Default, Serialize)]
pub struct Menu {
    pub entries: Vec<MenuEntry>,
}

impl Menu {
    /// Depth-first, pre-order walk; top-level entries have depth 0
    pub fn walk<F: FnMut(&MenuEntry, usize)>(&self, mut f: F) {
        for entry in &self.entries {
            entry.walk(0, &mut f);
        }
    }

    /// Find an entry anywhere in the tree
    pub fn find(&self, identifier: &str) -> Option<&MenuEntry> {
        self.entries.iter().find_map(|e| e.find(identifier))
    }

    /// Number of entries at every depth
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Template data with active flags for the page at `url`
    pub fn for_page(&self, url: &str) -> Vec<MenuItemData> {
        self.entries
            .iter()
            .map(|e| MenuItemData::from_entry(e, url))
            .collect()
    }
}

/// Menu entry as handed to templates
#[derive(Debug, Clone, Serialize)]
pub struct MenuItemData {
    pub identifier: String,
    pub name: String,
    pub url: String,
    pub pre: String,
    pub post: String,
    pub weight: i64,
    pub active: bool,
    pub ancestor_active: bool,
    pub children: Vec<MenuItemData>,
}

impl MenuItemData {
    fn from_entry(entry: &MenuEntry, url: &str) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            name: entry.name.clone(),
            url: entry.url.clone(),
            pre: entry.pre.clone(),
            post: entry.post.clone(),
            weight: entry.weight,
            active: entry.is_current(url),
            ancestor_active: entry.has_current(url),
            children: entry
                .children
                .iter()
                .map(|c| MenuItemData::from_entry(c, url))
                .collect(),
        }
    }
}

/// All menus of a site, in config order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Menus {
    menus: IndexMap<String, Menu>,
}

impl Menus {
    pub fn get(&self, name: &str) -> Option<&Menu> {
        self.menus.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.menus.keys().map(|k| k.as_str())
    }

    /// Template data for every menu with active flags for `url`
    pub fn for_page(&self, url: &str) -> IndexMap<String, Vec<MenuItemData>> {
        self.menus
            .iter()
            .map(|(name, menu)| (name.clone(), menu.for_page(url)))
            .collect()
    }
}

/// Collects entries from config and pages, then nests them
#[derive(Debug, Default)]
pub struct MenuBuilder {
    flat: IndexMap<String, Vec<MenuEntry>>,
}

impl MenuBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add config entries; `resolve` maps a `page_ref` to a page URL
    pub fn add_config<F>(&mut self, menus: &IndexMap<String, Vec<MenuEntryConfig>>, resolve: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (menu_name, entries) in menus {
            for config in entries {
                let url = match (&config.url, &config.page_ref) {
                    (Some(url), _) => url.clone(),
                    (None, Some(page_ref)) => resolve(page_ref).unwrap_or_else(|| {
                        tracing::warn!(
                            "Menu {:?}: page_ref {:?} does not match any page",
                            menu_name,
                            page_ref
                        );
                        String::new()
                    }),
                    (None, None) => String::new(),
                };

                let identifier = config
                    .identifier
                    .clone()
                    .or_else(|| config.name.clone())
                    .unwrap_or_else(|| url.clone());
                if identifier.is_empty() {
                    tracing::warn!("Menu {:?}: skipping entry without name or url", menu_name);
                    continue;
                }
                let name = config.name.clone().unwrap_or_else(|| identifier.clone());

                self.push(
                    menu_name,
                    MenuEntry {
                        identifier,
                        name,
                        url,
                        weight: config.weight,
                        parent: config.parent.clone(),
                        pre: config.pre.clone().unwrap_or_default(),
                        post: config.post.clone().unwrap_or_default(),
                        page: None,
                        children: Vec::new(),
                    },
                );
            }
        }
    }

    /// Add the entries a page declares in its front matter
    pub fn add_page(&mut self, page: &Page, url: &str) {
        let Some(menus) = &page.menus else {
            return;
        };

        for (menu_name, config) in menus.entries() {
            let name = config
                .name
                .clone()
                .unwrap_or_else(|| page.link_title().to_string());
            let identifier = config.identifier.clone().unwrap_or_else(|| name.clone());

            self.push(
                &menu_name,
                MenuEntry {
                    identifier,
                    name,
                    url: url.to_string(),
                    weight: config.weight.unwrap_or(page.weight),
                    parent: config.parent.clone(),
                    pre: config.pre.clone().unwrap_or_default(),
                    post: config.post.clone().unwrap_or_default(),
                    page: Some(page.source.clone()),
                    children: Vec::new(),
                },
            );
        }
    }

    fn push(&mut self, menu_name: &str, entry: MenuEntry) {
        let entries = self.flat.entry(menu_name.to_string()).or_default();
        if entries.iter().any(|e| e.identifier == entry.identifier) {
            tracing::warn!(
                "Menu {:?}: duplicate identifier {:?}, keeping the first entry",
                menu_name,
                entry.identifier
            );
            return;
        }
        entries.push(entry);
    }

    /// Nest entries by parent and sort every level
    pub fn build(self) -> Menus {
        let menus = self
            .flat
            .into_iter()
            .map(|(name, entries)| {
                let menu = nest(&name, entries);
                (name, menu)
            })
            .collect();
        Menus { menus }
    }
}

fn nest(menu_name: &str, entries: Vec<MenuEntry>) -> Menu {
    let parents: HashMap<String, Option<String>> = entries
        .iter()
        .map(|e| (e.identifier.clone(), e.parent.clone()))
        .collect();

    let mut by_parent: IndexMap<Option<String>, Vec<MenuEntry>> = IndexMap::new();

    for mut entry in entries {
        let effective_parent = match entry.parent.as_deref() {
            None => None,
            Some(parent) if !parents.contains_key(parent) => {
                tracing::warn!(
                    "Menu {:?}: parent {:?} of {:?} not found, placing it at top level",
                    menu_name,
                    parent,
                    entry.identifier
                );
                None
            }
            Some(parent) if parent_chain_loops(&entry.identifier, parent, &parents) => {
                tracing::warn!(
                    "Menu {:?}: parent chain of {:?} loops, placing it at top level",
                    menu_name,
                    entry.identifier
                );
                None
            }
            Some(parent) => Some(parent.to_string()),
        };
        entry.parent = effective_parent.clone();
        by_parent.entry(effective_parent).or_default().push(entry);
    }

    Menu {
        entries: attach(None, &mut by_parent),
    }
}

/// Whether following parents from `start` leads back to `identifier`
fn parent_chain_loops(
    identifier: &str,
    start: &str,
    parents: &HashMap<String, Option<String>>,
) -> bool {
    let mut seen = IndexSet::new();
    let mut current = Some(start.to_string());

    while let Some(id) = current {
        if id == identifier {
            return true;
        }
        // A loop that does not include `identifier` is broken elsewhere
        if !seen.insert(id.clone()) {
            return false;
        }
        current = parents.get(&id).cloned().flatten();
    }
    false
}

fn attach(
    parent: Option<String>,
    by_parent: &mut IndexMap<Option<String>, Vec<MenuEntry>>,
) -> Vec<MenuEntry> {
    let mut level = by_parent.shift_remove(&parent).unwrap_or_default();
    for entry in &mut level {
        entry.children = attach(Some(entry.identifier.clone()), by_parent);
    }
    level.sort_by(compare_entries);
    level
}

/// Weight ascending with 0 (unset) last, then name, then identifier
fn compare_entries(a: &MenuEntry, b: &MenuEntry) -> Ordering {
    weight_order(a.weight, b.weight)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.identifier.cmp(&b.identifier))
}

/// Ascending weight where 0 means "unset" and sorts after everything else
pub fn weight_order(a: i64, b: i64) -> Ordering {
    match (a == 0, b == 0) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(&b),
    }
}

fn normalize_url(url: &str) -> String {
    let path = url.split(['#', '?']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.contains("://") || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PageKind;

    fn entry(identifier: &str, weight: i64, parent: Option<&str>) -> MenuEntryConfig {
        MenuEntryConfig {
            identifier: Some(identifier.to_string()),
            name: Some(identifier.to_uppercase()),
            url: Some(format!("/{}/", identifier)),
            weight,
            parent: parent.map(|p| p.to_string()),
            ..Default::default()
        }
    }

    fn build(entries: Vec<MenuEntryConfig>) -> Menu {
        let mut config = IndexMap::new();
        config.insert("main".to_string(), entries);
        let mut builder = MenuBuilder::new();
        builder.add_config(&config, |_| None);
        builder.build().get("main").cloned().unwrap()
    }

    fn identifiers(entries: &[MenuEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.identifier.as_str()).collect()
    }

    #[test]
    fn test_nests_children_under_parent() {
        let menu = build(vec![
            entry("go", 10, None),
            entry("errors", 2, Some("go")),
            entry("context", 1, Some("go")),
            entry("css", 5, None),
        ]);

        assert_eq!(identifiers(&menu.entries), vec!["css", "go"]);
        let go = menu.find("go").unwrap();
        assert_eq!(identifiers(&go.children), vec!["context", "errors"]);
        assert_eq!(menu.len(), 4);
    }

    #[test]
    fn test_zero_weight_sorts_last() {
        let menu = build(vec![
            entry("unweighted", 0, None),
            entry("heavy", 50, None),
            entry("light", 1, None),
        ]);
        assert_eq!(
            identifiers(&menu.entries),
            vec!["light", "heavy", "unweighted"]
        );
    }

    #[test]
    fn test_equal_weight_sorts_by_name() {
        let menu = build(vec![entry("testing", 1, None), entry("http", 1, None)]);
        assert_eq!(identifiers(&menu.entries), vec!["http", "testing"]);
    }

    #[test]
    fn test_missing_parent_becomes_top_level() {
        let menu = build(vec![entry("orphan", 1, Some("nowhere")), entry("css", 2, None)]);
        assert_eq!(identifiers(&menu.entries), vec!["orphan", "css"]);
        assert_eq!(menu.entries[0].parent, None);
    }

    #[test]
    fn test_parent_loop_is_broken() {
        let menu = build(vec![
            entry("a", 1, Some("b")),
            entry("b", 2, Some("a")),
            entry("c", 3, Some("a")),
        ]);
        assert_eq!(identifiers(&menu.entries), vec!["a", "b"]);
        assert_eq!(identifiers(&menu.find("a").unwrap().children), vec!["c"]);
        assert_eq!(menu.len(), 3);
    }

    #[test]
    fn test_duplicate_identifier_keeps_first() {
        let mut second = entry("go", 1, None);
        second.url = Some("/other/".to_string());
        let menu = build(vec![entry("go", 1, None), second]);
        assert_eq!(menu.entries.len(), 1);
        assert_eq!(menu.entries[0].url, "/go/");
    }

    #[test]
    fn test_walk_is_depth_first() {
        let menu = build(vec![
            entry("go", 1, None),
            entry("errors", 1, Some("go")),
            entry("wrapping", 1, Some("errors")),
            entry("css", 2, None),
        ]);
        let mut visited = Vec::new();
        menu.walk(|e, depth| visited.push((e.identifier.clone(), depth)));
        assert_eq!(
            visited,
            vec![
                ("go".to_string(), 0),
                ("errors".to_string(), 1),
                ("wrapping".to_string(), 2),
                ("css".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_current_and_ancestor_flags() {
        let menu = build(vec![
            entry("go", 1, None),
            entry("errors", 1, Some("go")),
            entry("css", 2, None),
        ]);
        let data = menu.for_page("/errors");

        let go = &data[0];
        assert!(!go.active);
        assert!(go.ancestor_active);
        assert!(go.children[0].active);
        assert!(!data[1].active && !data[1].ancestor_active);
    }

    #[test]
    fn test_page_ref_resolution() {
        let mut config = IndexMap::new();
        config.insert(
            "main".to_string(),
            vec![MenuEntryConfig {
                name: Some("Idioms".to_string()),
                page_ref: Some("/go/idioms".to_string()),
                ..Default::default()
            }],
        );
        let mut builder = MenuBuilder::new();
        builder.add_config(&config, |page_ref| {
            (page_ref == "/go/idioms").then(|| "/go/idioms/".to_string())
        });
        let menus = builder.build();
        assert_eq!(menus.get("main").unwrap().entries[0].url, "/go/idioms/");
    }

    #[test]
    fn test_page_entries_join_config_entries() {
        let mut config = IndexMap::new();
        config.insert("main".to_string(), vec![entry("observability", 1, None)]);

        let mut page = Page::new(
            PageKind::Page,
            "Distributed Tracing".to_string(),
            "observability/tracing.md".to_string(),
        );
        page.link_title = Some("Tracing".to_string());
        page.weight = 3;
        let mut settings = IndexMap::new();
        settings.insert(
            "main".to_string(),
            PageMenuConfig {
                parent: Some("observability".to_string()),
                ..Default::default()
            },
        );
        page.menus = Some(PageMenus::Map(settings));

        let mut builder = MenuBuilder::new();
        builder.add_config(&config, |_| None);
        builder.add_page(&page, "/observability/tracing/");
        let menus = builder.build();

        let parent = menus.get("main").unwrap().find("observability").unwrap();
        let child = &parent.children[0];
        assert_eq!(child.name, "Tracing");
        assert_eq!(child.weight, 3);
        assert_eq!(child.page.as_deref(), Some("observability/tracing.md"));
        assert!(child.is_current("/observability/tracing/"));
    }

    #[test]
    fn test_page_menus_forms() {
        let single: PageMenus = serde_json::from_str(r#""main""#).unwrap();
        assert_eq!(single.entries().len(), 1);
        let list: PageMenus = serde_json::from_str(r#"["main", "footer"]"#).unwrap();
        assert_eq!(list.entries()[1].0, "footer");
    }
}
