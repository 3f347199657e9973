//! Generator module - renders a loaded site into the public directory

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::content::{Page, PageKind, Section, Site};
use crate::helpers::{
    absolutize_urls, date_xml, escape_xml, join_url, strip_html, strip_invalid_xml_chars, Helpers,
};
use crate::menu::{MenuBuilder, Menus};
use crate::templates::{
    Breadcrumb, NavPage, PageData, PaginationData, SectionData, SiteData, TemplateRenderer,
    TermData, STYLESHEET,
};
use crate::Quire;

/// What a build wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Regular pages
    pub pages: usize,
    /// Section list pages, pagination pages included
    pub sections: usize,
    pub terms: usize,
    pub aliases: usize,
    pub resources: usize,
    pub static_files: usize,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} section pages, {} tags, {} aliases, {} resources, {} static files",
            self.pages, self.sections, self.terms, self.aliases, self.resources, self.static_files
        )
    }
}

/// Static site generator using Tera templates
pub struct Generator {
    quire: Quire,
    renderer: TemplateRenderer,
    helper: Helpers,
    menus: Menus,
    site_data: SiteData,
    now_year: String,
}

impl Generator {
    /// Create a generator for `site`, assembling its menus
    pub fn new(quire: &Quire, site: &Site) -> Result<Self> {
        let renderer = TemplateRenderer::new(&quire.config, Some(&quire.layouts_dir))?;
        let helper = Helpers::new(quire.config.clone());
        let now_year = Utc::now()
            .with_timezone(&quire.config.tz())
            .year()
            .to_string();

        Ok(Self {
            quire: quire.clone(),
            renderer,
            helper,
            menus: build_menus(quire, site),
            site_data: SiteData::new(&quire.config),
            now_year,
        })
    }

    /// Generate the entire site
    pub fn generate(&self, site: &Site) -> Result<BuildSummary> {
        let public_dir = &self.quire.public_dir;
        fs::create_dir_all(public_dir)
            .with_context(|| format!("Failed to create {:?}", public_dir))?;

        let mut summary = BuildSummary::default();

        // Theme stylesheet first so a site's static/css/style.css replaces it
        self.write(Path::new("css/style.css"), STYLESHEET)?;

        self.generate_home(site)?;
        summary.sections += self.generate_sections(&site.root)?;
        summary.pages += self.generate_singles(&site.root)?;
        summary.resources += self.copy_resources(site)?;
        summary.terms += self.generate_taxonomy(site)?;
        summary.aliases += self.generate_aliases(site)?;
        self.generate_atom_feed(site)?;
        self.generate_sitemap(site)?;
        self.generate_search_index(site)?;
        self.generate_not_found()?;
        summary.static_files += self.copy_static()?;

        tracing::info!("Generated {}", summary);
        Ok(summary)
    }

    /// Context every template gets
    fn base_context(&self, page: &Page) -> Context {
        let menus = self.menus.for_page(&page.url);
        let main_menu = menus.get("main").cloned().unwrap_or_default();

        let mut context = Context::new();
        context.insert("site", &self.site_data);
        context.insert(
            "page",
            &PageData::new(page, &self.helper, &self.quire.config),
        );
        context.insert("main_menu", &main_menu);
        context.insert("menus", &menus);
        context.insert("breadcrumbs", &Vec::<Breadcrumb>::new());
        context.insert("prev", &None::<NavPage>);
        context.insert("next", &None::<NavPage>);
        context.insert("now_year", &self.now_year);
        context
    }

    fn breadcrumbs(&self, site_root: &Section, page: &Page) -> Vec<Breadcrumb> {
        let mut crumbs: Vec<Breadcrumb> = site_root
            .ancestors(&page.section)
            .into_iter()
            .map(|s| Breadcrumb {
                title: s.index.link_title().to_string(),
                url: self.helper.url_for(&s.index.url),
            })
            .collect();
        if page.is_page() {
            crumbs.push(Breadcrumb {
                title: page.link_title().to_string(),
                url: self.helper.url_for(&page.url),
            });
        }
        crumbs
    }

    /// Home page with top-level sections and recent pages
    fn generate_home(&self, site: &Site) -> Result<()> {
        let home = &site.root.index;
        let mut context = self.base_context(home);

        let sections: Vec<SectionData> = site
            .root
            .sections
            .iter()
            .map(|s| SectionData::new(s, &self.helper))
            .collect();
        let recent: Vec<NavPage> = site
            .recent_pages()
            .into_iter()
            .take(self.quire.config.paginate)
            .map(|p| NavPage::new(p, &self.helper))
            .collect();
        let pages: Vec<NavPage> = site
            .root
            .pages
            .iter()
            .map(|p| NavPage::new(p, &self.helper))
            .collect();

        context.insert("sections", &sections);
        context.insert("recent", &recent);
        context.insert("pages", &pages);

        let template = home
            .layout
            .as_ref()
            .map(|l| format!("{}.html", l))
            .filter(|name| self.renderer.has_template(name))
            .unwrap_or_else(|| "home.html".to_string());
        let html = self.renderer.render(&template, &context)?;
        self.write(&home.output_path(), &html)?;
        tracing::debug!("Generated home page");
        Ok(())
    }

    /// Section list pages with pagination, for every section below the root
    fn generate_sections(&self, root: &Section) -> Result<usize> {
        let mut sections = Vec::new();
        root.walk(|section, depth| {
            if depth > 0 {
                sections.push(section);
            }
        });

        let mut count = 0;
        for section in sections {
            count += self.generate_section(root, section)?;
        }
        Ok(count)
    }

    fn generate_section(&self, root: &Section, section: &Section) -> Result<usize> {
        let per_page = self.quire.config.paginate.max(1);
        let total_items = section.pages.len();
        let total_pages = total_items.div_ceil(per_page).max(1);
        let template = self.renderer.section_template(section);
        let list_url = self.helper.url_for(&section.index.url);

        let subsections: Vec<SectionData> = section
            .sections
            .iter()
            .map(|s| SectionData::new(s, &self.helper))
            .collect();
        let breadcrumbs = self.breadcrumbs(root, &section.index);

        for page_num in 1..=total_pages {
            let start = (page_num - 1) * per_page;
            let end = (start + per_page).min(total_items);
            let pages: Vec<NavPage> = section.pages[start..end]
                .iter()
                .map(|p| NavPage::new(p, &self.helper))
                .collect();
            let pagination = PaginationData::new(&list_url, page_num, per_page, total_items);

            let mut context = self.base_context(&section.index);
            context.insert("section", &SectionData::new(section, &self.helper));
            context.insert("subsections", &subsections);
            context.insert("pages", &pages);
            context.insert("pagination", &pagination);
            context.insert("breadcrumbs", &breadcrumbs);

            let html = self.renderer.render(&template, &context)?;
            let output_path = if page_num == 1 {
                section.index.output_path()
            } else {
                PathBuf::from(section.index.url.trim_matches('/'))
                    .join("page")
                    .join(page_num.to_string())
                    .join("index.html")
            };
            self.write(&output_path, &html)?;
            tracing::debug!("Generated section: {:?}", output_path);
        }

        Ok(total_pages)
    }

    /// Regular pages with prev/next inside their section
    fn generate_singles(&self, root: &Section) -> Result<usize> {
        let mut sections = Vec::new();
        root.walk(|section, _| sections.push(section));

        let mut count = 0;
        for section in sections {
            for page in &section.pages {
                let (prev, next) = section.siblings(&page.source);
                let template = self.renderer.page_template(page);

                let mut context = self.base_context(page);
                context.insert("breadcrumbs", &self.breadcrumbs(root, page));
                context.insert("prev", &prev.map(|p| NavPage::new(p, &self.helper)));
                context.insert("next", &next.map(|p| NavPage::new(p, &self.helper)));

                let html = self
                    .renderer
                    .render(&template, &context)
                    .with_context(|| format!("Failed to render {}", page.source))?;
                self.write(&page.output_path(), &html)?;
                tracing::debug!("Generated page: {}", page.url);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Bundle resources next to their page output
    fn copy_resources(&self, site: &Site) -> Result<usize> {
        let mut count = 0;
        for page in site.pages() {
            for resource in page.resources.iter() {
                let dest = self.output_path(Path::new(resource.url.trim_start_matches('/')))?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&resource.source, &dest).with_context(|| {
                    format!("Failed to copy {:?} to {:?}", resource.source, dest)
                })?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Tag list page and one page per term
    fn generate_taxonomy(&self, site: &Site) -> Result<usize> {
        let tags_dir = &self.quire.config.tags_dir;
        let terms = site.tags();
        let term_data: Vec<TermData> = terms
            .iter()
            .map(|t| TermData::new(t, &self.helper, tags_dir))
            .collect();

        let list = self.synthetic_page("Tags", &join_url(&[tags_dir.as_str()], true));
        let mut context = self.base_context(&list);
        context.insert("terms", &term_data);
        let html = self.renderer.render("taxonomy.html", &context)?;
        self.write(&list.output_path(), &html)?;

        for (term, data) in terms.iter().zip(&term_data) {
            let page = self.synthetic_page(
                &term.name,
                &join_url(&[tags_dir.as_str(), term.slug.as_str()], false),
            );
            let mut context = self.base_context(&page);
            context.insert("term", data);
            let html = self.renderer.render("term.html", &context)?;
            self.write(&page.output_path(), &html)?;
        }

        tracing::info!("Generated {} tag pages", terms.len());
        Ok(terms.len())
    }

    /// Redirect pages for old URLs
    fn generate_aliases(&self, site: &Site) -> Result<usize> {
        let mut count = 0;
        for page in site.pages() {
            for alias in &page.aliases {
                let mut context = Context::new();
                context.insert("site", &self.site_data);
                context.insert("target", &page.permalink);
                let html = self.renderer.render("alias.html", &context)?;

                let trimmed = alias.trim_matches('/');
                let output_path = if trimmed.ends_with(".html") {
                    PathBuf::from(trimmed)
                } else {
                    PathBuf::from(trimmed).join("index.html")
                };
                self.write(&output_path, &html)?;
                tracing::debug!("Generated alias {} -> {}", alias, page.url);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Atom feed of the newest regular pages
    fn generate_atom_feed(&self, site: &Site) -> Result<()> {
        let config = &self.quire.config;
        let pages: Vec<&Page> = site
            .recent_pages()
            .into_iter()
            .take(config.feed_limit)
            .collect();
        let now: DateTime<FixedOffset> = Utc::now().fixed_offset();
        let updated = pages
            .iter()
            .filter_map(|p| p.lastmod.or(p.date))
            .max()
            .unwrap_or(now);

        let mut feed = String::new();
        feed.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        feed.push('\n');
        feed.push_str(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#);
        feed.push('\n');
        feed.push_str(&format!("  <title>{}</title>\n", escape_xml(&config.title)));
        feed.push_str(&format!(
            "  <link href=\"{}\" rel=\"self\"/>\n",
            escape_xml(&self.helper.full_url_for("/index.xml"))
        ));
        feed.push_str(&format!(
            "  <link href=\"{}\"/>\n",
            escape_xml(&self.helper.full_url_for("/"))
        ));
        feed.push_str(&format!("  <updated>{}</updated>\n", date_xml(&updated)));
        feed.push_str(&format!(
            "  <id>{}</id>\n",
            escape_xml(&self.helper.full_url_for("/"))
        ));
        if !config.author.is_empty() {
            feed.push_str(&format!(
                "  <author><name>{}</name></author>\n",
                escape_xml(&config.author)
            ));
        }
        feed.push_str("  <generator>quire</generator>\n");

        for page in &pages {
            feed.push_str("  <entry>\n");
            feed.push_str(&format!("    <title>{}</title>\n", escape_xml(&page.title)));
            feed.push_str(&format!(
                "    <link href=\"{}\"/>\n",
                escape_xml(&page.permalink)
            ));
            feed.push_str(&format!("    <id>{}</id>\n", escape_xml(&page.permalink)));
            if let Some(date) = &page.date {
                feed.push_str(&format!("    <published>{}</published>\n", date_xml(date)));
            }
            feed.push_str(&format!(
                "    <updated>{}</updated>\n",
                date_xml(&page.lastmod.or(page.date).unwrap_or(now))
            ));
            for tag in &page.tags {
                feed.push_str(&format!("    <category term=\"{}\"/>\n", escape_xml(tag)));
            }

            let content = if page.truncated {
                &page.summary
            } else {
                &page.content
            };
            let content = absolutize_urls(content, &config.base_url);
            let content = strip_invalid_xml_chars(&content).replace("]]>", "]]]]><![CDATA[>");
            feed.push_str(&format!(
                "    <content type=\"html\"><![CDATA[{}]]></content>\n",
                content
            ));
            feed.push_str("  </entry>\n");
        }
        feed.push_str("</feed>\n");

        self.write(Path::new("index.xml"), &feed)?;
        tracing::info!("Generated index.xml");
        Ok(())
    }

    /// Sitemap of every rendered page
    fn generate_sitemap(&self, site: &Site) -> Result<()> {
        let mut sitemap = String::new();
        sitemap.push_str(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        sitemap.push('\n');
        sitemap.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        sitemap.push('\n');

        for page in site.pages() {
            sitemap.push_str("  <url>\n");
            sitemap.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&page.permalink)));
            if let Some(date) = page.lastmod.or(page.date) {
                sitemap.push_str(&format!("    <lastmod>{}</lastmod>\n", date_xml(&date)));
            }
            sitemap.push_str("  </url>\n");
        }

        let tags_dir = self.quire.config.tags_dir.as_str();
        let mut taxonomy = vec![join_url(&[tags_dir], true)];
        taxonomy.extend(
            site.tags()
                .iter()
                .map(|t| join_url(&[tags_dir, t.slug.as_str()], false)),
        );
        for url in taxonomy {
            sitemap.push_str(&format!(
                "  <url>\n    <loc>{}</loc>\n  </url>\n",
                escape_xml(&self.helper.full_url_for(&url))
            ));
        }
        sitemap.push_str("</urlset>\n");

        self.write(Path::new("sitemap.xml"), &sitemap)?;
        tracing::info!("Generated sitemap.xml");
        Ok(())
    }

    /// Search index (JSON)
    fn generate_search_index(&self, site: &Site) -> Result<()> {
        let search_data: Vec<serde_json::Value> = site
            .regular_pages()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "title": p.title,
                    "url": self.helper.url_for(&p.url),
                    "section": p.section,
                    "tags": p.tags,
                    "content": strip_html(&p.content).split_whitespace().collect::<Vec<_>>().join(" "),
                })
            })
            .collect();

        let json = serde_json::to_string_pretty(&search_data)?;
        self.write(Path::new("search.json"), &json)?;
        tracing::info!("Generated search.json");
        Ok(())
    }

    fn generate_not_found(&self) -> Result<()> {
        let page = self.synthetic_page("Page not found", "/404.html");
        let context = self.base_context(&page);
        let html = self.renderer.render("404.html", &context)?;
        self.write(Path::new("404.html"), &html)
    }

    /// Copy the static directory verbatim
    fn copy_static(&self) -> Result<usize> {
        let static_dir = &self.quire.static_dir;
        if !static_dir.is_dir() {
            return Ok(0);
        }

        let mut count = 0;
        for entry in WalkDir::new(static_dir).follow_links(true) {
            let entry =
                entry.with_context(|| format!("Failed to read static dir {:?}", static_dir))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(static_dir)?;
            let dest = self.quire.public_dir.join(relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(path, &dest)
                .with_context(|| format!("Failed to copy {:?} to {:?}", path, dest))?;
            count += 1;
        }
        Ok(count)
    }

    /// A page with no source file, for generated listings
    fn synthetic_page(&self, title: &str, url: &str) -> Page {
        let mut page = Page::new(PageKind::Section, title.to_string(), String::new());
        page.url = url.to_string();
        page.permalink = self.helper.full_url_for(url);
        page.toc_enabled = false;
        page
    }

    /// `relative` inside the public dir; anything that could leave it is refused
    fn output_path(&self, relative: &Path) -> Result<PathBuf> {
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            bail!("Refusing to write outside the public dir: {:?}", relative);
        }
        Ok(self.quire.public_dir.join(relative))
    }

    /// Write a file relative to the public dir
    fn write(&self, relative: &Path, contents: &str) -> Result<()> {
        let output_path = self.output_path(relative)?;
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        fs::write(&output_path, contents)
            .with_context(|| format!("Failed to write {:?}", output_path))
    }
}

/// Menus from config entries and page front matter
fn build_menus(quire: &Quire, site: &Site) -> Menus {
    let pages = site.pages();
    let mut builder = MenuBuilder::new();

    builder.add_config(&quire.config.menu, |page_ref| {
        let path = page_ref.trim_matches('/');
        let candidates = if path.is_empty() {
            vec!["_index.md".to_string()]
        } else if path.ends_with(".md") {
            vec![path.to_string()]
        } else {
            vec![
                format!("{}.md", path),
                format!("{}/index.md", path),
                format!("{}/_index.md", path),
            ]
        };
        candidates
            .iter()
            .find_map(|c| pages.iter().find(|p| &p.source == c))
            .map(|p| p.url.clone())
    });

    for page in &pages {
        builder.add_page(page, &page.url);
    }
    builder.build()
}
