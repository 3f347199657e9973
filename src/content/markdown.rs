//! Markdown rendering with syntax highlighting

use anyhow::Result;
use pulldown_cmark::{
    html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd,
};
use serde::Serialize;
use std::collections::HashSet;
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::helpers::html_escape;

/// Manual summary divider
const MORE_MARKERS: [&str; 2] = ["<!--more-->", "<!-- more -->"];

/// A heading found in rendered content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub id: String,
    pub text: String,
}

/// Result of rendering one document
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub headings: Vec<Heading>,
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    line_numbers: bool,
}

enum Pending<'a> {
    Code {
        lang: Option<String>,
        buf: String,
    },
    Heading {
        level: HeadingLevel,
        id: Option<CowStr<'a>>,
        classes: Vec<CowStr<'a>>,
        attrs: Vec<(CowStr<'a>, Option<CowStr<'a>>)>,
        events: Vec<Event<'a>>,
        text: String,
    },
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::with_options("base16-ocean.dark", false)
    }

    /// Create with custom settings
    pub fn with_options(theme: &str, line_numbers: bool) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: theme.to_string(),
            line_numbers,
        }
    }

    /// Render markdown to HTML, assigning an id to every heading
    pub fn render(&self, markdown: &str) -> Result<Rendered> {
        let parser = Parser::new_ext(markdown, parser_options());

        let mut events: Vec<Event> = Vec::new();
        let mut headings = Vec::new();
        let mut used_ids: HashSet<String> = HashSet::new();
        let mut pending: Option<Pending> = None;

        for event in parser {
            match pending.take() {
                Some(Pending::Code { lang, mut buf }) => match event {
                    Event::Text(text) => {
                        buf.push_str(&text);
                        pending = Some(Pending::Code { lang, buf });
                    }
                    Event::End(TagEnd::CodeBlock) => {
                        let highlighted = self.highlight_code(&buf, lang.as_deref());
                        events.push(Event::Html(CowStr::from(highlighted)));
                    }
                    _ => pending = Some(Pending::Code { lang, buf }),
                },
                Some(Pending::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                    events: mut inner,
                    mut text,
                }) => match event {
                    Event::End(TagEnd::Heading(end_level)) => {
                        let base = id
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| slug::slugify(&text));
                        let id = unique_id(base, &mut used_ids);

                        headings.push(Heading {
                            level: level as u8,
                            id: id.clone(),
                            text: text.trim().to_string(),
                        });

                        events.push(Event::Start(Tag::Heading {
                            level,
                            id: Some(CowStr::from(id)),
                            classes,
                            attrs,
                        }));
                        events.extend(inner);
                        events.push(Event::End(TagEnd::Heading(end_level)));
                    }
                    event => {
                        if let Event::Text(t) | Event::Code(t) = &event {
                            text.push_str(t);
                        }
                        inner.push(event);
                        pending = Some(Pending::Heading {
                            level,
                            id,
                            classes,
                            attrs,
                            events: inner,
                            text,
                        });
                    }
                },
                None => match event {
                    Event::Start(Tag::CodeBlock(kind)) => {
                        let lang = match kind {
                            CodeBlockKind::Fenced(lang) => {
                                // ```go {linenos=true} -> "go"
                                let lang = lang.split_whitespace().next().unwrap_or("").to_string();
                                (!lang.is_empty()).then_some(lang)
                            }
                            CodeBlockKind::Indented => None,
                        };
                        pending = Some(Pending::Code {
                            lang,
                            buf: String::new(),
                        });
                    }
                    Event::Start(Tag::Heading {
                        level,
                        id,
                        classes,
                        attrs,
                    }) => {
                        pending = Some(Pending::Heading {
                            level,
                            id,
                            classes,
                            attrs,
                            events: Vec::new(),
                            text: String::new(),
                        });
                    }
                    event => events.push(event),
                },
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(Rendered {
            html: html_output,
            headings,
        })
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.values().next());

        let highlighted =
            theme.and_then(|t| highlighted_html_for_string(code, &self.syntax_set, syntax, t).ok());

        match highlighted {
            Some(highlighted) if self.line_numbers => {
                self.add_line_numbers(&highlighted, code.lines().count(), lang)
            }
            Some(highlighted) => format!(
                r#"<div class="highlight language-{}">{}</div>"#,
                lang, highlighted
            ),
            None => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang,
                html_escape(code)
            ),
        }
    }

    /// Add line numbers to highlighted code
    fn add_line_numbers(&self, highlighted: &str, line_count: usize, lang: &str) -> String {
        let gutter = (1..=line_count)
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
            lang,
            gutter,
            highlighted
        )
    }

    /// Split a manual summary at `<!--more-->`
    /// Returns (summary, body_without_marker)
    ///
    /// Only a marker written as HTML counts; one shown inside code is content.
    pub fn split_summary(content: &str) -> (Option<String>, String) {
        let Some((pos, len)) = find_more_marker(content) else {
            return (None, content.to_string());
        };
        let summary = content[..pos].trim().to_string();
        let remaining = content[pos + len..].trim().to_string();
        let full = format!("{}\n\n{}", summary, remaining);
        (Some(summary), full)
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// Front matter is stripped before rendering, so no metadata block options
fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_SMART_PUNCTUATION
        | Options::ENABLE_HEADING_ATTRIBUTES
        | Options::ENABLE_DEFINITION_LIST
        | Options::ENABLE_GFM
}

/// Byte offset and length of the first summary marker in an HTML event
fn find_more_marker(content: &str) -> Option<(usize, usize)> {
    Parser::new_ext(content, parser_options())
        .into_offset_iter()
        .find_map(|(event, range)| match event {
            Event::Html(_) | Event::InlineHtml(_) => {
                let raw = &content[range.clone()];
                MORE_MARKERS
                    .iter()
                    .find_map(|marker| raw.find(marker).map(|at| (range.start + at, marker.len())))
            }
            _ => None,
        })
}

/// First free id among `base`, `base-1`, `base-2`...
fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    let base = if base.is_empty() {
        "section".to_string()
    } else {
        base
    };
    let mut id = base.clone();
    let mut n = 0;
    while used.contains(&id) {
        n += 1;
        id = format!("{}-{}", base, n);
    }
    used.insert(id.clone());
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let rendered = renderer.render("# Hello World\n\nThis is a test.").unwrap();
        assert!(rendered.html.contains(r#"<h1 id="hello-world">Hello World</h1>"#));
        assert!(rendered.html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_code_block() {
        let renderer = MarkdownRenderer::new();
        let rendered = renderer
            .render("```go\nfunc main() {}\n```\n\nafter")
            .unwrap();
        assert!(rendered.html.contains("highlight language-go"));
        assert!(rendered.html.contains("<p>after</p>"));
        assert!(rendered.headings.is_empty());
    }

    #[test]
    fn test_line_numbers() {
        let renderer = MarkdownRenderer::with_options("base16-ocean.dark", true);
        let rendered = renderer.render("```\na\nb\n```").unwrap();
        assert!(rendered.html.contains(r#"<span class="line-number">2</span>"#));
    }

    #[test]
    fn test_heading_outline_and_ids() {
        let renderer = MarkdownRenderer::new();
        let md = "## Using `context`\n\ntext\n\n### Deadlines\n\n## Using `context`\n\n## Custom {#my-id}\n";
        let rendered = renderer.render(md).unwrap();

        let ids: Vec<_> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["using-context", "deadlines", "using-context-1", "my-id"]);
        assert_eq!(rendered.headings[0].text, "Using context");
        assert_eq!(rendered.headings[1].level, 3);
        assert!(rendered.html.contains(r#"<h2 id="using-context">Using <code>context</code></h2>"#));
        assert!(rendered.html.contains(r#"<h2 id="my-id">Custom</h2>"#));
    }

    #[test]
    fn test_split_summary() {
        let content = "This is the summary.\n<!--more-->\nThis is more content.";
        let (summary, full) = MarkdownRenderer::split_summary(content);
        assert_eq!(summary, Some("This is the summary.".to_string()));
        assert!(full.contains("This is the summary."));
        assert!(full.contains("This is more content."));
        assert!(!full.contains("more-->"));

        let (summary, _) = MarkdownRenderer::split_summary("no marker");
        assert!(summary.is_none());
    }

    #[test]
    fn test_split_summary_ignores_marker_in_code() {
        let content = "Intro to summaries.\n\n```html\n<p>lead</p>\n<!--more-->\n<p>rest</p>\n```\n\nAfter.";
        let (summary, full) = MarkdownRenderer::split_summary(content);
        assert!(summary.is_none());
        assert_eq!(full, content);

        let inline = "Use `<!--more-->` to cut.\n\nAfter.";
        assert!(MarkdownRenderer::split_summary(inline).0.is_none());

        let content = "Lead.\n\n```html\n<!--more-->\n```\n\n<!-- more -->\n\nRest.";
        let (summary, full) = MarkdownRenderer::split_summary(content);
        let summary = summary.unwrap();
        assert!(summary.starts_with("Lead."));
        assert!(summary.ends_with("```"));
        assert!(full.contains("```html\n<!--more-->\n```"));
        assert!(!full.contains("<!-- more -->"));
    }

    #[test]
    fn test_generated_ids_skip_taken_slugs() {
        let renderer = MarkdownRenderer::new();
        let rendered = renderer.render("## Foo\n\n## Foo\n\n## Foo 1\n\n## Foo\n").unwrap();
        let ids: Vec<&str> = rendered.headings.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["foo", "foo-1", "foo-1-1", "foo-2"]);
    }
}
