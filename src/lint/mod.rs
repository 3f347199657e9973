//! Documentation linting
//!
//! Runs a fixed set of rules over a loaded site and collects the findings
//! into a [`Report`]. Nothing is fetched over the network; external links
//! are never checked.

mod headings;
mod links;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;

use crate::content::{FrontMatter, LoadError, LoadOutcome, Page, Site};
use crate::Quire;

pub use links::LinkIndex;

/// How bad an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Lint rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    FrontMatter,
    BrokenLink,
    HeadingStructure,
    DraftLink,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::FrontMatter => "front-matter",
            Rule::BrokenLink => "broken-link",
            Rule::HeadingStructure => "heading-structure",
            Rule::DraftLink => "draft-link",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub rule: Rule,
    /// Content-relative source path
    pub source: String,
    pub message: String,
}

/// Findings of one lint run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn push(&mut self, severity: Severity, rule: Rule, source: &str, message: String) {
        self.issues.push(Issue {
            severity,
            rule,
            source: source.to_string(),
            message,
        });
    }

    pub fn error(&mut self, rule: Rule, source: &str, message: String) {
        self.push(Severity::Error, rule, source, message);
    }

    pub fn warning(&mut self, rule: Rule, source: &str, message: String) {
        self.push(Severity::Warning, rule, source, message);
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of one rule
    pub fn by_rule(&self, rule: Rule) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.rule == rule).collect()
    }

    /// Whether the run should fail
    pub fn fails(&self, deny_warnings: bool) -> bool {
        self.errors() > 0 || (deny_warnings && self.warnings() > 0)
    }

    /// Issues grouped by source path, in path order
    pub fn grouped(&self) -> BTreeMap<&str, Vec<&Issue>> {
        let mut groups: BTreeMap<&str, Vec<&Issue>> = BTreeMap::new();
        for issue in &self.issues {
            groups.entry(issue.source.as_str()).or_default().push(issue);
        }
        groups
    }

    fn sort(&mut self) {
        self.issues.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(b.severity.cmp(&a.severity))
                .then(a.rule.cmp(&b.rule))
                .then(a.message.cmp(&b.message))
        });
        self.issues.dedup();
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (source, issues) in self.grouped() {
            writeln!(f, "{}", if source.is_empty() { "<site>" } else { source })?;
            for issue in issues {
                writeln!(f, "  {:7} [{}] {}", issue.severity, issue.rule, issue.message)?;
            }
        }
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors(),
            self.warnings()
        )
    }
}

/// Runs every rule over a site
pub struct Linter<'a> {
    quire: &'a Quire,
}

impl<'a> Linter<'a> {
    pub fn new(quire: &'a Quire) -> Self {
        Self { quire }
    }

    /// Lint a load outcome, reporting load failures as front-matter errors
    pub fn check(&self, outcome: &LoadOutcome) -> Report {
        let mut report = Report::default();
        for failure in &outcome.failures {
            self.report_failure(&mut report, failure);
        }
        self.lint_site(&outcome.site, &mut report);
        report.sort();
        report
    }

    /// Lint a loaded site
    pub fn run(&self, site: &Site) -> Report {
        let mut report = Report::default();
        self.lint_site(site, &mut report);
        report.sort();
        report
    }

    fn lint_site(&self, site: &Site, report: &mut Report) {
        let index = LinkIndex::new(self.quire, site);
        for page in site.pages() {
            self.front_matter(page, report);
            headings::check(page, report);
            links::check(self.quire, &index, page, report);
        }
        tracing::debug!(
            "Lint finished: {} error(s), {} warning(s)",
            report.errors(),
            report.warnings()
        );
    }

    fn report_failure(&self, report: &mut Report, failure: &LoadError) {
        match failure {
            LoadError::Multiple(failures) => {
                for failure in failures {
                    self.report_failure(report, failure);
                }
            }
            LoadError::DuplicateUrl { second, .. } => {
                report.error(Rule::FrontMatter, second, failure.to_string());
            }
            other => {
                let source = other
                    .path()
                    .map(|p| {
                        p.strip_prefix(&self.quire.content_dir)
                            .unwrap_or(p)
                            .to_string_lossy()
                            .replace('\\', "/")
                    })
                    .unwrap_or_default();
                let message = match other {
                    LoadError::FrontMatter { source, .. } => source.to_string(),
                    LoadError::Io { source, .. } => source.to_string(),
                    _ => other.to_string(),
                };
                report.error(Rule::FrontMatter, &source, message);
            }
        }
    }

    /// Missing title/date and odd weights, read from the file's own front matter
    fn front_matter(&self, page: &Page, report: &mut Report) {
        // Synthesized section indexes have no file
        let Ok(content) = fs::read_to_string(&page.full_source) else {
            return;
        };
        let Ok((fm, _)) = FrontMatter::parse(&content) else {
            return;
        };

        if fm.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            report.warning(
                Rule::FrontMatter,
                &page.source,
                "missing `title`".to_string(),
            );
        }
        if page.is_page() && fm.date.is_none() {
            report.warning(Rule::FrontMatter, &page.source, "missing `date`".to_string());
        }
        if fm.weight < 0 {
            report.warning(
                Rule::FrontMatter,
                &page.source,
                format!("negative `weight` {}", fm.weight),
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::ContentLoader;
    use std::path::Path;

    pub(crate) fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub(crate) fn lint(dir: &Path) -> Report {
        let quire = Quire::with_config(dir, SiteConfig::default());
        let outcome = ContentLoader::new(&quire).load_all();
        Linter::new(&quire).check(&outcome)
    }

    #[test]
    fn test_front_matter_rule() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        write(&content, "_index.md", "---\ntitle: Home\n---\n");
        write(&content, "go/untitled.md", "---\ndate: 2024-01-01\n---\nbody\n");
        write(
            &content,
            "go/undated.md",
            "---\ntitle: Undated\nweight: -3\n---\nbody\n",
        );
        write(&content, "go/broken.md", "+++\ntitle = [\n+++\n");

        let report = lint(dir.path());
        let issues = report.by_rule(Rule::FrontMatter);
        let summary: Vec<_> = issues
            .iter()
            .map(|i| (i.source.as_str(), i.severity, i.message.as_str()))
            .collect();

        assert!(summary.contains(&("go/untitled.md", Severity::Warning, "missing `title`")));
        assert!(summary.contains(&("go/undated.md", Severity::Warning, "missing `date`")));
        assert!(summary.contains(&("go/undated.md", Severity::Warning, "negative `weight` -3")));
        assert!(summary
            .iter()
            .any(|(source, severity, _)| *source == "go/broken.md" && *severity == Severity::Error));
        assert_eq!(report.errors(), 1);
    }

    #[test]
    fn test_report_fails_and_display() {
        let mut report = Report::default();
        assert!(!report.fails(true));

        report.warning(Rule::HeadingStructure, "b.md", "jump".to_string());
        assert!(!report.fails(false));
        assert!(report.fails(true));

        report.error(Rule::BrokenLink, "a.md", "missing /x/".to_string());
        report.error(Rule::BrokenLink, "a.md", "missing /x/".to_string());
        report.sort();
        assert_eq!(report.errors(), 1);
        assert!(report.fails(false));

        let text = report.to_string();
        assert!(text.starts_with("a.md\n"));
        assert!(text.contains("[broken-link] missing /x/"));
        assert!(text.ends_with("1 error(s), 1 warning(s)"));
    }
}
