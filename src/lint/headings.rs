//! Heading outline checks

use super::{Report, Rule};
use crate::content::Page;

/// The page title renders as the only `h1`; body headings start at `h2`
pub(crate) fn check(page: &Page, report: &mut Report) {
    let mut previous = 1u8;
    for heading in &page.headings {
        if heading.level == 1 {
            report.warning(
                Rule::HeadingStructure,
                &page.source,
                format!("h1 {:?} in body, the title is already the h1", heading.text),
            );
        } else if heading.level > previous + 1 {
            report.warning(
                Rule::HeadingStructure,
                &page.source,
                format!(
                    "heading {:?} jumps from h{} to h{}",
                    heading.text, previous, heading.level
                ),
            );
        }
        previous = heading.level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Heading, PageKind};

    fn heading(level: u8, text: &str) -> Heading {
        Heading {
            level,
            id: text.to_lowercase(),
            text: text.to_string(),
        }
    }

    fn lint(headings: Vec<Heading>) -> Vec<String> {
        let mut page = Page::new(PageKind::Page, "Page".to_string(), "page.md".to_string());
        page.headings = headings;
        let mut report = Report::default();
        check(&page, &mut report);
        report.issues.into_iter().map(|i| i.message).collect()
    }

    #[test]
    fn test_well_formed_outline() {
        let messages = lint(vec![
            heading(2, "Intro"),
            heading(3, "Detail"),
            heading(4, "Deeper"),
            heading(2, "Back"),
        ]);
        assert!(messages.is_empty(), "{:?}", messages);
    }

    #[test]
    fn test_level_jump() {
        let messages = lint(vec![heading(2, "Intro"), heading(4, "Skipped")]);
        assert_eq!(messages, vec![r#"heading "Skipped" jumps from h2 to h4"#]);

        let messages = lint(vec![heading(3, "Start")]);
        assert_eq!(messages, vec![r#"heading "Start" jumps from h1 to h3"#]);
    }

    #[test]
    fn test_h1_in_body() {
        let messages = lint(vec![heading(1, "Title Again"), heading(2, "Fine")]);
        assert_eq!(
            messages,
            vec![r#"h1 "Title Again" in body, the title is already the h1"#]
        );
    }
}
