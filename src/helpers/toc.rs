//! Table of contents

use crate::content::Heading;

/// Render nested `<ol>` lists from a heading outline
///
/// Headings deeper than `max_depth` are left out. Returns an empty string
/// when nothing qualifies.
pub fn toc(headings: &[Heading], max_depth: u8) -> String {
    let entries: Vec<&Heading> = headings
        .iter()
        .filter(|h| h.level >= 2 && h.level <= max_depth)
        .collect();

    let Some(base_level) = entries.iter().map(|h| h.level).min() else {
        return String::new();
    };

    let mut html = String::from(r#"<nav class="toc"><ol>"#);
    let mut current_level = base_level;
    let mut open_item = false;

    for heading in entries {
        if heading.level > current_level {
            while current_level < heading.level {
                html.push_str("<ol>");
                current_level += 1;
            }
        } else {
            if open_item {
                html.push_str("</li>");
            }
            while current_level > heading.level {
                html.push_str("</ol></li>");
                current_level -= 1;
            }
        }

        html.push_str(&format!(
            r##"<li class="toc-item toc-level-{}"><a class="toc-link" href="#{}">{}</a>"##,
            heading.level, heading.id, heading.text
        ));
        open_item = true;
    }

    if open_item {
        html.push_str("</li>");
    }
    while current_level > base_level {
        html.push_str("</ol></li>");
        current_level -= 1;
    }
    html.push_str("</ol></nav>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u8, id: &str) -> Heading {
        Heading {
            level,
            id: id.to_string(),
            text: id.to_uppercase(),
        }
    }

    #[test]
    fn test_empty_toc() {
        assert_eq!(toc(&[], 3), "");
        assert_eq!(toc(&[heading(4, "deep")], 3), "");
    }

    #[test]
    fn test_flat_toc() {
        let html = toc(&[heading(2, "a"), heading(2, "b")], 3);
        assert_eq!(
            html,
            concat!(
                r#"<nav class="toc"><ol>"#,
                r##"<li class="toc-item toc-level-2"><a class="toc-link" href="#a">A</a></li>"##,
                r##"<li class="toc-item toc-level-2"><a class="toc-link" href="#b">B</a></li>"##,
                "</ol></nav>"
            )
        );
    }

    #[test]
    fn test_nested_toc_is_balanced() {
        let html = toc(
            &[heading(2, "a"), heading(3, "a1"), heading(3, "a2"), heading(2, "b"), heading(3, "b1")],
            3,
        );
        assert_eq!(html.matches("<ol>").count(), html.matches("</ol>").count());
        assert_eq!(html.matches("<li").count(), html.matches("</li>").count());
        assert!(html.contains(r##"href="#a1""##));
        assert!(html.find("a2").unwrap() < html.find(r##"href="#b""##).unwrap());
    }
}
