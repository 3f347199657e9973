//! HTML and text helper functions

/// Words per minute used for reading time
const READING_WPM: usize = 213;

/// Generate meta generator tag
pub fn meta_generator() -> String {
    format!(
        r#"<meta name="generator" content="quire {}">"#,
        env!("CARGO_PKG_VERSION")
    )
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape XML special characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Strip HTML tags from a string
pub fn strip_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

/// Truncate a string to a specified length
pub fn truncate(s: &str, length: usize, omission: Option<&str>) -> String {
    let omission = omission.unwrap_or("...");

    if s.chars().count() <= length {
        s.to_string()
    } else {
        let truncated: String = s
            .chars()
            .take(length.saturating_sub(omission.chars().count()))
            .collect();
        format!("{}{}", truncated.trim_end(), omission)
    }
}

/// Keep the first `count` words of plain text
/// Returns (text, truncated)
pub fn truncate_words(s: &str, count: usize) -> (String, bool) {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() <= count {
        (words.join(" "), false)
    } else {
        (words[..count].join(" "), true)
    }
}

/// Count words in HTML content (strips tags first)
///
/// CJK ideographs count as one word each.
pub fn count_words(html: &str) -> usize {
    let text = strip_html(html);
    let mut count = 0;
    let mut in_word = false;

    for c in text.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() || c == '\'' || c == '_' {
            if !in_word {
                in_word = true;
                count += 1;
            }
        } else {
            in_word = false;
        }
    }

    count
}

/// Estimated reading time in minutes, at least one
pub fn reading_time(word_count: usize) -> usize {
    word_count.div_ceil(READING_WPM).max(1)
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
        || ('\u{3040}'..='\u{30FF}').contains(&c)
        || ('\u{AC00}'..='\u{D7AF}').contains(&c)
}

/// Strip invalid XML control characters (except tab, newline, carriage return)
pub fn strip_invalid_xml_chars(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            c == '\t'
                || c == '\n'
                || c == '\r'
                || ('\u{0020}'..='\u{D7FF}').contains(&c)
                || ('\u{E000}'..='\u{FFFD}').contains(&c)
                || ('\u{10000}'..='\u{10FFFF}').contains(&c)
        })
        .collect()
}

/// Make root-relative `href`/`src` attributes absolute
pub fn absolutize_urls(content: &str, base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    content
        .replace("href=\"/", &format!("href=\"{}/", base_url))
        .replace("src=\"/", &format!("src=\"{}/", base_url))
        .replace("href='/", &format!("href='{}/", base_url))
        .replace("src='/", &format!("src='{}/", base_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello World", 8, None), "Hello...");
        assert_eq!(truncate("Hi", 10, None), "Hi");
    }

    #[test]
    fn test_truncate_words() {
        assert_eq!(
            truncate_words("one two  three\nfour", 3),
            ("one two three".to_string(), true)
        );
        assert_eq!(truncate_words("one two", 3), ("one two".to_string(), false));
    }

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("<p>Don't <em>panic</em>, use errors.</p>"), 4);
        assert_eq!(count_words("<p>中文内容</p>"), 4);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(0), 1);
        assert_eq!(reading_time(213), 1);
        assert_eq!(reading_time(214), 2);
    }

    #[test]
    fn test_xml_helpers() {
        assert_eq!(escape_xml("a & 'b'"), "a &amp; &apos;b&apos;");
        assert_eq!(strip_invalid_xml_chars("ok\u{0001}"), "ok");
        assert_eq!(
            absolutize_urls(r#"<a href="/go/">x</a>"#, "https://e.com/"),
            r#"<a href="https://e.com/go/">x</a>"#
        );
    }
}
