//! Front-matter parsing

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::menu::PageMenus;

/// Errors raised while reading a front-matter block
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("unterminated {format} front matter (missing closing `{fence}`)")]
    Unterminated {
        format: &'static str,
        fence: &'static str,
    },

    #[error("invalid TOML front matter: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON front matter: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid `{field}` date: {value:?}")]
    InvalidDate { field: &'static str, value: String },
}

/// Custom deserializer that handles both a single string and a list of strings
fn string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, SeqAccess, Visitor};
    use std::fmt;

    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value])
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut vec = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                vec.push(item);
            }
            Ok(vec)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringOrVec)
}

/// Accepts a date as a string or as a native TOML datetime
fn date_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<toml::Value>::deserialize(deserializer)? {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s)),
        Some(toml::Value::Datetime(dt)) => Ok(Some(dt.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a date, found {}",
            other.type_str()
        ))),
    }
}

/// Front-matter data of a content page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "date_value")]
    pub date: Option<String>,
    #[serde(deserialize_with = "date_value")]
    pub lastmod: Option<String>,
    #[serde(alias = "publishDate", deserialize_with = "date_value")]
    pub publish_date: Option<String>,
    #[serde(alias = "expiryDate", deserialize_with = "date_value")]
    pub expiry_date: Option<String>,
    /// Sort key within a section, 0 means unset
    pub weight: i64,
    pub draft: bool,
    #[serde(deserialize_with = "string_or_vec")]
    pub tags: Vec<String>,
    pub slug: Option<String>,
    pub url: Option<String>,
    pub layout: Option<String>,
    #[serde(alias = "linkTitle")]
    pub link_title: Option<String>,
    #[serde(deserialize_with = "string_or_vec")]
    pub aliases: Vec<String>,
    pub toc: Option<bool>,
    pub menu: Option<PageMenus>,

    /// Additional custom fields
    #[serde(flatten)]
    pub params: IndexMap<String, serde_json::Value>,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            description: None,
            date: None,
            lastmod: None,
            publish_date: None,
            expiry_date: None,
            weight: 0,
            draft: false,
            tags: Vec::new(),
            slug: None,
            url: None,
            layout: None,
            link_title: None,
            aliases: Vec::new(),
            toc: None,
            menu: None,
            params: IndexMap::new(),
        }
    }
}

/// Resolved front-matter timestamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageDates {
    pub date: Option<DateTime<FixedOffset>>,
    pub lastmod: Option<DateTime<FixedOffset>>,
    pub publish_date: Option<DateTime<FixedOffset>>,
    pub expiry_date: Option<DateTime<FixedOffset>>,
}

impl FrontMatter {
    /// Parse front-matter from content string
    /// Returns (front_matter, remaining_content)
    pub fn parse(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let content = content.trim_start_matches('\u{feff}').trim_start();

        if content.starts_with("+++") {
            return Self::parse_toml(content);
        }

        if content.starts_with("---") {
            return Self::parse_yaml(content);
        }

        if looks_like_json_object(content) {
            return Self::parse_json(content);
        }

        // No front-matter found
        Ok((FrontMatter::default(), content))
    }

    fn parse_toml(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let (block, remaining) =
            split_fenced(content, "+++").ok_or(FrontMatterError::Unterminated {
                format: "TOML",
                fence: "+++",
            })?;

        if block.trim().is_empty() {
            return Ok((FrontMatter::default(), remaining));
        }

        let fm = toml::from_str::<FrontMatter>(block)?;
        Ok((fm, remaining))
    }

    fn parse_yaml(content: &str) -> Result<(Self, &str), FrontMatterError> {
        match split_fenced(content, "---") {
            Some((block, remaining)) => {
                if block.trim().is_empty() {
                    return Ok((FrontMatter::default(), remaining));
                }

                // A `---` thematic break followed by prose is content, not YAML
                if !has_yaml_structure(block) {
                    return Ok((FrontMatter::default(), content));
                }

                let fm = serde_yaml::from_str::<FrontMatter>(block)?;
                Ok((fm, remaining))
            }
            None => {
                let first_line = content[3..]
                    .trim_start_matches(['\n', '\r'])
                    .lines()
                    .next()
                    .unwrap_or("");
                if has_yaml_structure(first_line) {
                    Err(FrontMatterError::Unterminated {
                        format: "YAML",
                        fence: "---",
                    })
                } else {
                    Ok((FrontMatter::default(), content))
                }
            }
        }
    }

    fn parse_json(content: &str) -> Result<(Self, &str), FrontMatterError> {
        let mut stream = serde_json::Deserializer::from_str(content).into_iter::<FrontMatter>();
        match stream.next() {
            Some(Ok(fm)) => {
                let remaining = content[stream.byte_offset()..].trim_start_matches(['\n', '\r']);
                Ok((fm, remaining))
            }
            Some(Err(e)) => Err(FrontMatterError::Json(e)),
            None => Ok((FrontMatter::default(), content)),
        }
    }

    /// Resolve every date field against the site timezone
    pub fn dates(&self, tz: Tz) -> Result<PageDates, FrontMatterError> {
        Ok(PageDates {
            date: resolve_date("date", self.date.as_deref(), tz)?,
            lastmod: resolve_date("lastmod", self.lastmod.as_deref(), tz)?,
            publish_date: resolve_date("publishDate", self.publish_date.as_deref(), tz)?,
            expiry_date: resolve_date("expiryDate", self.expiry_date.as_deref(), tz)?,
        })
    }
}

fn resolve_date(
    field: &'static str,
    value: Option<&str>,
    tz: Tz,
) -> Result<Option<DateTime<FixedOffset>>, FrontMatterError> {
    match value {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date_string(s, tz)
            .map(Some)
            .ok_or_else(|| FrontMatterError::InvalidDate {
                field,
                value: s.to_string(),
            }),
    }
}

/// Split `fence\n<block>\nfence\n<rest>`; `None` when the closing fence is missing
fn split_fenced<'a>(content: &'a str, fence: &str) -> Option<(&'a str, &'a str)> {
    let rest = content.strip_prefix(fence)?;
    let rest = rest.trim_start_matches([' ', '\t']);
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == fence {
            let block = &rest[..offset];
            let remaining = rest[offset + line.len()..].trim_start_matches(['\n', '\r']);
            return Some((block, remaining));
        }
        offset += line.len();
    }
    None
}

/// Valid YAML front-matter has at least one `key:` or `key: value` line
fn has_yaml_structure(block: &str) -> bool {
    block.lines().any(|line| {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return false;
        }
        let Some(colon_pos) = trimmed.find(':') else {
            return false;
        };
        let key = &trimmed[..colon_pos];
        let is_valid_key = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            && !matches!(key, "http" | "https" | "ftp" | "mailto");
        if !is_valid_key {
            return false;
        }
        let after_colon = &trimmed[colon_pos + 1..];
        after_colon.is_empty() || after_colon.starts_with(' ')
    })
}

/// `{` followed by a quoted key or `}`; shortcodes like `{{< x >}}` are content
fn looks_like_json_object(content: &str) -> bool {
    content
        .strip_prefix('{')
        .and_then(|rest| rest.trim_start().chars().next())
        .map(|c| c == '"' || c == '}')
        .unwrap_or(false)
}

/// Parse a date string in various formats
pub fn parse_date_string(s: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();

    // RFC 3339 / ISO 8601 with offset
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }

    let offset_formats = ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z"];
    for fmt in offset_formats {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    let datetime_formats = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return localize(dt, tz);
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return localize(d.and_hms_opt(0, 0, 0)?, tz);
        }
    }

    None
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::PageMenus;

    #[test]
    fn test_parse_toml_frontmatter() {
        let content = r#"+++
title = "Context Cancellation"
date = 2024-01-15T10:30:00Z
weight = 20
draft = true
tags = ["go", "concurrency"]
+++

Body text.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Context Cancellation"));
        assert_eq!(fm.weight, 20);
        assert!(fm.draft);
        assert_eq!(fm.tags, vec!["go", "concurrency"]);
        assert_eq!(fm.date.as_deref(), Some("2024-01-15T10:30:00Z"));
        assert_eq!(remaining, "Body text.\n");
    }

    #[test]
    fn test_parse_yaml_frontmatter() {
        let content = r#"---
title: Flexbox Basics
date: 2024-01-15 10:30:00
weight: 3
tags: css
---

This is the content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, Some("Flexbox Basics".to_string()));
        assert_eq!(fm.weight, 3);
        assert!(!fm.draft);
        assert_eq!(fm.tags, vec!["css"]);
        assert!(remaining.starts_with("This is the content."));
    }

    #[test]
    fn test_parse_json_frontmatter() {
        let content = r#"{"title": "Test Post", "tags": ["a", "b"], "weight": 2}

This is content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, Some("Test Post".to_string()));
        assert_eq!(fm.tags, vec!["a", "b"]);
        assert_eq!(fm.weight, 2);
        assert!(remaining.starts_with("This is content."));
    }

    #[test]
    fn test_shortcode_is_not_json() {
        let content = "{{< note >}}hello{{< /note >}}";
        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert_eq!(remaining, content);
    }

    #[test]
    fn test_custom_params_and_menu() {
        let content = r#"+++
title = "Tracing"
linkTitle = "Tracing"
author = "ops team"

[menu.main]
parent = "observability"
weight = 5
+++
"#;
        let (fm, _) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.link_title.as_deref(), Some("Tracing"));
        assert_eq!(fm.params["author"], serde_json::json!("ops team"));
        match fm.menu {
            Some(PageMenus::Map(map)) => {
                assert_eq!(map["main"].parent.as_deref(), Some("observability"));
                assert_eq!(map["main"].weight, Some(5));
            }
            other => panic!("unexpected menu: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let content = "+++\ntitle = \"unterminated\nweight = 1\n+++\nbody";
        assert!(matches!(
            FrontMatter::parse(content),
            Err(FrontMatterError::Toml(_))
        ));
    }

    #[test]
    fn test_wrong_type_is_error() {
        let content = "---\ntitle: Weights\nweight: heavy\n---\nbody";
        assert!(matches!(
            FrontMatter::parse(content),
            Err(FrontMatterError::Yaml(_))
        ));
    }

    #[test]
    fn test_unterminated_toml_is_error() {
        let content = "+++\ntitle = \"x\"\n\nbody";
        assert!(matches!(
            FrontMatter::parse(content),
            Err(FrontMatterError::Unterminated { format: "TOML", .. })
        ));
    }

    #[test]
    fn test_unterminated_yaml_is_error() {
        let content = "---\ntitle: x\n\nbody";
        assert!(matches!(
            FrontMatter::parse(content),
            Err(FrontMatterError::Unterminated { format: "YAML", .. })
        ));
    }

    #[test]
    fn test_markdown_separator_not_yaml() {
        let content = r#"
---

Some random text with markdown lists:
- Item 1
- Item 2

---
More content here.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("Some random text"));
    }

    #[test]
    fn test_content_with_url_not_yaml() {
        let content = r#"
---

Check out https://example.com/path and http://test.com

---
More content.
"#;

        let (fm, remaining) = FrontMatter::parse(content).unwrap();
        assert_eq!(fm.title, None);
        assert!(remaining.contains("https://example.com"));
    }

    #[test]
    fn test_no_frontmatter() {
        let (fm, remaining) = FrontMatter::parse("# Heading\n\ntext").unwrap();
        assert_eq!(fm.weight, 0);
        assert!(!fm.draft);
        assert_eq!(remaining, "# Heading\n\ntext");
    }

    #[test]
    fn test_parse_dates_with_timezone() {
        let fm = FrontMatter {
            date: Some("2024-01-15 10:30:00".to_string()),
            lastmod: Some("2024-02-01T08:00:00+02:00".to_string()),
            publish_date: Some("2024/03/01".to_string()),
            ..Default::default()
        };

        let dates = fm.dates(chrono_tz::Asia::Tokyo).unwrap();
        let date = dates.date.unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-15T10:30:00+09:00");
        assert_eq!(
            dates.lastmod.unwrap().to_rfc3339(),
            "2024-02-01T08:00:00+02:00"
        );
        assert_eq!(
            dates.publish_date.unwrap().format("%Y-%m-%d").to_string(),
            "2024-03-01"
        );
        assert!(dates.expiry_date.is_none());
    }

    #[test]
    fn test_invalid_date_is_error() {
        let fm = FrontMatter {
            date: Some("last tuesday".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fm.dates(Tz::UTC),
            Err(FrontMatterError::InvalidDate { field: "date", .. })
        ));
    }
}
