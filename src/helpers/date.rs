//! Date helper functions

use chrono::{DateTime, TimeZone};

/// Layout used when neither the template nor the site params choose one
pub const DEFAULT_DATE_LAYOUT: &str = "January 2, 2006";

/// Go reference-time tokens, longest first at every position
const LAYOUT_TOKENS: [(&str, &str); 24] = [
    ("January", "%B"),
    ("Monday", "%A"),
    ("2006", "%Y"),
    ("-07:00", "%:z"),
    ("Z07:00", "%:z"),
    ("-0700", "%z"),
    ("Jan", "%b"),
    ("Mon", "%a"),
    ("MST", "%Z"),
    ("15", "%H"),
    ("01", "%m"),
    ("02", "%d"),
    ("_2", "%e"),
    ("03", "%I"),
    ("04", "%M"),
    ("05", "%S"),
    ("06", "%y"),
    ("PM", "%p"),
    ("pm", "%P"),
    ("1", "%-m"),
    ("2", "%-d"),
    ("3", "%-I"),
    ("4", "%-M"),
    ("5", "%-S"),
];

/// Format a date using a Go-style reference layout
///
/// # Examples
/// ```ignore
/// format_date(&date, "2006-01-02") // -> "2024-01-15"
/// format_date(&date, "Jan 2, 2006") // -> "Jan 15, 2024"
/// ```
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, layout: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let chrono_format = layout_to_chrono_format(layout);
    date.format(&chrono_format).to_string()
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Format date in full format (like "January 1, 2024")
pub fn full_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format_date(date, DEFAULT_DATE_LAYOUT)
}

/// Generate a <time> HTML element
pub fn time_tag<Tz: TimeZone>(date: &DateTime<Tz>, layout: Option<&str>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        r#"<time datetime="{}">{}</time>"#,
        date_xml(date),
        format_date(date, layout.unwrap_or(DEFAULT_DATE_LAYOUT))
    )
}

/// Convert a Go reference layout to a chrono format string
fn layout_to_chrono_format(layout: &str) -> String {
    let mut result = String::with_capacity(layout.len() * 2);
    let mut rest = layout;

    'outer: while !rest.is_empty() {
        for (token, replacement) in LAYOUT_TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                result.push_str(replacement);
                rest = after;
                continue 'outer;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            if c == '%' {
                result.push_str("%%");
            } else {
                result.push(c);
            }
        }
        rest = chars.as_str();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn sample() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 5, 14, 7, 9)
            .unwrap()
    }

    #[test]
    fn test_format_date() {
        let date = sample();
        assert_eq!(format_date(&date, "2006-01-02"), "2024-01-05");
        assert_eq!(format_date(&date, "2006/01/02 15:04:05"), "2024/01/05 14:07:09");
        assert_eq!(format_date(&date, "Jan 2, 2006"), "Jan 5, 2024");
        assert_eq!(format_date(&date, "Monday 3:04PM"), "Friday 2:07PM");
    }

    #[test]
    fn test_full_date() {
        assert_eq!(full_date(&sample()), "January 5, 2024");
    }

    #[test]
    fn test_date_xml_and_time_tag() {
        let date = sample();
        assert_eq!(date_xml(&date), "2024-01-05T14:07:09+02:00");
        assert_eq!(
            time_tag(&date, Some("2006-01-02")),
            r#"<time datetime="2024-01-05T14:07:09+02:00">2024-01-05</time>"#
        );
    }

    #[test]
    fn test_layout_conversion() {
        assert_eq!(layout_to_chrono_format("2006-01-02"), "%Y-%m-%d");
        assert_eq!(layout_to_chrono_format("15:04:05 -07:00"), "%H:%M:%S %:z");
        assert_eq!(layout_to_chrono_format("100%"), "%-m00%%");
    }
}
