//! Helper functions for templates
//!
//! These functions back the Tera filters registered by the template
//! renderer and the data the generator hands to templates.

mod date;
mod html;
mod toc;
mod url;

pub use date::*;
pub use html::*;
pub use toc::*;
pub use url::*;

use chrono::{DateTime, FixedOffset};

use crate::config::SiteConfig;

/// Config-bound helpers
#[derive(Debug, Clone)]
pub struct Helpers {
    config: SiteConfig,
}

impl Helpers {
    /// Create a new helpers instance
    pub fn new(config: SiteConfig) -> Self {
        Self { config }
    }

    /// Root-relative URL for a site path
    pub fn url_for(&self, path: &str) -> String {
        url_for(&self.config, path)
    }

    /// Absolute URL for a site path
    pub fn full_url_for(&self, path: &str) -> String {
        full_url_for(&self.config, path)
    }

    /// Format a date with a Go-style layout, `date_format` param by default
    pub fn date(&self, date: &DateTime<FixedOffset>, layout: Option<&str>) -> String {
        let default_layout = self
            .config
            .params
            .get("date_format")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_DATE_LAYOUT);
        format_date(date, layout.unwrap_or(default_layout))
    }
}
