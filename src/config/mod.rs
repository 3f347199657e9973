//! Configuration module

mod site;

pub use site::HighlightConfig;
pub use site::LintConfig;
pub use site::SiteConfig;
pub use site::CONFIG_FILES;
