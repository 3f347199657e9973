//! Content module - pages, sections, bundles and content processing

mod frontmatter;
pub mod loader;
mod markdown;
mod page;
mod resource;
pub(crate) mod section;
mod site;

pub use frontmatter::{parse_date_string, FrontMatter, FrontMatterError, PageDates};
pub use loader::{ContentLoader, LoadError, LoadOutcome};
pub use markdown::{Heading, MarkdownRenderer, Rendered};
pub use page::{Page, PageKind};
pub use resource::{MediaType, Resource, Resources};
pub use section::Section;
pub use site::{ExcludedPage, Exclusion, Site, Term};
