//! Lint the content

use anyhow::Result;

use crate::content::ContentLoader;
use crate::lint::{Linter, Report};
use crate::Quire;

/// Load every file, keeping failures, and run the linter over the result
pub fn run(quire: &Quire) -> Result<Report> {
    let outcome = ContentLoader::new(quire).load_all();
    tracing::debug!(
        "Checking {} pages ({} failed to load)",
        outcome.site.pages().len(),
        outcome.failures.len()
    );
    Ok(Linter::new(quire).check(&outcome))
}
