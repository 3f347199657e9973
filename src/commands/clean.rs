//! Clean the public directory

use anyhow::{bail, Context as _, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::Quire;

/// Remove the public directory
pub fn run(quire: &Quire) -> Result<()> {
    let public_dir = &quire.public_dir;
    let target = real_path(public_dir);
    for source in [&quire.base_dir, &quire.content_dir] {
        if real_path(source).starts_with(&target) {
            bail!(
                "Refusing to delete {:?}: it contains the site sources",
                public_dir
            );
        }
    }

    if public_dir.exists() {
        fs::remove_dir_all(public_dir)
            .with_context(|| format!("Failed to delete {:?}", public_dir))?;
        tracing::info!("Deleted: {:?}", public_dir);
    }

    Ok(())
}

/// Symlinks and `..` resolved; lexical cleanup when the path does not exist
fn real_path(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    clean
}
