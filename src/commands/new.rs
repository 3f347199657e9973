//! Create a new content file from an archetype

use anyhow::{bail, Context as _, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tera::{Context, Tera};

use crate::content::loader::title_from_name;
use crate::Quire;

/// Used when the site has no matching archetype
const DEFAULT_ARCHETYPE: &str = r#"---
title: {{ title | json_encode() }}
date: {{ date }}
draft: true
---

"#;

/// Create `path` (relative to the content dir) and return where it was written
///
/// The archetype is `archetypes/<section>.md`, then `archetypes/default.md`,
/// then a built-in one. Archetypes are Tera templates with `title`, `date`,
/// `name` and `section` in scope.
pub fn create_content(quire: &Quire, path: &str, title: Option<&str>) -> Result<PathBuf> {
    let relative = content_path(path)?;
    let file_path = quire.content_dir.join(&relative);
    if file_path.exists() {
        bail!("File already exists: {:?}", file_path);
    }

    let section = relative
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let name = page_name(&relative);
    let title = title
        .map(str::to_string)
        .unwrap_or_else(|| title_from_name(&name));
    let now = chrono::Utc::now().with_timezone(&quire.config.tz());

    let (archetype_name, archetype) = find_archetype(quire, &section)?;
    let mut context = Context::new();
    context.insert("title", &title);
    context.insert("date", &now.to_rfc3339());
    context.insert("name", &name);
    context.insert("section", &section);
    let content = Tera::one_off(&archetype, &context, false)
        .with_context(|| format!("Failed to render archetype {}", archetype_name))?;

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&file_path, content)
        .with_context(|| format!("Failed to write {:?}", file_path))?;
    tracing::info!("Created {:?} from {}", file_path, archetype_name);

    Ok(file_path)
}

/// Validate the requested path and add `.md` when it has no extension
fn content_path(path: &str) -> Result<PathBuf> {
    let trimmed = path.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        bail!("Expected a file path such as go/errors.md, got {:?}", path);
    }

    let mut relative = PathBuf::from(trimmed);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        bail!("Content path must stay inside the content directory: {:?}", path);
    }
    if relative.extension().is_none() {
        relative.set_extension("md");
    }
    Ok(relative)
}

/// Leaf bundles are named by their directory
fn page_name(relative: &Path) -> String {
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    if stem == "index" || stem == "_index" {
        if let Some(dir) = relative.parent().and_then(|p| p.file_name()) {
            return dir.to_string_lossy().to_string();
        }
    }
    stem
}

fn find_archetype(quire: &Quire, section: &str) -> Result<(String, String)> {
    let first_section = section.split('/').next().unwrap_or_default();
    let mut candidates = Vec::new();
    if !first_section.is_empty() {
        candidates.push(format!("{}.md", first_section));
    }
    candidates.push("default.md".to_string());

    for candidate in candidates {
        let path = quire.archetype_dir.join(&candidate);
        if path.is_file() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read archetype {:?}", path))?;
            return Ok((candidate, content));
        }
    }
    Ok(("built-in archetype".to_string(), DEFAULT_ARCHETYPE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::FrontMatter;

    fn quire(dir: &Path) -> Quire {
        Quire::with_config(dir, SiteConfig::default())
    }

    #[test]
    fn test_new_uses_builtin_archetype() {
        let dir = tempfile::tempdir().unwrap();
        let quire = quire(dir.path());

        let path = create_content(&quire, "go/error-wrapping", None).unwrap();
        assert_eq!(path, dir.path().join("content/go/error-wrapping.md"));

        let content = fs::read_to_string(&path).unwrap();
        let (fm, _) = FrontMatter::parse(&content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Error wrapping"));
        assert!(fm.draft);
        assert!(fm.date.is_some());
    }

    #[test]
    fn test_new_prefers_section_archetype() {
        let dir = tempfile::tempdir().unwrap();
        let quire = quire(dir.path());
        fs::create_dir_all(&quire.archetype_dir).unwrap();
        fs::write(
            quire.archetype_dir.join("default.md"),
            "---\ntitle: {{ title | json_encode() }}\n---\ndefault\n",
        )
        .unwrap();
        fs::write(
            quire.archetype_dir.join("rust.md"),
            "---\ntitle: {{ title | json_encode() }}\ntags: [{{ section }}]\n---\n# {{ name }}\n",
        )
        .unwrap();

        let rust = create_content(&quire, "rust/traits/index.md", Some("Traits \"101\"")).unwrap();
        let content = fs::read_to_string(&rust).unwrap();
        let (fm, body) = FrontMatter::parse(&content).unwrap();
        assert_eq!(fm.title.as_deref(), Some("Traits \"101\""));
        assert_eq!(fm.tags, vec!["rust/traits"]);
        assert_eq!(body.trim(), "# traits");

        let go = create_content(&quire, "go/context.md", None).unwrap();
        assert!(fs::read_to_string(go).unwrap().contains("default"));
    }

    #[test]
    fn test_new_rejects_bad_paths() {
        let dir = tempfile::tempdir().unwrap();
        let quire = quire(dir.path());

        assert!(create_content(&quire, "../outside.md", None).is_err());
        assert!(create_content(&quire, "go/", None).is_err());

        create_content(&quire, "go/once.md", None).unwrap();
        assert!(create_content(&quire, "go/once.md", None).is_err());
    }
}
