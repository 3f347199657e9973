//! Scaffold a new site

use anyhow::{bail, Context as _, Result};
use std::fs;
use std::path::Path;

use crate::config::CONFIG_FILES;

const CONFIG: &str = r#"# Site
title = "Notes"
baseURL = "http://localhost:1313/"
languageCode = "en-us"
author = ""
description = ""
timezone = "UTC"

# Build
buildDrafts = false
buildFuture = false
buildExpired = false
paginate = 10
summaryLength = 70
feed_limit = 20

[highlight]
theme = "InspiredGitHub"
line_numbers = false

[lint]
deny_warnings = false
check_fragments = true
ignore = []

[[menu.main]]
identifier = "home"
name = "Home"
url = "/"
weight = 1

[[menu.main]]
identifier = "getting-started"
name = "Getting started"
page_ref = "/getting-started"
weight = 2

[params]
date_format = "Jan 2, 2006"
"#;

const HOME: &str = r#"---
title: Notes
description: Topic-organized notes
---

Welcome. Notes are grouped by topic; pick one from the menu.
"#;

const SECTION: &str = r#"---
title: Getting started
weight: 1
---

How these notes are organized.
"#;

const ARCHETYPE: &str = r#"---
title: {{ title | json_encode() }}
date: {{ date }}
draft: true
tags: []
---

"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    if let Some(existing) = CONFIG_FILES
        .iter()
        .map(|name| target_dir.join(name))
        .find(|path| path.exists())
    {
        bail!("{:?} already contains a site ({:?})", target_dir, existing);
    }

    for dir in ["content/getting-started", "layouts", "static", "archetypes"] {
        let path = target_dir.join(dir);
        fs::create_dir_all(&path).with_context(|| format!("Failed to create {:?}", path))?;
    }

    let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let first_note = format!(
        r#"---
title: Writing notes
date: {}
tags: [meta]
---

Every Markdown file under `content/` becomes a page. Directories become
sections; an `_index.md` gives a section its title and text.

## Front matter

Set `title`, `date`, `weight` and `tags` at the top of each file. Pages with
`draft: true` are left out unless you build with `--drafts`.

## Links

Link to other notes by their URL, like the [section](../) this note lives in.
Run `quire check` to find broken links.
"#,
        date
    );

    let files = [
        ("config.toml", CONFIG.to_string()),
        ("content/_index.md", HOME.to_string()),
        ("content/getting-started/_index.md", SECTION.to_string()),
        ("content/getting-started/writing-notes.md", first_note),
        ("archetypes/default.md", ARCHETYPE.to_string()),
    ];
    for (name, content) in files {
        let path = target_dir.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {:?}", path))?;
        tracing::debug!("Created {:?}", path);
    }

    Ok(())
}
