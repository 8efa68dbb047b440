//! Tracked content records
//!
//! The directory tracks two record types under `content/`: punk profiles
//! (`content/punks/{id}.md`) and project entries
//! (`content/projects/{slug}.md`). Both are markdown files with YAML
//! frontmatter.

use serde::{Deserialize, Serialize};

pub const PUNKS_PREFIX: &str = "content/punks/";
pub const PROJECTS_PREFIX: &str = "content/projects/";

/// Frontmatter of a project entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFrontmatter {
    pub name: String,
    pub description: String,
    /// Must begin with `https://`
    pub url: String,
    /// ISO date, `YYYY-MM-DD`
    #[serde(rename = "launchDate")]
    pub launch_date: String,
    pub tags: Vec<String>,
    /// Punk IDs (0-9999) credited as creators
    pub creators: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

/// Frontmatter of a punk profile; everything is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PunkFrontmatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
}

/// Whether a changed file is one the moderation flow cares about
pub fn is_tracked_content_path(path: &str) -> bool {
    (path.starts_with(PUNKS_PREFIX) || path.starts_with(PROJECTS_PREFIX))
        && path.ends_with(".md")
}

/// Project filenames must be lowercase slugs with hyphens only
pub fn is_valid_project_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derive the slug from a tracked project path
pub fn project_slug_from_path(path: &str) -> Option<&str> {
    path.strip_prefix(PROJECTS_PREFIX)?.strip_suffix(".md")
}

/// Punk profile filenames are the punk id itself, 0-9999
pub fn punk_id_from_path(path: &str) -> Option<u32> {
    let id: u32 = path
        .strip_prefix(PUNKS_PREFIX)?
        .strip_suffix(".md")?
        .parse()
        .ok()?;
    (id <= 9999).then_some(id)
}

/// Split a content file into (frontmatter yaml, body)
pub fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("---")?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n"))?;
    let end = rest.find("\n---")?;
    let yaml = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
    Some((yaml, body))
}

/// Insert a `thumbnail:` field into a project file's frontmatter if absent.
///
/// Text-level edit so contributor formatting and key order survive. Returns
/// `None` when the file has no frontmatter block or already references a
/// thumbnail.
pub fn patch_thumbnail(raw: &str, thumbnail_path: &str) -> Option<String> {
    let (yaml, _) = split_frontmatter(raw)?;
    if yaml
        .lines()
        .any(|line| line.trim_start().starts_with("thumbnail:"))
    {
        return None;
    }

    // The frontmatter block starts after the opening fence line.
    let fence_len = raw.find('\n')? + 1;
    let yaml_end = fence_len + yaml.len();
    let mut patched = String::with_capacity(raw.len() + thumbnail_path.len() + 16);
    patched.push_str(&raw[..yaml_end]);
    if !patched.ends_with('\n') {
        patched.push('\n');
    }
    patched.push_str(&format!("thumbnail: {thumbnail_path}\n"));
    patched.push_str(raw[yaml_end..].trim_start_matches('\n'));
    Some(patched)
}
