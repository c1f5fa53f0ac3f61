//! Markdown document parsing: frontmatter, section splitting, and cleanup.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::document::{Document, DocumentMetadata, Section};
use crate::error::{Result, WaypointError};

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{1,6})\s+(.+)$").expect("unreachable error: failed to compile heading regex")
});

/// Words-per-minute assumption for reading-time estimates.
const READING_WPM: u32 = 200;

/// Category assigned when frontmatter does not provide one.
const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    location: Option<String>,
}

/// Parse a markdown document: optional `---` YAML frontmatter, then body.
///
/// Frontmatter supplies `title`, `category`, `tags`, and `location`;
/// anything missing falls back to the file stem, `"general"`, empty tags,
/// and an empty location. The body is split into sections and the
/// reading-time estimate is stamped into the metadata.
///
/// # Errors
///
/// Returns [`WaypointError::Parse`] when an opening frontmatter delimiter
/// has no closing delimiter, or the frontmatter is not valid YAML.
pub fn parse_document(file_name: &str, content: &str) -> Result<Document> {
    let normalized = content.replace("\r\n", "\n");
    let (frontmatter, body) = split_frontmatter(file_name, &normalized)?;

    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());

    let metadata = DocumentMetadata {
        title: frontmatter.title.unwrap_or(stem),
        file_name: file_name.to_string(),
        category: frontmatter.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        tags: frontmatter.tags,
        location: frontmatter.location.unwrap_or_default(),
        estimated_reading_time: estimate_reading_time(&body),
    };

    let sections = split_sections(&body);

    Ok(Document { metadata, body, sections })
}

fn split_frontmatter(file_name: &str, content: &str) -> Result<(Frontmatter, String)> {
    let mut lines = content.lines();

    let Some(first) = lines.next() else {
        return Ok((Frontmatter::default(), String::new()));
    };
    if first.trim() != "---" {
        return Ok((Frontmatter::default(), content.to_string()));
    }

    let mut frontmatter_lines = Vec::new();
    let mut found_end = false;
    for line in lines.by_ref() {
        if line.trim() == "---" {
            found_end = true;
            break;
        }
        frontmatter_lines.push(line);
    }

    if !found_end {
        return Err(WaypointError::Parse {
            file: file_name.to_string(),
            message: "missing closing frontmatter delimiter (`---`)".to_string(),
        });
    }

    let frontmatter_raw = frontmatter_lines.join("\n");
    let frontmatter: Frontmatter = if frontmatter_raw.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(&frontmatter_raw).map_err(|e| WaypointError::Parse {
            file: file_name.to_string(),
            message: format!("invalid frontmatter: {e}"),
        })?
    };

    let body = lines.collect::<Vec<_>>().join("\n");
    Ok((frontmatter, body))
}

/// Split markdown content into heading-delimited sections.
///
/// A line matching `#{1,6} <title>` starts a new section; everything before
/// the first heading forms a level-0 preamble with an empty title. A section
/// is kept only if at least one body line (blank lines included) was
/// appended to it, so a trailing heading with no body is dropped.
pub fn split_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title = String::new();
    let mut level: u8 = 0;
    let mut lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(caps) = HEADING_RE.captures(line) {
            if !lines.is_empty() {
                sections.push(Section { title, level, body: lines.join("\n").trim().to_string() });
                lines = Vec::new();
            }
            level = caps[1].len() as u8;
            title = caps[2].trim().to_string();
        } else {
            lines.push(line);
        }
    }

    if !lines.is_empty() {
        sections.push(Section { title, level, body: lines.join("\n").trim().to_string() });
    }

    sections
}

/// Estimate reading time in seconds, assuming 200 words per minute.
pub fn estimate_reading_time(text: &str) -> u32 {
    let word_count = text.split_whitespace().count() as u32;
    word_count * 60 / READING_WPM
}

static BLANK_RUNS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\s*\n\s*\n").expect("unreachable error: failed to compile blank-runs regex")
});
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\([^)]+\)").expect("unreachable error: failed to compile image regex")
});
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("unreachable error: failed to compile link regex")
});
static FENCE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("```[^\n]*\n").expect("unreachable error: failed to compile fence regex")
});
static SPACE_RUNS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(" {2,}").expect("unreachable error: failed to compile space-runs regex")
});

/// Strip markdown syntax that adds noise to embeddings.
///
/// Collapses runs of blank lines, replaces image and link syntax with their
/// text, removes code-fence markers, and collapses repeated spaces.
pub fn clean_content(content: &str) -> String {
    let content = BLANK_RUNS_RE.replace_all(content, "\n\n");
    let content = IMAGE_RE.replace_all(&content, "$1");
    let content = LINK_RE.replace_all(&content, "$1");
    let content = FENCE_OPEN_RE.replace_all(&content, "");
    let content = content.replace("```", "");
    let content = SPACE_RUNS_RE.replace_all(&content, " ");
    content.trim().to_string()
}
