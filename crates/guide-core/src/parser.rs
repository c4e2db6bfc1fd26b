/// Parser for guide content files.
///
/// A guide file is a YAML frontmatter block followed by a markdown body:
/// - Frontmatter: opening `---` line, YAML mapping, closing `---` line
/// - Step headers: `## Title`
/// - A step ends at the next `## ` header or EOF
///
/// Lines before the first step header are not part of any step. `#` and `###`
/// headers never open a step; they stay in the enclosing step's content.
///
/// Parsing never fails: a missing or malformed header yields default metadata.
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::model::{Guide, GuideListItem, GuideMetadata, Step, STEP_HEADING_LEVEL};

const FRONTMATTER_DELIMITER: &str = "---";

static STEP_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s+(.+)$").expect("valid regex"));

/// Outcome of frontmatter extraction.
///
/// `Missing` and `Malformed` both produce default metadata; they are kept apart
/// so the malformed case can be logged.
#[derive(Debug, Clone, PartialEq)]
pub enum Frontmatter {
    Missing,
    Parsed(Mapping),
    Malformed(String),
}

/// Split a guide file into its frontmatter and the body that follows it.
pub fn split_frontmatter(text: &str) -> (Frontmatter, &str) {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some((first_line, rest)) = split_line(text) else {
        return (Frontmatter::Missing, text);
    };
    if first_line.trim_end() != FRONTMATTER_DELIMITER {
        return (Frontmatter::Missing, text);
    }

    // Find the closing delimiter line and the body after its newline.
    let mut offset = 0;
    let mut remaining = rest;
    let (yaml, body) = loop {
        let Some((line, after)) = split_line(remaining) else {
            return (
                Frontmatter::Malformed("unterminated frontmatter block".to_string()),
                text,
            );
        };
        if line.trim_end() == FRONTMATTER_DELIMITER {
            break (&rest[..offset], after);
        }
        offset += remaining.len() - after.len();
        remaining = after;
    };

    let frontmatter = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(map)) => Frontmatter::Parsed(map),
        Ok(Value::Null) => Frontmatter::Parsed(Mapping::new()),
        Ok(_) => Frontmatter::Malformed("frontmatter is not a key-value mapping".to_string()),
        Err(e) => Frontmatter::Malformed(e.to_string()),
    };

    (frontmatter, body)
}

/// Split off the first line (without its terminator).
///
/// Returns `None` for empty input. The remainder starts after the `\n`, or is
/// empty when the line was the last one.
fn split_line(text: &str) -> Option<(&str, &str)> {
    if text.is_empty() {
        return None;
    }
    match text.find('\n') {
        Some(pos) => {
            let line = &text[..pos];
            Some((line.strip_suffix('\r').unwrap_or(line), &text[pos + 1..]))
        }
        None => Some((text, "")),
    }
}

/// Build metadata from a parsed frontmatter mapping, applying defaults.
pub fn metadata_from_mapping(map: &Mapping) -> GuideMetadata {
    let defaults = GuideMetadata::default();
    let field = |key: &str| map.get(key);

    let title = field("title")
        .and_then(scalar_text)
        .filter(|t| !t.is_empty())
        .unwrap_or(defaults.title);
    let description = field("description")
        .and_then(scalar_text)
        .unwrap_or_default();
    let author = field("author")
        .and_then(scalar_text)
        .filter(|a| !a.is_empty());
    let date = field("date")
        .and_then(scalar_text)
        .filter(|d| !d.is_empty())
        .map(|d| normalize_date(&d));
    let tags = match field("tags") {
        Some(Value::Sequence(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    };
    let published = !matches!(field("published"), Some(Value::Bool(false)));

    GuideMetadata {
        title,
        description,
        author,
        date,
        tags,
        published,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

/// Normalize a date or timestamp to `YYYY-MM-DD`; other text is kept as-is.
pub fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc).format("%Y-%m-%d").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, pattern) {
            return ts.format("%Y-%m-%d").to_string();
        }
    }
    raw.to_string()
}

fn resolve_metadata(frontmatter: &Frontmatter, slug: &str) -> GuideMetadata {
    match frontmatter {
        Frontmatter::Parsed(map) => metadata_from_mapping(map),
        Frontmatter::Missing => GuideMetadata::default(),
        Frontmatter::Malformed(reason) => {
            warn!(slug, reason = %reason, "malformed frontmatter, using default metadata");
            GuideMetadata::default()
        }
    }
}

/// Lowercase, keep ASCII word characters, turn whitespace and hyphen runs into
/// single hyphens, and drop edge hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    slug
}

/// Split a markdown body into steps at `## ` headings.
pub fn extract_steps(content: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    let mut current: Option<Step> = None;
    let mut current_lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(caps) = STEP_HEADING_RE.captures(line) {
            if let Some(mut step) = current.take() {
                step.content = current_lines.join("\n").trim().to_string();
                steps.push(step);
            }
            let title = caps[1].to_string();
            current = Some(Step {
                id: slugify(&title),
                title,
                content: String::new(),
                level: STEP_HEADING_LEVEL,
            });
            current_lines.clear();
        } else if current.is_some() {
            current_lines.push(line);
        }
    }

    if let Some(mut step) = current {
        step.content = current_lines.join("\n").trim().to_string();
        steps.push(step);
    }

    steps
}

/// Parse a full guide file.
pub fn parse_guide(file_text: &str, slug: &str) -> Guide {
    let (frontmatter, body) = split_frontmatter(file_text);
    let metadata = resolve_metadata(&frontmatter, slug);

    Guide {
        slug: slug.to_string(),
        metadata,
        steps: extract_steps(body),
        raw_content: body.to_string(),
    }
}

/// Parse only the frontmatter of a guide file; the body is not scanned.
pub fn parse_metadata(file_text: &str, slug: &str) -> GuideListItem {
    let (frontmatter, _) = split_frontmatter(file_text);
    GuideListItem {
        slug: slug.to_string(),
        metadata: resolve_metadata(&frontmatter, slug),
    }
}
