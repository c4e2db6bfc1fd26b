/// `llms.txt` export of the guide corpus.
///
/// See <https://llmstxt.org/> for the convention this layout follows.
use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use regex::Regex;

use crate::config::{Config, SiteMetadata};
use crate::model::Guide;

static EXCESS_NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct LlmsTxtGenerator {
    pub site: SiteMetadata,
    /// Emit each step's content under its title.
    pub include_step_content: bool,
}

impl LlmsTxtGenerator {
    pub fn new(site: SiteMetadata, include_step_content: bool) -> Self {
        Self {
            site,
            include_step_content,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.site.clone(), config.llms_txt.include_step_content)
    }

    /// Render `guides` with today's UTC date in the footer.
    pub fn generate(&self, guides: &[Guide]) -> String {
        self.generate_at(guides, Utc::now().date_naive())
    }

    pub fn generate_at(&self, guides: &[Guide], date: NaiveDate) -> String {
        let mut lines: Vec<String> = Vec::new();

        lines.push(format!("# {}", self.site.title));
        lines.push(String::new());
        lines.push(self.site.description.clone());
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());

        lines.push("## Guides".to_string());
        lines.push(String::new());
        for guide in guides {
            lines.push(format!("- [{}](#{})", guide.metadata.title, guide.slug));
        }
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());

        for guide in guides {
            self.push_guide(&mut lines, guide);
        }

        lines.push(format!("Generated from {}", self.site.title));
        lines.push(format!("Total Guides: {}", guides.len()));
        lines.push(format!("Last Updated: {}", date.format("%Y-%m-%d")));

        lines.join("\n")
    }

    fn push_guide(&self, lines: &mut Vec<String>, guide: &Guide) {
        let meta = &guide.metadata;

        lines.push(format!("## {} {{#{}}}", meta.title, guide.slug));
        lines.push(String::new());

        if !meta.description.is_empty() {
            lines.push(meta.description.clone());
            lines.push(String::new());
        }

        let byline: Vec<String> = [
            meta.author.as_ref().map(|a| format!("Author: {a}")),
            meta.date.as_ref().map(|d| format!("Date: {d}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !byline.is_empty() {
            lines.push(byline.join(" | "));
            lines.push(String::new());
        }

        if !meta.tags.is_empty() {
            lines.push(format!("Tags: {}", meta.tags.join(", ")));
            lines.push(String::new());
        }

        lines.push(format!("URL: /{}", guide.slug));
        lines.push(String::new());

        if !guide.steps.is_empty() {
            lines.push("### Steps".to_string());
            lines.push(String::new());

            for (i, step) in guide.steps.iter().enumerate() {
                lines.push(format!("{}. {}", i + 1, step.title));
                if self.include_step_content && !step.content.is_empty() {
                    lines.push(String::new());
                    lines.push(
                        EXCESS_NEWLINES_RE
                            .replace_all(step.content.trim(), "\n\n")
                            .into_owned(),
                    );
                    lines.push(String::new());
                }
            }
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
    }
}
