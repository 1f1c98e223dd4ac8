//! The fixed output schema for the generation collaborator.
//!
//! The generator must return a populated `Brief`; dynamically-shaped output
//! is rejected at the hand-off. Schema validation failure is a permanent
//! error, never a crash.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One story in the global or domestic sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub headline: String,

    /// Why this matters to the reader, one or two sentences
    #[serde(default)]
    pub impact: String,

    #[serde(default)]
    pub url: String,
}

/// Generated daily brief. Sections are fixed; `summary` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
    /// Top-line bullets (required, non-empty)
    pub summary: Vec<String>,

    /// Index levels, FX, and other market figures
    #[serde(default)]
    pub market_data: serde_json::Value,

    #[serde(default)]
    pub global_stories: Vec<Story>,

    #[serde(default)]
    pub domestic_stories: Vec<Story>,

    #[serde(default)]
    pub ipo_commentary: String,

    /// Tickers or themes to watch
    #[serde(default)]
    pub watch_list: Vec<String>,
}

/// Schema violation in generated output.
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("summary section is missing or empty")]
    EmptySummary,

    #[error("summary contains an empty bullet")]
    BlankBullet,

    #[error("story with empty headline in section '{0}'")]
    BlankHeadline(String),
}

impl Brief {
    /// Validate required fields. Optional sections may be empty.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.summary.is_empty() {
            return Err(SchemaError::EmptySummary);
        }
        if self.summary.iter().any(|b| b.trim().is_empty()) {
            return Err(SchemaError::BlankBullet);
        }
        for (section, stories) in [
            ("global_stories", &self.global_stories),
            ("domestic_stories", &self.domestic_stories),
        ] {
            if stories.iter().any(|s| s.headline.trim().is_empty()) {
                return Err(SchemaError::BlankHeadline(section.to_string()));
            }
        }
        Ok(())
    }

    /// Render the brief to deliverable plain text.
    ///
    /// Test mode tags the subject so a test send is unmistakable.
    pub fn render(&self, test_mode: bool) -> RenderedBrief {
        let today = Utc::now().format("%a %d %b %Y");
        let mut subject = format!("Your Market Brief — {today}");
        if test_mode {
            subject = format!("[TEST] {subject}");
        }

        let mut body = String::new();

        body.push_str("TL;DR\n");
        for (i, bullet) in self.summary.iter().enumerate() {
            body.push_str(&format!("  {}. {}\n", i + 1, bullet));
        }

        if !self.market_data.is_null() {
            body.push_str("\nMARKETS\n");
            body.push_str(&format!(
                "  {}\n",
                serde_json::to_string(&self.market_data).unwrap_or_default()
            ));
        }

        for (heading, stories) in [
            ("GLOBAL", &self.global_stories),
            ("INDIA", &self.domestic_stories),
        ] {
            if stories.is_empty() {
                continue;
            }
            body.push_str(&format!("\n{heading}\n"));
            for story in stories {
                body.push_str(&format!("  - {}\n", story.headline));
                if !story.impact.is_empty() {
                    body.push_str(&format!("    {}\n", story.impact));
                }
            }
        }

        if !self.ipo_commentary.is_empty() {
            body.push_str(&format!("\nIPO WATCH\n  {}\n", self.ipo_commentary));
        }

        if !self.watch_list.is_empty() {
            body.push_str(&format!("\nWATCH LIST\n  {}\n", self.watch_list.join(", ")));
        }

        RenderedBrief { subject, body }
    }
}

/// Rendered content handed to the delivery collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedBrief {
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_brief() -> Brief {
        Brief {
            summary: vec!["Nifty closed flat".to_string()],
            market_data: serde_json::json!({"nifty": 22000.5}),
            global_stories: vec![Story {
                headline: "Fed holds rates".to_string(),
                impact: "Supports risk appetite".to_string(),
                url: String::new(),
            }],
            domestic_stories: vec![],
            ipo_commentary: "Two mainboard IPOs open this week".to_string(),
            watch_list: vec!["HDFCBANK".to_string(), "INFY".to_string()],
        }
    }

    #[test]
    fn test_valid_brief() {
        assert!(sample_brief().validate().is_ok());
    }

    #[test]
    fn test_empty_summary_rejected() {
        let mut brief = sample_brief();
        brief.summary.clear();
        assert!(matches!(brief.validate(), Err(SchemaError::EmptySummary)));
    }

    #[test]
    fn test_blank_headline_rejected() {
        let mut brief = sample_brief();
        brief.global_stories[0].headline = "  ".to_string();
        assert!(matches!(
            brief.validate(),
            Err(SchemaError::BlankHeadline(_))
        ));
    }

    #[test]
    fn test_render_test_mode_tags_subject() {
        let rendered = sample_brief().render(true);
        assert!(rendered.subject.starts_with("[TEST] "));

        let rendered = sample_brief().render(false);
        assert!(!rendered.subject.contains("[TEST]"));
    }

    #[test]
    fn test_render_includes_sections() {
        let rendered = sample_brief().render(false);
        assert!(rendered.body.contains("TL;DR"));
        assert!(rendered.body.contains("Fed holds rates"));
        assert!(rendered.body.contains("IPO WATCH"));
        assert!(rendered.body.contains("HDFCBANK"));
    }

    #[test]
    fn test_brief_parses_with_missing_optional_sections() {
        let json = r#"{"summary": ["one bullet"]}"#;
        let brief: Brief = serde_json::from_str(json).unwrap();
        assert!(brief.validate().is_ok());
        assert!(brief.global_stories.is_empty());
    }
}
