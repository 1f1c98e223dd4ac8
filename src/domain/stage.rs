//! Pipeline definitions and loading.
//!
//! A pipeline is an ordered list of stages; each stage names its
//! criticality, its combination mode, and the providers that serve it in
//! priority order. Definitions come from YAML or the built-in daily brief
//! pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDef {
    /// Pipeline name (used in CLI and run records)
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Ordered list of stages; declaration order is execution order
    pub stages: Vec<StageDef>,
}

impl PipelineDef {
    /// Load a pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a pipeline from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse pipeline YAML")
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Pipeline name cannot be empty");
        }

        if self.stages.is_empty() {
            anyhow::bail!("Pipeline must have at least one stage");
        }

        let mut seen = std::collections::HashSet::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.is_empty() {
                anyhow::bail!("Stage {} has an empty name", i);
            }
            if !seen.insert(stage.name.as_str()) {
                anyhow::bail!("Duplicate stage name '{}'", stage.name);
            }
            if stage.providers.is_empty() {
                anyhow::bail!("Stage '{}' has no providers", stage.name);
            }
        }

        Ok(())
    }

    /// Get a stage by name
    pub fn get_stage(&self, name: &str) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The built-in daily market brief pipeline.
    ///
    /// Every fetch stage is non-critical: the brief degrades gracefully
    /// when a source is down. Generation and delivery are the critical
    /// terminal hand-offs and are not stages here.
    pub fn default_daily() -> Self {
        Self {
            name: "daily-brief".to_string(),
            description: "Daily market brief: news, market data, IPOs, earnings".to_string(),
            stages: vec![
                StageDef {
                    name: "news".to_string(),
                    criticality: Criticality::NonCritical,
                    mode: CombinationMode::MergeDedup,
                    providers: vec![
                        "newsapi".to_string(),
                        "finnhub".to_string(),
                        "rss".to_string(),
                    ],
                },
                StageDef {
                    name: "market".to_string(),
                    criticality: Criticality::NonCritical,
                    mode: CombinationMode::FirstSuccess,
                    providers: vec!["market_primary".to_string(), "market_fallback".to_string()],
                },
                StageDef {
                    name: "ipo".to_string(),
                    criticality: Criticality::NonCritical,
                    mode: CombinationMode::FirstSuccess,
                    providers: vec!["ipo_primary".to_string(), "ipo_fallback".to_string()],
                },
                StageDef {
                    name: "earnings".to_string(),
                    criticality: Criticality::NonCritical,
                    mode: CombinationMode::FirstSuccess,
                    providers: vec!["earnings".to_string()],
                },
            ],
        }
    }
}

/// A single stage in a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    /// Stage name (unique within pipeline)
    pub name: String,

    /// Whether this stage's failure aborts the run
    #[serde(default)]
    pub criticality: Criticality,

    /// How multiple providers' results are reconciled
    #[serde(default)]
    pub mode: CombinationMode,

    /// Provider ids in priority order (first is tried/ranked first)
    pub providers: Vec<String>,
}

/// Classification deciding whether a failed stage aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts remaining stages and the run
    Critical,

    /// Failure degrades the run; the pipeline continues with an empty entry
    NonCritical,
}

impl Default for Criticality {
    fn default() -> Self {
        Self::NonCritical
    }
}

/// Policy for reconciling multiple providers' results for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationMode {
    /// Mutually-exclusive alternatives: highest-priority success wins,
    /// later providers are never invoked
    FirstSuccess,

    /// Complementary sources: every success is merged, duplicates dropped
    MergeDedup,
}

impl Default for CombinationMode {
    fn default() -> Self {
        Self::FirstSuccess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PIPELINE_YAML: &str = r#"
name: test
description: Test pipeline

stages:
  - name: news
    criticality: non_critical
    mode: merge_dedup
    providers: [newsapi, rss]

  - name: market
    criticality: critical
    providers: [market_primary]
"#;

    #[test]
    fn test_pipeline_parsing() {
        let pipeline = PipelineDef::from_yaml(TEST_PIPELINE_YAML).unwrap();

        assert_eq!(pipeline.name, "test");
        assert_eq!(pipeline.stages.len(), 2);
        assert_eq!(pipeline.stages[0].mode, CombinationMode::MergeDedup);
        assert_eq!(pipeline.stages[1].criticality, Criticality::Critical);
        // mode defaults to first_success
        assert_eq!(pipeline.stages[1].mode, CombinationMode::FirstSuccess);
    }

    #[test]
    fn test_pipeline_validation() {
        let pipeline = PipelineDef::from_yaml(TEST_PIPELINE_YAML).unwrap();
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_empty_providers_rejected() {
        let yaml = r#"
name: invalid
stages:
  - name: news
    providers: []
"#;
        let pipeline = PipelineDef::from_yaml(yaml).unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_duplicate_stage_names_rejected() {
        let yaml = r#"
name: invalid
stages:
  - name: news
    providers: [a]
  - name: news
    providers: [b]
"#;
        let pipeline = PipelineDef::from_yaml(yaml).unwrap();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn test_default_daily_pipeline() {
        let pipeline = PipelineDef::default_daily();
        assert!(pipeline.validate().is_ok());
        assert_eq!(pipeline.stages[0].name, "news");
        assert_eq!(pipeline.stages[0].mode, CombinationMode::MergeDedup);
        assert!(pipeline
            .stages
            .iter()
            .all(|s| s.criticality == Criticality::NonCritical));
    }
}
