// ⚙️ Pipeline configuration
//
// The contribution mapping (which payroll deduction columns fold into which
// output column) changes per payroll provider setup, so it lives in TOML
// rather than in code:
//
//   output_prefix = "ADPRun"
//   retention_days = 550
//   source_tag = "ADP"
//
//   [[contribution]]
//   output = "Pre-tax Contribution"
//   aliases = ["401K $", "401K"]

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_OUTPUT_PREFIX: &str = "ADPRun";
pub const DEFAULT_RETENTION_DAYS: i64 = 550;
pub const DEFAULT_SOURCE_TAG: &str = "ADP";

/// One output column and the source columns folded into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionMapping {
    pub output: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ContributionMapping {
    pub fn new<I, S>(output: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ContributionMapping {
            output: output.into(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First segment of the output file name
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Terminated employees this many days or more from the pay date are dropped
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Prefix given to source columns consumed by a contribution merge
    #[serde(default = "default_source_tag")]
    pub source_tag: String,

    /// Applied in file order
    #[serde(default, rename = "contribution")]
    pub contributions: Vec<ContributionMapping>,
}

fn default_output_prefix() -> String {
    DEFAULT_OUTPUT_PREFIX.to_string()
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_source_tag() -> String {
    DEFAULT_SOURCE_TAG.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            output_prefix: default_output_prefix(),
            retention_days: default_retention_days(),
            source_tag: default_source_tag(),
            contributions: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path).map_err(|e| {
            ReconcileError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retention_days <= 0 {
            return Err(ReconcileError::Config(format!(
                "retention_days must be positive, got {}",
                self.retention_days
            )));
        }
        if let Some(m) = self.contributions.iter().find(|m| m.output.trim().is_empty()) {
            return Err(ReconcileError::Config(format!(
                "contribution mapping with aliases {:?} has no output column",
                m.aliases
            )));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.retention_days, 550);
        assert_eq!(config.output_prefix, "ADPRun");
    }

    #[test]
    fn test_contributions_keep_file_order() {
        let config = PipelineConfig::from_toml(
            r#"
            retention_days = 400

            [[contribution]]
            output = "Roth Contribution"
            aliases = ["Roth $", "Roth"]

            [[contribution]]
            output = "Loan Repayment"
            aliases = ["Loan 1"]
            "#,
        )
        .unwrap();

        assert_eq!(config.retention_days, 400);
        assert_eq!(config.contributions.len(), 2);
        assert_eq!(config.contributions[0].output, "Roth Contribution");
        assert_eq!(config.contributions[1].aliases, vec!["Loan 1".to_string()]);
    }

    #[test]
    fn test_rejects_non_positive_retention() {
        assert!(PipelineConfig::from_toml("retention_days = 0").is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = PipelineConfig::from_toml("retention_days = \"soon\"").unwrap_err();
        assert!(matches!(err, ReconcileError::Toml(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load(Path::new("no/such/columns.toml")).unwrap_err();
        assert!(matches!(err, ReconcileError::Config(_)));
    }
}
