//! Subprocess-based generation collaborator.
//!
//! Spawns a configured command, feeds the pipeline context as JSON on
//! stdin, and parses stdout as a `Brief`. Schema validation failure is a
//! permanent hand-off error, not a crash.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::{Brief, PipelineContext};

use super::Generator;

/// Generator that shells out to an external command.
pub struct CommandGenerator {
    /// Program to spawn
    program: String,

    /// Arguments passed to the program
    args: Vec<String>,

    /// Wall-clock budget for one generation call
    call_timeout: Duration,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, call_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            call_timeout,
        }
    }

    async fn run_subprocess(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn generator '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .context("Failed to write context to generator stdin")?;
            // Drop stdin to signal EOF
        }

        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Generator '{}' timed out after {:?}",
                    self.program, self.call_timeout
                )
            })?
            .with_context(|| format!("Failed to wait for generator '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            anyhow::bail!(
                "Generator '{}' failed with exit code {}: {}",
                self.program,
                exit_code,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("Generator output is not valid UTF-8")
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        "command"
    }

    async fn generate(&self, context: &PipelineContext) -> Result<Brief> {
        let input = serde_json::to_string(&context.to_json())
            .context("Failed to serialize pipeline context")?;

        let stdout = self.run_subprocess(&input).await?;

        let brief: Brief = serde_json::from_str(stdout.trim())
            .context("Generator output does not match the brief schema")?;
        brief
            .validate()
            .context("Generated brief failed schema validation")?;

        Ok(brief)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generator_parses_valid_brief() {
        // `cat` echoes stdin, so feeding it nothing useful fails parsing;
        // use a command that emits a fixed brief instead.
        let brief_json = r#"{"summary": ["markets were quiet"]}"#;
        let generator = CommandGenerator::new(
            "sh",
            vec![
                "-c".to_string(),
                // Drain stdin so the generator's context write cannot race
                // the stub's exit and hit a broken pipe.
                format!("cat >/dev/null; echo '{brief_json}'"),
            ],
            Duration::from_secs(5),
        );

        let brief = generator
            .generate(&PipelineContext::new())
            .await
            .unwrap();
        assert_eq!(brief.summary, vec!["markets were quiet"]);
    }

    #[tokio::test]
    async fn test_generator_rejects_invalid_schema() {
        let generator = CommandGenerator::new(
            "sh",
            vec!["-c".to_string(), r#"echo '{"summary": []}'"#.to_string()],
            Duration::from_secs(5),
        );

        let result = generator.generate(&PipelineContext::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_generator_surfaces_nonzero_exit() {
        let generator = CommandGenerator::new(
            "sh",
            vec!["-c".to_string(), "exit 3".to_string()],
            Duration::from_secs(5),
        );

        let result = generator.generate(&PipelineContext::new()).await;
        assert!(result.is_err());
    }
}
