//! Spawning the `aws` CLI for STS and ECR calls.

use crate::media_type::ManifestKind;
use crate::registry::{valid_account_id, validate_repository_name};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info};

/// Handle on the `aws` executable.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: PathBuf,
}

impl Default for AwsCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsCli {
    /// Use `aws` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("aws"),
        }
    }

    /// Use a specific executable instead of `aws` from `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }

    /// Resolve the account id behind the current credentials through STS.
    pub async fn caller_account(&self) -> Result<String, EcrError> {
        let args = [
            "sts",
            "get-caller-identity",
            "--query",
            "Account",
            "--output",
            "text",
        ];

        info!("Resolving AWS account through STS");
        let output = self.run_captured(&args).await?;

        let account_id = output.trim().to_string();
        if !valid_account_id(&account_id) {
            return Err(EcrError::InvalidAccountId(account_id));
        }

        debug!("Caller account: {}", account_id);
        Ok(account_id)
    }

    /// Fetch a short-lived registry password for docker login.
    ///
    /// The returned token is a secret; callers must keep it out of argv and
    /// out of the logs. This function only ever logs the region.
    pub async fn login_password(&self, region: &str) -> Result<String, EcrError> {
        let args = ["ecr", "get-login-password", "--region", region];

        info!("Requesting ECR login password for {}", region);
        let output = self.run_captured(&args).await?;

        let password = output.trim().to_string();
        if password.is_empty() {
            return Err(EcrError::EmptyOutput {
                command: self.describe(&args),
            });
        }

        Ok(password)
    }

    /// List images in a repository via `describe-images`.
    pub async fn describe_images(
        &self,
        region: &str,
        repository: &str,
    ) -> Result<Vec<ImageDetail>, EcrError> {
        validate_repository_name(repository)?;

        let args = [
            "ecr",
            "describe-images",
            "--repository-name",
            repository,
            "--region",
            region,
            "--output",
            "json",
        ];

        info!("Describing images in {} ({})", repository, region);
        let output = self.run_captured(&args).await?;

        let response: DescribeImagesResponse =
            serde_json::from_str(&output).map_err(|e| EcrError::Json {
                command: self.describe(&args),
                source: e,
            })?;

        debug!(
            "{} holds {} image(s)",
            repository,
            response.image_details.len()
        );
        Ok(response.image_details)
    }

    /// Run a command to completion and return its stdout. Stdout is never
    /// logged here since it may carry a registry password.
    async fn run_captured(&self, args: &[&str]) -> Result<String, EcrError> {
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| EcrError::Spawn(self.describe(args), e))?;

        if !output.status.success() {
            return Err(EcrError::ExitFailure {
                command: self.describe(args),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Response envelope of `aws ecr describe-images`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeImagesResponse {
    #[serde(default)]
    image_details: Vec<ImageDetail>,
}

/// One image as reported by `aws ecr describe-images`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetail {
    /// Repository holding the image
    #[serde(default)]
    pub repository_name: Option<String>,
    /// Tags currently pointing at this image
    #[serde(default)]
    pub image_tags: Vec<String>,
    /// Digest of the image manifest
    #[serde(default)]
    pub image_digest: Option<String>,
    /// Total size in bytes
    #[serde(default)]
    pub image_size_in_bytes: Option<u64>,
    /// When the image was pushed
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub image_pushed_at: Option<DateTime<Utc>>,
    /// Media type of the image manifest
    #[serde(default)]
    pub image_manifest_media_type: Option<String>,
    /// Media type of the image config artifact
    #[serde(default)]
    pub artifact_media_type: Option<String>,
}

impl ImageDetail {
    /// Classified manifest format, when the registry reported a media type.
    pub fn manifest_kind(&self) -> Option<ManifestKind> {
        self.image_manifest_media_type
            .as_deref()
            .map(ManifestKind::from_media_type)
    }
}

/// `imagePushedAt` arrives as RFC 3339 text or an epoch float depending on
/// the CLI version and its configured timestamp format.
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Epoch(f64),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
        Some(Raw::Epoch(seconds)) => {
            let secs = seconds.trunc() as i64;
            let nanos = (seconds.fract() * 1_000_000_000.0) as u32;
            Utc.timestamp_opt(secs, nanos)
                .single()
                .map(Some)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!("timestamp out of range: {}", seconds))
                })
        }
    }
}

/// Errors from driving the `aws` CLI.
#[derive(Debug, thiserror::Error)]
pub enum EcrError {
    /// The executable could not be started at all.
    #[error("Failed to run `{0}`: {1}")]
    Spawn(String, #[source] std::io::Error),

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    ExitFailure {
        /// Rendered command line (never contains secrets)
        command: String,
        /// Exit status reported by the OS
        status: ExitStatus,
        /// Stderr of the failed command
        stderr: String,
    },

    /// Waiting on the child process failed.
    #[error("IO error while driving the aws CLI: {0}")]
    Io(#[from] std::io::Error),

    /// The command printed JSON that did not match the expected shape.
    #[error("Could not parse JSON from `{command}`: {source}")]
    Json {
        /// Rendered command line
        command: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// STS did not return a 12-digit account id.
    #[error("Invalid AWS account id: {0:?}")]
    InvalidAccountId(String),

    /// Repository name rejected by ECR's naming rule.
    #[error("Invalid ECR repository name: {0}")]
    InvalidRepositoryName(String),

    /// Region string was empty.
    #[error("Invalid region: {0:?}")]
    InvalidRegion(String),

    /// The command succeeded but printed nothing.
    #[error("`{command}` produced no output")]
    EmptyOutput {
        /// Rendered command line
        command: String,
    },
}
