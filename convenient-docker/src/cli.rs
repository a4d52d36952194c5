//! Spawning and supervising the `docker` binary.

use crate::reference::{BuildRequest, ImageRef, PushOutcome, parse_push_digest};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// How many trailing stderr lines are kept for error reporting.
const STDERR_TAIL: usize = 20;

/// Handle on the `docker` executable.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    /// Use `docker` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("docker"),
        }
    }

    /// Use a specific executable instead of `docker` from `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(args);
        command
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program.display(), args.join(" "))
    }

    /// Log in to a registry, feeding the password through stdin so it never
    /// shows up in the process list or the logs.
    pub async fn login(
        &self,
        registry: &str,
        username: &str,
        password: &str,
    ) -> Result<(), DockerError> {
        let args = ["login", "--username", username, "--password-stdin", registry];
        info!("Authenticating docker to {}", registry);

        let mut child = self
            .command(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DockerError::Spawn(self.describe(&args), e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DockerError::Stream("stdin of docker login".to_string()))?;
        stdin.write_all(password.as_bytes()).await?;
        // Closing the pipe tells docker the password is complete
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(DockerError::ExitFailure {
                command: self.describe(&args),
                status: output.status,
                stderr: tail_of(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        debug!("docker login to {} succeeded", registry);
        Ok(())
    }

    /// Build an image for a fixed target platform, streaming build output
    /// into the log as it arrives.
    pub async fn build(&self, request: &BuildRequest) -> Result<(), DockerError> {
        if !request.dockerfile.is_file() {
            return Err(DockerError::DockerfileNotFound(request.dockerfile.clone()));
        }
        if !request.context.is_dir() {
            return Err(DockerError::ContextNotFound(request.context.clone()));
        }

        let dockerfile = request.dockerfile.display().to_string();
        let context = request.context.display().to_string();
        let args = [
            "build",
            "--platform",
            request.platform.as_str(),
            "--file",
            dockerfile.as_str(),
            "--tag",
            request.tag.as_str(),
            context.as_str(),
        ];

        info!(
            "Building {} from {} (platform {})",
            request.tag, dockerfile, request.platform
        );
        let _ = self.run_streaming(&args).await?;

        Ok(())
    }

    /// Read the architecture recorded in an image's config.
    pub async fn inspect_architecture(&self, image: &str) -> Result<String, DockerError> {
        let args = ["inspect", "--format", "{{.Architecture}}", image];
        let output = self.run_captured(&args).await?;

        // Some inspect format/shell combinations quote the value
        let architecture = output.trim().trim_matches('"');
        if architecture.is_empty() {
            return Err(DockerError::UnexpectedOutput {
                command: self.describe(&args),
                detail: "empty architecture string".to_string(),
            });
        }

        Ok(architecture.to_string())
    }

    /// Apply an additional tag to a local image.
    pub async fn tag(&self, source: &str, target: &ImageRef) -> Result<(), DockerError> {
        let target = target.to_string();
        let args = ["tag", source, target.as_str()];

        info!("Tagging {} as {}", source, target);
        let _ = self.run_captured(&args).await?;

        Ok(())
    }

    /// Push a reference to its registry, returning the digest the registry
    /// reported when the push output carried one.
    pub async fn push(&self, reference: &ImageRef) -> Result<PushOutcome, DockerError> {
        let rendered = reference.to_string();
        let args = ["push", rendered.as_str()];

        info!("Pushing {}", rendered);
        let lines = self.run_streaming(&args).await?;

        let digest = parse_push_digest(&lines);
        match &digest {
            Some(digest) => info!("Pushed {} ({})", rendered, digest),
            None => debug!("Push output for {} carried no digest line", rendered),
        }

        Ok(PushOutcome {
            reference: reference.clone(),
            digest,
        })
    }

    /// Run a short command to completion and return its stdout.
    async fn run_captured(&self, args: &[&str]) -> Result<String, DockerError> {
        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| DockerError::Spawn(self.describe(args), e))?;

        if !output.status.success() {
            return Err(DockerError::ExitFailure {
                command: self.describe(args),
                status: output.status,
                stderr: tail_of(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Spawn docker with piped stdout/stderr and relay both line by line.
    ///
    /// Stdout lines are collected and returned; stderr keeps only a short
    /// tail for error reporting since build output can run long.
    async fn run_streaming(&self, args: &[&str]) -> Result<Vec<String>, DockerError> {
        let command_line = self.describe(args);
        let mut child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DockerError::Spawn(command_line.clone(), e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DockerError::Stream(format!("stdout of `{}`", command_line)))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DockerError::Stream(format!("stderr of `{}`", command_line)))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();

        let mut collected = Vec::new();
        let mut stderr_tail: Vec<String> = Vec::new();
        let mut stdout_closed = false;
        let mut stderr_closed = false;

        while !(stdout_closed && stderr_closed) {
            tokio::select! {
                line = stdout_lines.next_line(), if !stdout_closed => match line {
                    Ok(Some(line)) => {
                        info!("{}", line);
                        collected.push(line);
                    }
                    Ok(None) => stdout_closed = true,
                    Err(e) => {
                        debug!("stdout read error: {}", e);
                        stdout_closed = true;
                    }
                },
                line = stderr_lines.next_line(), if !stderr_closed => match line {
                    Ok(Some(line)) => {
                        info!("{}", line);
                        if stderr_tail.len() == STDERR_TAIL {
                            let _ = stderr_tail.remove(0);
                        }
                        stderr_tail.push(line);
                    }
                    Ok(None) => stderr_closed = true,
                    Err(e) => {
                        debug!("stderr read error: {}", e);
                        stderr_closed = true;
                    }
                },
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(DockerError::ExitFailure {
                command: command_line,
                status,
                stderr: stderr_tail.join("\n"),
            });
        }

        Ok(collected)
    }
}

fn tail_of(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL);
    lines[start..].join("\n")
}

/// Errors from driving the `docker` binary.
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
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
        /// Trailing stderr lines from the failed command
        stderr: String,
    },

    /// A pipe to the child process could not be taken.
    #[error("Could not capture {0}")]
    Stream(String),

    /// Waiting on the child or writing to its stdin failed.
    #[error("IO error while driving docker: {0}")]
    Io(#[from] std::io::Error),

    /// The command succeeded but printed something unusable.
    #[error("Unexpected output from `{command}`: {detail}")]
    UnexpectedOutput {
        /// Rendered command line
        command: String,
        /// What was wrong with the output
        detail: String,
    },

    /// Dockerfile missing before the build was attempted.
    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    /// Build context directory missing before the build was attempted.
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    /// Tag rejected by docker's tag grammar.
    #[error("Invalid image tag: {0}")]
    InvalidTag(String),
}
