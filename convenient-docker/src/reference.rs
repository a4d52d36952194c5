//! Image references, build requests, and push results.

use crate::cli::DockerError;
use std::fmt;
use std::path::PathBuf;

/// Fully qualified reference to an image on a remote registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host, e.g. `123456789012.dkr.ecr.eu-north-1.amazonaws.com`
    pub registry: String,
    /// Repository name within the registry
    pub repository: String,
    /// Tag, e.g. `v1.0.0` or `latest`
    pub tag: String,
}

impl ImageRef {
    /// Create a reference, validating the tag against docker's tag grammar.
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<Self, DockerError> {
        let tag = tag.into();
        if !valid_tag(&tag) {
            return Err(DockerError::InvalidTag(tag));
        }

        Ok(Self {
            registry: registry.into(),
            repository: repository.into(),
            tag,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Check a tag against docker's accepted grammar: at most 128 characters,
/// first character alphanumeric or underscore, the rest may add `.` and `-`.
pub fn valid_tag(tag: &str) -> bool {
    if tag.len() > 128 {
        return false;
    }

    let mut chars = tag.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Input for a single `docker build` invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Dockerfile to build from
    pub dockerfile: PathBuf,
    /// Build context directory
    pub context: PathBuf,
    /// Local tag applied to the built image
    pub tag: String,
    /// Target platform passed as `--platform`, e.g. `linux/amd64`
    pub platform: String,
}

/// Result of a single `docker push`.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// The reference that was pushed
    pub reference: ImageRef,
    /// Digest reported by the registry, when the push output carried one
    pub digest: Option<String>,
}

/// Extract the manifest digest from `docker push` output lines.
///
/// The status line printed once the push completes looks like
/// `v1.0.0: digest: sha256:64ad... size: 1573`; scanning from the end
/// finds it first.
pub(crate) fn parse_push_digest(lines: &[String]) -> Option<String> {
    for line in lines.iter().rev() {
        if let Some(idx) = line.find("digest: ") {
            let rest = &line[idx + "digest: ".len()..];
            if let Some(digest) = rest.split_whitespace().next() {
                if digest.starts_with("sha256:") {
                    return Some(digest.to_string());
                }
            }
        }
    }

    None
}
