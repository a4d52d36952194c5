//! What to build and where to push it.

use convenient_docker::DockerError;
use convenient_docker::reference::valid_tag;
use convenient_ecr::EcrError;
use convenient_ecr::registry::validate_repository_name;
use std::fmt;
use std::path::PathBuf;

/// Architecture every image must record after a build.
pub const EXPECTED_ARCHITECTURE: &str = "amd64";

/// Platform requested from docker for every build, regardless of host.
pub const BUILD_PLATFORM: &str = "linux/amd64";

/// Floating tag applied next to the version tag.
pub const LATEST_TAG: &str = "latest";

/// Which of the two pipeline images a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// The model training image
    Training,
    /// The model evaluation image
    Evaluation,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Training => write!(f, "Training image"),
            ImageKind::Evaluation => write!(f, "Evaluation image"),
        }
    }
}

/// One image to build, verify, and push.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Which pipeline image this is
    pub kind: ImageKind,
    /// Dockerfile the image is built from
    pub dockerfile: PathBuf,
    /// Local tag applied by the build
    pub local_tag: String,
    /// ECR repository the image is pushed to
    pub repository: String,
}

/// Full description of one pipeline run.
#[derive(Debug, Clone)]
pub struct PushPlan {
    /// Region hosting the registry
    pub region: String,
    /// Build context shared by both images
    pub context: PathBuf,
    /// Version tag pushed next to `latest`
    pub version_tag: String,
    /// Images in build order: training first, then evaluation
    pub images: Vec<ImageSpec>,
}

impl PushPlan {
    /// Validate names up front so bad configuration fails before any
    /// external command runs.
    pub fn validate(&self) -> Result<(), PlanError> {
        if !valid_tag(&self.version_tag) {
            return Err(DockerError::InvalidTag(self.version_tag.clone()).into());
        }

        for spec in &self.images {
            validate_repository_name(&spec.repository)?;
            if !valid_tag(&spec.local_tag) {
                return Err(DockerError::InvalidTag(spec.local_tag.clone()).into());
            }
        }

        Ok(())
    }

    /// The two tags pushed for every image.
    pub fn tags(&self) -> [&str; 2] {
        [self.version_tag.as_str(), LATEST_TAG]
    }
}

/// Rejected configuration, caught before any external command runs.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A tag failed docker's tag grammar
    #[error(transparent)]
    Tag(#[from] DockerError),

    /// A repository name failed ECR's naming rule
    #[error(transparent)]
    Repository(#[from] EcrError),
}
