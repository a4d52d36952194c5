//! Manifest media types and SageMaker compatibility.
//!
//! ECR stores whichever manifest format the build tooling produced and
//! reports it through `describe-images`. SageMaker's CreateModel only
//! accepts images whose manifest is Docker V2 Schema 2; OCI manifests and
//! multi-platform indexes are rejected at model creation time, long after
//! the push itself succeeded. This module holds the classification used to
//! catch that before it bites.

use std::fmt;

/// Docker V2 Schema 2 single-image manifest.
pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Docker V2 multi-platform manifest list.
pub const DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// OCI single-image manifest.
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";

/// OCI multi-platform index.
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Classified manifest format of a pushed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestKind {
    /// Docker V2 Schema 2, the only format SageMaker accepts
    DockerV2,
    /// Docker multi-platform manifest list
    DockerManifestList,
    /// OCI single-image manifest
    OciManifest,
    /// OCI multi-platform index
    OciIndex,
    /// Anything else the registry may report
    Other(String),
}

impl ManifestKind {
    /// Classify a media type string as reported by `describe-images`.
    pub fn from_media_type(media_type: &str) -> Self {
        match media_type {
            DOCKER_MANIFEST_V2 => Self::DockerV2,
            DOCKER_MANIFEST_LIST => Self::DockerManifestList,
            OCI_MANIFEST => Self::OciManifest,
            OCI_INDEX => Self::OciIndex,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether SageMaker's CreateModel accepts this manifest format.
    pub fn sagemaker_compatible(&self) -> bool {
        matches!(self, Self::DockerV2)
    }

    /// Short human name used in reports.
    pub fn describe(&self) -> &str {
        match self {
            Self::DockerV2 => "Docker V2 Schema 2",
            Self::DockerManifestList => "Docker manifest list",
            Self::OciManifest => "OCI image manifest",
            Self::OciIndex => "OCI image index",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
