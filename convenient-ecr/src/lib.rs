//! AWS CLI wrapper for the ECR side of an image release.
//!
//! Thin shell around `aws sts` and `aws ecr`: resolve the caller's account,
//! obtain a registry password, and query pushed images. Credential handling
//! stays entirely with the aws CLI configuration; this crate never sees a
//! long-lived secret.

pub mod cli;
pub mod media_type;
pub mod registry;

pub use cli::{AwsCli, EcrError, ImageDetail};
pub use media_type::ManifestKind;
pub use registry::RegistryCoordinates;
