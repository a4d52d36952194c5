//! Sagepush command-line interface
//!
//! Sagepush supports three modes of operation:
//! - `push`: Build, verify, tag, and push both pipeline images to ECR
//! - `images`: List what the target repositories currently hold
//! - `diagnose`: Check pushed manifests for SageMaker compatibility

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod diagnose;
pub mod images;
pub mod push;

/// Sagepush - build, verify, and push SageMaker container images to ECR
#[derive(Parser)]
#[command(name = "sagepush")]
#[command(about = "Build, verify, and push SageMaker container images to AWS ECR")]
#[command(version)]
pub struct Cli {
    /// Docker binary to invoke
    #[arg(
        long,
        global = true,
        default_value = "docker",
        env = "SAGEPUSH_DOCKER"
    )]
    pub docker_bin: PathBuf,

    /// AWS CLI binary to invoke
    #[arg(long, global = true, default_value = "aws", env = "SAGEPUSH_AWS")]
    pub aws_bin: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build both images, verify their architecture, and push to ECR
    Push(push::PushOptions),

    /// List images the target repositories currently hold
    Images(images::ImagesOptions),

    /// Check pushed images for SageMaker-compatible manifest media types
    Diagnose(diagnose::DiagnoseOptions),
}
