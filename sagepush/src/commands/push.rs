//! Build-verify-push command
//!
//! Drives the full seven-step sequence for the training and evaluation
//! images. Configuration arrives as flags; the defaults reproduce the
//! standard iris-classifier deployment.

use super::images;
use crate::plan::{ImageKind, ImageSpec, PushPlan};
use crate::sequencer::{SequenceError, Sequencer};
use clap::Args;
use convenient_docker::DockerCli;
use convenient_ecr::AwsCli;
use std::path::PathBuf;

/// Options for the `push` subcommand.
#[derive(Args, Debug)]
pub struct PushOptions {
    /// AWS region hosting the registry
    #[arg(long, default_value = "eu-north-1", env = "AWS_REGION")]
    pub region: String,

    /// Build context directory shared by both images
    #[arg(long, default_value = ".")]
    pub context: PathBuf,

    /// Dockerfile for the training image
    #[arg(long, default_value = "docker/training/Dockerfile")]
    pub training_dockerfile: PathBuf,

    /// Dockerfile for the evaluation image
    #[arg(long, default_value = "docker/evaluation/Dockerfile")]
    pub evaluation_dockerfile: PathBuf,

    /// Local tag the training build produces
    #[arg(long, default_value = "iris-classifier-training")]
    pub training_image: String,

    /// Local tag the evaluation build produces
    #[arg(long, default_value = "iris-classifier-evaluation")]
    pub evaluation_image: String,

    /// ECR repository receiving the training image
    #[arg(long, default_value = "iris-classifier-training")]
    pub training_repository: String,

    /// ECR repository receiving the evaluation image
    #[arg(long, default_value = "iris-classifier-evaluation")]
    pub evaluation_repository: String,

    /// Version tag pushed alongside latest
    #[arg(long, default_value = "v1.0.0")]
    pub version_tag: String,
}

impl PushOptions {
    /// Assemble the run plan, training image first.
    pub fn plan(&self) -> PushPlan {
        PushPlan {
            region: self.region.clone(),
            context: self.context.clone(),
            version_tag: self.version_tag.clone(),
            images: vec![
                ImageSpec {
                    kind: ImageKind::Training,
                    dockerfile: self.training_dockerfile.clone(),
                    local_tag: self.training_image.clone(),
                    repository: self.training_repository.clone(),
                },
                ImageSpec {
                    kind: ImageKind::Evaluation,
                    dockerfile: self.evaluation_dockerfile.clone(),
                    local_tag: self.evaluation_image.clone(),
                    repository: self.evaluation_repository.clone(),
                },
            ],
        }
    }
}

/// Execute the build-verify-push sequence.
pub async fn execute(
    options: &PushOptions,
    docker: DockerCli,
    aws: AwsCli,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║              SAGEPUSH IMAGE PIPELINE                   ║");
    println!("║        build, verify, tag, push to AWS ECR             ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let plan = options.plan();

    println!("📋 Configuration:");
    println!("  Region:   {}", plan.region);
    println!("  Version:  {}", plan.version_tag);
    println!("  Context:  {}", plan.context.display());
    for spec in &plan.images {
        println!("  {}: {} → {}", spec.kind, spec.local_tag, spec.repository);
    }
    println!();

    let sequencer = Sequencer::with_clients(docker, aws);
    match sequencer.run(&plan).await {
        Ok(report) => {
            println!();
            report.display();
            println!();
            for listing in &report.listings {
                images::print_listing(&listing.repository, &listing.images);
            }
            println!("✅ All images pushed successfully!");
            Ok(())
        }
        Err(e @ SequenceError::ArchitectureMismatch { .. }) => {
            eprintln!("  ⚠ The --platform flag is a request, not a guarantee. Rebuild on");
            eprintln!("    an amd64 host or CI runner if local emulation is not honoring it.");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
