//! Manifest media type diagnostics
//!
//! SageMaker's CreateModel only accepts images whose manifest is Docker V2
//! Schema 2. Newer build tooling defaults to OCI manifests, and a push of
//! such an image succeeds; the rejection only surfaces later at model
//! creation with an unrelated-looking validation error. This command reads
//! back the manifest media type of the image currently tagged `latest` in
//! each repository and flags the ones CreateModel would refuse, so the
//! problem is caught right after the push.

use crate::plan::LATEST_TAG;
use clap::Args;
use convenient_ecr::AwsCli;

/// Options for the `diagnose` subcommand.
#[derive(Args, Debug)]
pub struct DiagnoseOptions {
    /// AWS region hosting the registry
    #[arg(long, default_value = "eu-north-1", env = "AWS_REGION")]
    pub region: String,

    /// Repositories to check
    #[arg(default_values_t = vec![
        "iris-classifier-training".to_string(),
        "iris-classifier-evaluation".to_string(),
    ])]
    pub repositories: Vec<String>,
}

/// Check the `latest` image of every requested repository, failing the run
/// when its manifest is a format CreateModel rejects.
pub async fn execute(
    options: &DiagnoseOptions,
    aws: AwsCli,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("🔍 Checking manifest media types in {}\n", options.region);

    let mut incompatible = 0;

    for repository in &options.repositories {
        let images = aws.describe_images(&options.region, repository).await?;
        println!("📦 {}: {} image(s)", repository, images.len());

        // Re-pushing a tag leaves the previous image untagged in the
        // repository; CreateModel only pulls what `latest` points at now
        let current = images
            .iter()
            .find(|detail| detail.image_tags.iter().any(|tag| tag == LATEST_TAG));

        match current {
            None => {
                println!("  ⚠ no image currently tagged {}", LATEST_TAG);
            }
            Some(detail) => {
                let tags = detail.image_tags.join(", ");
                match detail.manifest_kind() {
                    Some(kind) if kind.sagemaker_compatible() => {
                        println!("  ✓ {} ({})", tags, kind);
                    }
                    Some(kind) => {
                        incompatible += 1;
                        println!("  ✗ {} ({}) rejected by CreateModel", tags, kind);
                    }
                    None => {
                        println!("  ⚠ {} (no media type reported)", tags);
                    }
                }
            }
        }
        println!();
    }

    if incompatible > 0 {
        println!(
            "⚠️  {} image(s) would be rejected by SageMaker CreateModel",
            incompatible
        );
        println!("   Mitigations:");
        println!("   • Rebuild on a Linux amd64 host, where classic docker build");
        println!("     emits Docker V2 Schema 2 manifests");
        println!("   • Build and push from CI instead of a developer laptop");
        println!("   • With buildx, pass --provenance=false to avoid OCI attestation");
        println!("     manifests");
        println!("   • If the format cannot be changed, raise an AWS support ticket");
        println!("   See docs/sagemaker-manifest-media-types.md for the full story.");
        return Err(format!("{} incompatible image(s)", incompatible).into());
    }

    println!("✅ All manifests are SageMaker compatible");
    Ok(())
}
