//! Repository listing command
//!
//! Wraps `aws ecr describe-images` and prints the result per repository,
//! the same view the push command shows after a successful run.

use clap::Args;
use convenient_ecr::{AwsCli, ImageDetail};

/// Options for the `images` subcommand.
#[derive(Args, Debug)]
pub struct ImagesOptions {
    /// AWS region hosting the registry
    #[arg(long, default_value = "eu-north-1", env = "AWS_REGION")]
    pub region: String,

    /// Repositories to list
    #[arg(default_values_t = vec![
        "iris-classifier-training".to_string(),
        "iris-classifier-evaluation".to_string(),
    ])]
    pub repositories: Vec<String>,
}

/// List every requested repository.
pub async fn execute(
    options: &ImagesOptions,
    aws: AwsCli,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    for repository in &options.repositories {
        let images = aws.describe_images(&options.region, repository).await?;
        print_listing(repository, &images);
    }
    Ok(())
}

/// Print one repository's images.
pub(crate) fn print_listing(repository: &str, images: &[ImageDetail]) {
    println!("📦 {}: {} image(s)", repository, images.len());

    for detail in images {
        let tags = if detail.image_tags.is_empty() {
            "<untagged>".to_string()
        } else {
            detail.image_tags.join(", ")
        };
        println!("  • {}", tags);

        if let Some(digest) = &detail.image_digest {
            println!("    Digest:    {}", digest);
        }
        if let Some(size) = detail.image_size_in_bytes {
            println!("    Size:      {}", format_size(size));
        }
        if let Some(pushed_at) = &detail.image_pushed_at {
            println!("    Pushed:    {}", format_pushed_at(pushed_at));
        }
        if let Some(kind) = detail.manifest_kind() {
            println!("    Manifest:  {}", kind);
        }
    }
    println!();
}

/// Render a byte count the way docker does, in decimal megabytes.
fn format_size(bytes: u64) -> String {
    const MB: f64 = 1_000_000.0;
    format!("{:.1} MB", bytes as f64 / MB)
}

/// Render a push timestamp in UTC, seconds precision.
fn format_pushed_at(pushed_at: &chrono::DateTime<chrono::Utc>) -> String {
    pushed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(381_824_066), "381.8 MB");
        assert_eq!(format_size(0), "0.0 MB");
    }

    #[test]
    fn test_format_pushed_at() {
        let pushed_at = chrono::Utc.with_ymd_and_hms(2024, 3, 18, 8, 12, 45).unwrap();
        assert_eq!(format_pushed_at(&pushed_at), "2024-03-18 08:12:45 UTC");
    }
}
