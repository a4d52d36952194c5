//! Sagepush - build, verify, and push SageMaker container images
//!
//! Entry point wiring:
//! 1. Tracing setup (RUST_LOG overrides the default filter)
//! 2. Flag parsing (clap)
//! 3. CLI handle construction for docker and aws
//! 4. Subcommand dispatch

use clap::Parser;
use convenient_docker::DockerCli;
use convenient_ecr::AwsCli;
use sagepush::commands::{self, Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sagepush=info,convenient_docker=info,convenient_ecr=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let docker = DockerCli::with_program(&cli.docker_bin);
    let aws = AwsCli::with_program(&cli.aws_bin);

    let result = match &cli.command {
        Commands::Push(options) => commands::push::execute(options, docker, aws).await,
        Commands::Images(options) => commands::images::execute(options, aws).await,
        Commands::Diagnose(options) => commands::diagnose::execute(options, aws).await,
    };

    if let Err(e) = result {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}
