//! The seven-step build, verify, tag, push sequence.
//!
//! Steps run strictly in order and the first failure aborts the run. Both
//! images are fully built before either architecture check runs, so a
//! mismatch on the second image is still caught before anything is tagged
//! or pushed. The `--platform` flag passed to the builds is treated as a
//! request only; the verify step reads back what the build actually
//! produced.

use crate::plan::{BUILD_PLATFORM, EXPECTED_ARCHITECTURE, ImageKind, PlanError, PushPlan};
use convenient_docker::{BuildRequest, DockerCli, DockerError, ImageRef, PushOutcome};
use convenient_ecr::{AwsCli, EcrError, ImageDetail, RegistryCoordinates};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Runs the pipeline steps against the docker and aws CLIs.
pub struct Sequencer {
    docker: DockerCli,
    aws: AwsCli,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    /// Use `docker` and `aws` from `PATH`.
    pub fn new() -> Self {
        Self {
            docker: DockerCli::new(),
            aws: AwsCli::new(),
        }
    }

    /// Use specific CLI handles, e.g. alternate binary paths.
    pub fn with_clients(docker: DockerCli, aws: AwsCli) -> Self {
        Self { docker, aws }
    }

    /// Run all seven steps, stopping at the first failure.
    pub async fn run(&self, plan: &PushPlan) -> Result<PushReport, SequenceError> {
        let started = Instant::now();
        plan.validate()?;

        // Step 1: resolve the account behind the current credentials
        info!("Step 1: Resolving registry account");
        let account_id = self.aws.caller_account().await?;
        let coordinates = RegistryCoordinates::new(account_id, plan.region.clone())?;

        // Step 2: registry login, password piped through stdin
        info!(
            "Step 2: Authenticating docker to {}",
            coordinates.registry_host()
        );
        let password = self.aws.login_password(coordinates.region()).await?;
        self.docker
            .login(&coordinates.registry_host(), "AWS", &password)
            .await?;

        // Step 3: both builds complete before any check runs
        info!(
            "Step 3: Building {} image(s) for {}",
            plan.images.len(),
            BUILD_PLATFORM
        );
        for spec in &plan.images {
            self.docker
                .build(&BuildRequest {
                    dockerfile: spec.dockerfile.clone(),
                    context: plan.context.clone(),
                    tag: spec.local_tag.clone(),
                    platform: BUILD_PLATFORM.to_string(),
                })
                .await?;
        }

        // Step 4: re-verify what the builds actually produced
        info!("Step 4: Verifying image architectures");
        for spec in &plan.images {
            let found = self.docker.inspect_architecture(&spec.local_tag).await?;
            if found != EXPECTED_ARCHITECTURE {
                error!("{} is {}, expected {}", spec.kind, found, EXPECTED_ARCHITECTURE);
                return Err(SequenceError::ArchitectureMismatch {
                    kind: spec.kind,
                    found,
                });
            }
            info!("{} verified as {}", spec.kind, found);
        }

        // Step 5: apply the version and latest tags
        info!("Step 5: Tagging images");
        let mut references = Vec::new();
        for spec in &plan.images {
            for tag in plan.tags() {
                let reference =
                    ImageRef::new(coordinates.registry_host(), spec.repository.clone(), tag)?;
                self.docker.tag(&spec.local_tag, &reference).await?;
                references.push(reference);
            }
        }

        // Step 6: push every reference
        info!("Step 6: Pushing {} reference(s)", references.len());
        let mut pushed = Vec::new();
        for reference in &references {
            pushed.push(self.docker.push(reference).await?);
        }

        // Step 7: read back what the registry now holds
        info!("Step 7: Querying pushed images");
        let mut listings = Vec::new();
        for spec in &plan.images {
            let images = self
                .aws
                .describe_images(coordinates.region(), &spec.repository)
                .await?;
            listings.push(RepositoryListing {
                repository: spec.repository.clone(),
                images,
            });
        }

        Ok(PushReport {
            account_id: coordinates.account_id().to_string(),
            registry: coordinates.registry_host(),
            pushed,
            listings,
            duration: started.elapsed(),
        })
    }
}

/// Images a repository holds after the run, straight from describe-images.
#[derive(Debug, Clone)]
pub struct RepositoryListing {
    /// Repository name
    pub repository: String,
    /// Images reported by the registry
    pub images: Vec<ImageDetail>,
}

/// Summary of a completed run.
#[derive(Debug)]
pub struct PushReport {
    /// Account that owns the registry
    pub account_id: String,
    /// Registry host everything was pushed to
    pub registry: String,
    /// Every completed push, with its digest when the registry reported one
    pub pushed: Vec<PushOutcome>,
    /// Post-push registry contents per repository
    pub listings: Vec<RepositoryListing>,
    /// Wall-clock duration of the full sequence
    pub duration: Duration,
}

impl PushReport {
    /// Print the push summary.
    pub fn display(&self) {
        println!("📊 Push Summary:");
        println!("  Account:      {}", self.account_id);
        println!("  Registry:     {}", self.registry);
        println!("  Pushed refs:  {}", self.pushed.len());
        for outcome in &self.pushed {
            match &outcome.digest {
                Some(digest) => println!("    {} → {}", outcome.reference, short_digest(digest)),
                None => println!("    {}", outcome.reference),
            }
        }
        println!("  Total time:   {:.2}s", self.duration.as_secs_f64());
    }
}

/// First 12 hex characters of a `sha256:` digest.
fn short_digest(digest: &str) -> &str {
    digest.get(.."sha256:".len() + 12).unwrap_or(digest)
}

/// Errors that abort the sequence.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// A build produced an image for the wrong architecture. Caught by the
    /// verify step before anything is tagged or pushed.
    #[error("{kind} was built for {found}, expected {expected}", expected = EXPECTED_ARCHITECTURE)]
    ArchitectureMismatch {
        /// Which image failed verification
        kind: ImageKind,
        /// Architecture recorded in the image config
        found: String,
    },

    /// Rejected configuration, caught before any external command ran.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A docker invocation failed.
    #[error(transparent)]
    Docker(#[from] DockerError),

    /// An aws invocation failed.
    #[error(transparent)]
    Ecr(#[from] EcrError),
}
