//! Docker CLI wrapper for image build and registry push flows.
//!
//! The docker daemon does all the heavy lifting; this crate only shells out
//! to the `docker` binary, streams its output, and turns exit codes into
//! typed errors. Nothing here speaks the daemon API directly.
//!
//! # Example
//!
//! ```no_run
//! use convenient_docker::DockerCli;
//!
//! # async fn example() -> Result<(), convenient_docker::DockerError> {
//! let docker = DockerCli::new();
//! let arch = docker.inspect_architecture("iris-classifier-training").await?;
//! println!("image architecture: {}", arch);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod reference;

pub use cli::{DockerCli, DockerError};
pub use reference::{BuildRequest, ImageRef, PushOutcome};
