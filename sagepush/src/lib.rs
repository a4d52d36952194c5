//! Build-verify-push pipeline for SageMaker container images.
//!
//! Orchestrates, in strict order:
//! 1. Account resolution through STS
//! 2. Registry login (password piped straight into docker)
//! 3. Image builds pinned to linux/amd64
//! 4. Architecture re-verification of every built image
//! 5. Version and `latest` tagging
//! 6. One push per tag
//! 7. A closing registry listing for human confirmation
//!
//! The first failing step aborts the run. There is no retry and nothing is
//! rolled back; already-pushed tags stay pushed.

pub mod commands;
pub mod plan;
pub mod sequencer;
