//! End-to-end sequencer tests against stubbed `docker` and `aws` binaries.
//!
//! Every stub appends its argv to a log file, so the tests can assert not
//! just outcomes but the order and number of external commands: builds
//! before checks, checks before tags, tags before pushes, and a hard stop
//! at the first failure.

use convenient_docker::DockerCli;
use convenient_ecr::AwsCli;
use sagepush::commands::push::{self, PushOptions};
use sagepush::plan::{ImageKind, ImageSpec, PushPlan};
use sagepush::sequencer::{SequenceError, Sequencer};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DESCRIBE_FIXTURE: &str = r#"{
    "imageDetails": [
        {
            "repositoryName": "iris-classifier-training",
            "imageTags": ["v1.0.0", "latest"],
            "imageDigest": "sha256:6c3c624b58dbbcd3c0dd82b4c53f04194d1247c6eebdaab7c610cf7d66709b3b",
            "imageManifestMediaType": "application/vnd.docker.distribution.manifest.v2+json"
        }
    ]
}"#;

fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

/// Fake `docker` that replays canned output per subcommand. The inspect
/// case answers with a different architecture for the evaluation image so
/// tests can fail one image but not the other.
fn write_docker_stub(
    dir: &Path,
    log: &Path,
    training_arch: &str,
    evaluation_arch: &str,
    fail_step: Option<&str>,
) -> PathBuf {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str(&format!("echo \"$@\" >> \"{}\"\n", log.display()));
    script.push_str("case \"$1\" in\n");

    if fail_step == Some("login") {
        script.push_str("  login)\n    cat > /dev/null\n    echo \"Error saving credentials\" >&2\n    exit 1\n    ;;\n");
    } else {
        script.push_str("  login)\n    cat > /dev/null\n    ;;\n");
    }

    script.push_str("  inspect)\n    for last; do :; done\n    case \"$last\" in\n");
    script.push_str(&format!("      *evaluation*) echo \"{}\" ;;\n", evaluation_arch));
    script.push_str(&format!("      *) echo \"{}\" ;;\n", training_arch));
    script.push_str("    esac\n    ;;\n");

    if fail_step == Some("push") {
        script.push_str("  push)\n    echo \"denied: not authorized\" >&2\n    exit 1\n    ;;\n");
    } else {
        script.push_str("  push)\n    echo \"v1.0.0: digest: sha256:6c3c624b58dbbcd3c0dd82b4c53f04194d1247c6eebdaab7c610cf7d66709b3b size: 2841\"\n    ;;\n");
    }

    script.push_str("esac\nexit 0\n");
    write_stub(dir, "docker", &script)
}

/// Fake `aws` handling the three calls the sequencer makes.
fn write_aws_stub(dir: &Path, log: &Path, fail_step: Option<&str>) -> PathBuf {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str(&format!("echo \"$@\" >> \"{}\"\n", log.display()));
    script.push_str("case \"$2\" in\n");

    if fail_step == Some("sts") {
        script.push_str(
            "  get-caller-identity)\n    echo \"Unable to locate credentials\" >&2\n    exit 253\n    ;;\n",
        );
    } else {
        script.push_str("  get-caller-identity)\n    echo \"123456789012\"\n    ;;\n");
    }

    script.push_str("  get-login-password)\n    echo \"stub-registry-token\"\n    ;;\n");

    if fail_step == Some("describe") {
        script.push_str(
            "  describe-images)\n    echo \"RepositoryNotFoundException\" >&2\n    exit 254\n    ;;\n",
        );
    } else {
        script.push_str("  describe-images)\n    cat <<'DETAILS'\n");
        script.push_str(DESCRIBE_FIXTURE);
        script.push_str("\nDETAILS\n    ;;\n");
    }

    script.push_str("esac\nexit 0\n");
    write_stub(dir, "aws", &script)
}

/// Standard two-image plan with real dockerfiles and context on disk.
fn plan_for(dir: &Path) -> PushPlan {
    fs::create_dir_all(dir.join("context")).unwrap();
    fs::write(dir.join("Dockerfile.training"), "FROM scratch\n").unwrap();
    fs::write(dir.join("Dockerfile.evaluation"), "FROM scratch\n").unwrap();

    PushPlan {
        region: "eu-north-1".to_string(),
        context: dir.join("context"),
        version_tag: "v1.0.0".to_string(),
        images: vec![
            ImageSpec {
                kind: ImageKind::Training,
                dockerfile: dir.join("Dockerfile.training"),
                local_tag: "iris-classifier-training".to_string(),
                repository: "iris-classifier-training".to_string(),
            },
            ImageSpec {
                kind: ImageKind::Evaluation,
                dockerfile: dir.join("Dockerfile.evaluation"),
                local_tag: "iris-classifier-evaluation".to_string(),
                repository: "iris-classifier-evaluation".to_string(),
            },
        ],
    }
}

/// Options mirroring plan_for's on-disk layout, for driving the push
/// command end to end.
fn options_for(dir: &Path) -> PushOptions {
    fs::create_dir_all(dir.join("context")).unwrap();
    fs::write(dir.join("Dockerfile.training"), "FROM scratch\n").unwrap();
    fs::write(dir.join("Dockerfile.evaluation"), "FROM scratch\n").unwrap();

    PushOptions {
        region: "eu-north-1".to_string(),
        context: dir.join("context"),
        training_dockerfile: dir.join("Dockerfile.training"),
        evaluation_dockerfile: dir.join("Dockerfile.evaluation"),
        training_image: "iris-classifier-training".to_string(),
        evaluation_image: "iris-classifier-evaluation".to_string(),
        training_repository: "iris-classifier-training".to_string(),
        evaluation_repository: "iris-classifier-evaluation".to_string(),
        version_tag: "v1.0.0".to_string(),
    }
}

fn read_log(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

fn count_of(lines: &[String], subcommand: &str) -> usize {
    lines
        .iter()
        .filter(|line| line.split_whitespace().next() == Some(subcommand))
        .count()
}

fn first_index(lines: &[String], subcommand: &str) -> usize {
    lines
        .iter()
        .position(|line| line.split_whitespace().next() == Some(subcommand))
        .unwrap()
}

fn last_index(lines: &[String], subcommand: &str) -> usize {
    lines
        .iter()
        .rposition(|line| line.split_whitespace().next() == Some(subcommand))
        .unwrap()
}

#[tokio::test]
async fn test_happy_path_pushes_four_references() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let report = sequencer.run(&plan_for(dir.path())).await.unwrap();

    assert_eq!(report.account_id, "123456789012");
    assert_eq!(
        report.registry,
        "123456789012.dkr.ecr.eu-north-1.amazonaws.com"
    );
    assert_eq!(report.pushed.len(), 4);
    assert!(report.pushed.iter().all(|outcome| outcome.digest.is_some()));
    assert_eq!(report.listings.len(), 2);
    assert_eq!(report.listings[0].images.len(), 1);

    let references: Vec<String> = report
        .pushed
        .iter()
        .map(|outcome| outcome.reference.to_string())
        .collect();
    for expected in [
        "123456789012.dkr.ecr.eu-north-1.amazonaws.com/iris-classifier-training:v1.0.0",
        "123456789012.dkr.ecr.eu-north-1.amazonaws.com/iris-classifier-training:latest",
        "123456789012.dkr.ecr.eu-north-1.amazonaws.com/iris-classifier-evaluation:v1.0.0",
        "123456789012.dkr.ecr.eu-north-1.amazonaws.com/iris-classifier-evaluation:latest",
    ] {
        assert!(references.contains(&expected.to_string()), "{}", expected);
    }

    let docker_lines = read_log(&docker_log);
    assert_eq!(count_of(&docker_lines, "login"), 1);
    assert_eq!(count_of(&docker_lines, "build"), 2);
    assert_eq!(count_of(&docker_lines, "inspect"), 2);
    assert_eq!(count_of(&docker_lines, "tag"), 4);
    assert_eq!(count_of(&docker_lines, "push"), 4);

    let aws_lines = read_log(&aws_log);
    assert_eq!(count_of(&aws_lines, "sts"), 1);
    let password_calls = aws_lines
        .iter()
        .filter(|line| line.contains("get-login-password"))
        .count();
    let describe_calls = aws_lines
        .iter()
        .filter(|line| line.contains("describe-images"))
        .count();
    assert_eq!(password_calls, 1);
    assert_eq!(describe_calls, 2);

    // The registry token travels over stdin only, never argv
    assert!(
        !docker_lines
            .iter()
            .any(|line| line.contains("stub-registry-token"))
    );
}

#[tokio::test]
async fn test_builds_complete_before_any_verification() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    sequencer.run(&plan_for(dir.path())).await.unwrap();

    let lines = read_log(&docker_log);
    assert!(first_index(&lines, "login") < first_index(&lines, "build"));
    assert!(last_index(&lines, "build") < first_index(&lines, "inspect"));
    assert!(last_index(&lines, "inspect") < first_index(&lines, "tag"));
    assert!(last_index(&lines, "tag") < first_index(&lines, "push"));
}

#[tokio::test]
async fn test_training_architecture_mismatch_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "arm64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan_for(dir.path())).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Training image"));
    assert!(message.contains("arm64"));
    assert!(message.contains("amd64"));

    match err {
        SequenceError::ArchitectureMismatch { kind, found } => {
            assert_eq!(kind, ImageKind::Training);
            assert_eq!(found, "arm64");
        }
        other => panic!("expected an architecture mismatch, got {:?}", other),
    }

    let lines = read_log(&docker_log);
    assert_eq!(count_of(&lines, "build"), 2);
    assert_eq!(count_of(&lines, "inspect"), 1);
    assert_eq!(count_of(&lines, "tag"), 0);
    assert_eq!(count_of(&lines, "push"), 0);
}

#[tokio::test]
async fn test_evaluation_architecture_mismatch_stops_the_run() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "arm64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan_for(dir.path())).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Evaluation image"));
    assert!(message.contains("arm64"));

    match err {
        SequenceError::ArchitectureMismatch { kind, found } => {
            assert_eq!(kind, ImageKind::Evaluation);
            assert_eq!(found, "arm64");
        }
        other => panic!("expected an architecture mismatch, got {:?}", other),
    }

    let lines = read_log(&docker_log);
    assert_eq!(count_of(&lines, "inspect"), 2);
    assert_eq!(count_of(&lines, "tag"), 0);
    assert_eq!(count_of(&lines, "push"), 0);
}

#[tokio::test]
async fn test_identity_failure_stops_before_docker_runs() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, Some("sts"));

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan_for(dir.path())).await.unwrap_err();

    assert!(matches!(err, SequenceError::Ecr(_)));
    assert!(err.to_string().contains("Unable to locate credentials"));
    assert!(!docker_log.exists());
}

#[tokio::test]
async fn test_login_failure_stops_before_builds() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", Some("login"));
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan_for(dir.path())).await.unwrap_err();

    assert!(matches!(err, SequenceError::Docker(_)));

    let lines = read_log(&docker_log);
    assert_eq!(count_of(&lines, "login"), 1);
    assert_eq!(count_of(&lines, "build"), 0);
}

#[tokio::test]
async fn test_push_failure_aborts_remaining_pushes() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", Some("push"));
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan_for(dir.path())).await.unwrap_err();

    assert!(matches!(err, SequenceError::Docker(_)));
    assert!(err.to_string().contains("denied: not authorized"));

    let lines = read_log(&docker_log);
    assert_eq!(count_of(&lines, "tag"), 4);
    assert_eq!(count_of(&lines, "push"), 1);
}

#[tokio::test]
async fn test_describe_failure_fails_the_run_after_pushes() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, Some("describe"));

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan_for(dir.path())).await.unwrap_err();

    assert!(matches!(err, SequenceError::Ecr(_)));

    // Already-pushed tags stay pushed; only the final query failed
    let lines = read_log(&docker_log);
    assert_eq!(count_of(&lines, "push"), 4);
}

#[tokio::test]
async fn test_push_command_completes_a_clean_run() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let options = options_for(dir.path());
    let result = push::execute(
        &options,
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    )
    .await;

    assert!(result.is_ok());
    let lines = read_log(&docker_log);
    assert_eq!(count_of(&lines, "push"), 4);
}

#[tokio::test]
async fn test_push_command_propagates_mismatch_details() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "arm64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let options = options_for(dir.path());
    let err = push::execute(
        &options,
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    )
    .await
    .unwrap_err();

    // The returned error carries the whole diagnostic, so the binary's
    // one terminal print names the image kind and both architectures
    let message = err.to_string();
    assert!(message.contains("Training image"));
    assert!(message.contains("arm64"));
    assert!(message.contains("amd64"));
}

#[tokio::test]
async fn test_invalid_version_tag_fails_before_any_command() {
    let dir = TempDir::new().unwrap();
    let docker_log = dir.path().join("docker.log");
    let aws_log = dir.path().join("aws.log");
    let docker = write_docker_stub(dir.path(), &docker_log, "amd64", "amd64", None);
    let aws = write_aws_stub(dir.path(), &aws_log, None);

    let mut plan = plan_for(dir.path());
    plan.version_tag = "v1 0.0".to_string();

    let sequencer = Sequencer::with_clients(
        DockerCli::with_program(&docker),
        AwsCli::with_program(&aws),
    );
    let err = sequencer.run(&plan).await.unwrap_err();

    assert!(matches!(err, SequenceError::Plan(_)));
    assert!(!docker_log.exists());
    assert!(!aws_log.exists());
}
