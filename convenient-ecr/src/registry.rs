//! Registry coordinates and ECR naming rules.

use crate::cli::EcrError;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Account id plus region, everything needed to address a private registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCoordinates {
    account_id: String,
    region: String,
}

impl RegistryCoordinates {
    /// Create coordinates, rejecting malformed account ids and empty regions.
    pub fn new(
        account_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self, EcrError> {
        let account_id = account_id.into();
        if !valid_account_id(&account_id) {
            return Err(EcrError::InvalidAccountId(account_id));
        }

        let region = region.into();
        if region.is_empty() {
            return Err(EcrError::InvalidRegion(region));
        }

        Ok(Self { account_id, region })
    }

    /// The 12-digit AWS account id.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// The region hosting the registry.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Registry hostname, e.g. `123456789012.dkr.ecr.eu-north-1.amazonaws.com`.
    pub fn registry_host(&self) -> String {
        format!("{}.dkr.ecr.{}.amazonaws.com", self.account_id, self.region)
    }

    /// Full image URI for a repository and tag on this registry.
    pub fn image_uri(&self, repository: &str, tag: &str) -> String {
        format!("{}/{}:{}", self.registry_host(), repository, tag)
    }
}

impl fmt::Display for RegistryCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registry_host())
    }
}

/// True when the string is a well-formed 12-digit account id.
pub fn valid_account_id(account_id: &str) -> bool {
    account_id.len() == 12 && account_id.chars().all(|c| c.is_ascii_digit())
}

/// Validate a repository name against ECR's naming rule: lowercase
/// alphanumeric segments separated by `.`, `_` or `-`, optionally
/// namespaced with `/`, 2 to 256 characters overall.
pub fn validate_repository_name(name: &str) -> Result<(), EcrError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[a-z0-9]+(?:[._-][a-z0-9]+)*/)*[a-z0-9]+(?:[._-][a-z0-9]+)*$").unwrap()
    });

    if name.len() < 2 || name.len() > 256 || !pattern.is_match(name) {
        return Err(EcrError::InvalidRepositoryName(name.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_host() {
        let coords = RegistryCoordinates::new("123456789012", "eu-north-1").unwrap();
        assert_eq!(
            coords.registry_host(),
            "123456789012.dkr.ecr.eu-north-1.amazonaws.com"
        );
    }

    #[test]
    fn test_image_uri() {
        let coords = RegistryCoordinates::new("123456789012", "eu-north-1").unwrap();
        assert_eq!(
            coords.image_uri("iris-classifier-training", "v1.0.0"),
            "123456789012.dkr.ecr.eu-north-1.amazonaws.com/iris-classifier-training:v1.0.0"
        );
    }

    #[test]
    fn test_rejects_bad_account_ids() {
        assert!(RegistryCoordinates::new("12345", "eu-north-1").is_err());
        assert!(RegistryCoordinates::new("12345678901a", "eu-north-1").is_err());
        assert!(RegistryCoordinates::new("", "eu-north-1").is_err());
    }

    #[test]
    fn test_rejects_empty_region() {
        let result = RegistryCoordinates::new("123456789012", "");
        assert!(matches!(result, Err(EcrError::InvalidRegion(_))));
    }

    #[test]
    fn test_repository_names() {
        assert!(validate_repository_name("iris-classifier-training").is_ok());
        assert!(validate_repository_name("team/model.v2_final").is_ok());

        assert!(validate_repository_name("a").is_err());
        assert!(validate_repository_name("Uppercase").is_err());
        assert!(validate_repository_name("double--dash").is_err());
        assert!(validate_repository_name("trailing-").is_err());
        assert!(validate_repository_name("/leading").is_err());
        assert!(validate_repository_name(&"x".repeat(257)).is_err());
    }
}
