//! Configuration manager for the identity store.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::crypto::HashAlgorithm;
use crate::error::{IdentityError, Result};

const DEFAULT_CONFIG_PATH: &str = "identity.yaml";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._@-]+$").unwrap());
static UPPERCASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]").unwrap());
static LOWERCASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]").unwrap());
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]").unwrap());
static SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Related to password hashing.
    pub hashing: Hashing,
    /// Policy written into newly created databases.
    pub policy: Policy,
    /// Skip user records failing validation instead of refusing the
    /// whole snapshot.
    pub skip_invalid_users: bool,
    #[serde(skip)]
    path: PathBuf,
}

/// Password hashing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hashing {
    pub algorithm: HashAlgorithm,
    /// bcrypt cost factor.
    pub cost: u32,
    pub argon2: Argon2,
}

impl Hashing {
    pub const DEFAULT_COST: u32 = 10;
    pub const MIN_COST: u32 = 4;
    pub const MAX_COST: u32 = 31;

    /// Returns bcrypt cost bounded to the algorithm's valid range.
    pub fn bounded_cost(&self) -> u32 {
        self.cost.clamp(Self::MIN_COST, Self::MAX_COST)
    }
}

impl Default for Hashing {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Bcrypt,
            cost: Self::DEFAULT_COST,
            argon2: Argon2::default(),
        }
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Store-wide constraints persisted alongside users.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub password: PasswordPolicy,
    pub username: UsernamePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    /// Number of password records kept per user, current one included.
    pub history: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_number: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            history: 10,
            require_uppercase: false,
            require_lowercase: false,
            require_number: false,
            require_symbol: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsernamePolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for UsernamePolicy {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 50,
        }
    }
}

impl Policy {
    /// Number of password records to retain, never below one.
    #[inline]
    pub fn retention(&self) -> usize {
        self.password.history.max(1)
    }

    /// Check username against length and charset rules.
    ///
    /// # Errors
    ///
    /// Returns `Err` with [`IdentityError::PolicyViolation`] if the
    /// username is too short, too long or has forbidden characters.
    pub fn check_username(&self, username: &str) -> Result<()> {
        let len = username.chars().count();
        let rules = &self.username;

        if len < rules.min_length || len > rules.max_length {
            return Err(IdentityError::PolicyViolation {
                field: "username",
                reason: format!(
                    "length must be between {} and {} characters",
                    rules.min_length, rules.max_length
                ),
            });
        }

        if !USERNAME_RE.is_match(username) {
            return Err(IdentityError::PolicyViolation {
                field: "username",
                reason: "only letters, digits and . _ - @ are allowed".into(),
            });
        }

        Ok(())
    }

    /// Check password against length and complexity rules.
    ///
    /// # Errors
    ///
    /// Returns `Err` with [`IdentityError::PolicyViolation`] describing the
    /// first broken rule. The password itself is never part of the error.
    pub fn check_password(&self, password: &str) -> Result<()> {
        let len = password.chars().count();
        let rules = &self.password;

        if len < rules.min_length || len > rules.max_length {
            return Err(IdentityError::PolicyViolation {
                field: "password",
                reason: format!(
                    "length must be between {} and {} characters",
                    rules.min_length, rules.max_length
                ),
            });
        }

        let checks: [(bool, &Regex, &str); 4] = [
            (rules.require_uppercase, &*UPPERCASE_RE, "an uppercase letter"),
            (rules.require_lowercase, &*LOWERCASE_RE, "a lowercase letter"),
            (rules.require_number, &*NUMBER_RE, "a number"),
            (rules.require_symbol, &*SYMBOL_RE, "a symbol"),
        ];
        for (required, re, what) in checks {
            if required && !re.is_match(password) {
                return Err(IdentityError::PolicyViolation {
                    field: "password",
                    reason: format!("must contain {what}"),
                });
            }
        }

        Ok(())
    }
}

impl Configuration {
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn hashing(mut self, hashing: Hashing) -> Self {
        self.hashing = hashing;
        self.normalize()
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn skip_invalid_users(mut self, skip: bool) -> Self {
        self.skip_invalid_users = skip;
        self
    }

    /// Reads the configuration file from the specified path or the default
    /// location.
    ///
    /// A missing or malformed file is logged and replaced by defaults.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        Arc::new(config.normalize())
    }

    /// Parse a configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the text is not valid YAML for [`Configuration`].
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Configuration =
            serde_yaml::from_str(text).map_err(|err| {
                IdentityError::invalid("configuration", "yaml", err.to_string())
            })?;
        Ok(config.normalize())
    }

    fn normalize(mut self) -> Self {
        let bounded = self.hashing.bounded_cost();
        if bounded != self.hashing.cost {
            tracing::warn!(
                cost = self.hashing.cost,
                bounded,
                "bcrypt cost out of range"
            );
            self.hashing.cost = bounded;
        }
        self
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "configuration file not found or invalid");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.hashing.algorithm, HashAlgorithm::Bcrypt);
        assert_eq!(config.hashing.cost, 10);
        assert_eq!(config.policy.password.min_length, 8);
        assert_eq!(config.policy.retention(), 10);
        assert!(!config.skip_invalid_users);
    }

    #[test]
    fn test_from_yaml() {
        let config = Configuration::from_yaml(
            "hashing:\n  cost: 99\npolicy:\n  password:\n    history: 3\n    require_number: true\n",
        )
        .unwrap();

        assert_eq!(config.hashing.cost, Hashing::MAX_COST);
        assert_eq!(config.policy.retention(), 3);
        assert!(config.policy.password.require_number);
        assert_eq!(config.policy.username.max_length, 50);

        assert!(Configuration::from_yaml("hashing: [").is_err());
    }

    #[test]
    fn test_builder() {
        let config = Configuration::default()
            .hashing(Hashing {
                cost: 2,
                ..Default::default()
            })
            .skip_invalid_users(true);

        assert_eq!(config.hashing.cost, Hashing::MIN_COST);
        assert!(config.skip_invalid_users);
        assert_eq!(config.policy, Policy::default());
    }

    #[test]
    fn test_read_fallback() {
        let config = Configuration::default()
            .path("/nonexistent/identity.yaml")
            .read();
        assert_eq!(config.hashing, Hashing::default());
    }

    #[test]
    fn test_username_policy() {
        let policy = Policy::default();
        assert!(policy.check_username("jsmith").is_ok());
        assert!(policy.check_username("j.smith@corp").is_ok());
        assert!(policy.check_username("js").is_err());
        assert!(policy.check_username("john smith").is_err());
        assert!(policy.check_username(&"a".repeat(51)).is_err());
    }

    #[test]
    fn test_password_policy() {
        let mut policy = Policy::default();
        assert!(policy.check_password("short").is_err());
        assert!(policy.check_password("longenough").is_ok());
        assert!(policy.check_password(&"x".repeat(129)).is_err());

        policy.password.require_uppercase = true;
        policy.password.require_symbol = true;
        assert!(policy.check_password("longenough").is_err());
        assert!(policy.check_password("Longenough").is_err());
        assert!(policy.check_password("Longenough!").is_ok());
    }
}
