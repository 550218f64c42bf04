//! Password hashing and random identifiers.

use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::{Rng, thread_rng};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::Hashing;
use crate::error::{IdentityError, Result, ToInternal};

/// Length of generated key and token identifiers.
pub const RANDOM_ID_LENGTH: usize = 40;
/// Length of a user identifier (hyphenated UUID).
pub const USER_ID_LENGTH: usize = 36;
/// Longest password bcrypt hashes without truncation.
pub const BCRYPT_MAX_BYTES: usize = 72;

/// Password hashing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Bcrypt,
    Argon2id,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bcrypt => "bcrypt",
            Self::Argon2id => "argon2id",
        }
    }
}

/// Returns a random alphanumeric string of `len` characters.
pub fn random_string(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Returns a fresh user identifier.
pub fn new_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Password manager hashing with bcrypt or Argon2id (PHC string format).
pub struct PasswordManager {
    algorithm: HashAlgorithm,
    cost: u32,
    params: Params,
    dummy: String,
}

impl PasswordManager {
    /// Create a new [`PasswordManager`].
    ///
    /// A dummy hash is computed once with the same parameters, used by
    /// [`PasswordManager::burn`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if Argon2 parameters are invalid or hashing fails.
    pub fn new(config: &Hashing) -> Result<Self> {
        let argon = &config.argon2;
        let params = Params::new(
            argon.memory_cost,
            argon.iterations,
            argon.parallelism,
            Some(argon.hash_length),
        )
        .map_err(|err| IdentityError::Crypto {
            cause: err.to_string(),
        })?;

        let mut manager = Self {
            algorithm: config.algorithm,
            cost: config.bounded_cost(),
            params,
            dummy: String::new(),
        };
        let plaintext = Zeroizing::new(random_string(32));
        manager.dummy = manager.hash_password(plaintext.as_str())?;

        Ok(manager)
    }

    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Cost factor recorded next to each hash.
    pub fn cost(&self) -> u32 {
        match self.algorithm {
            HashAlgorithm::Bcrypt => self.cost,
            HashAlgorithm::Argon2id => self.params.t_cost(),
        }
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(
            argon2::Algorithm::Argon2id,
            Version::V0x13,
            self.params.clone(),
        )
    }

    /// Check that `password` can be hashed without losing any byte.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::PolicyViolation`] for bcrypt passwords over
    /// [`BCRYPT_MAX_BYTES`].
    pub fn check_length(&self, password: impl AsRef<[u8]>) -> Result<()> {
        if self.algorithm == HashAlgorithm::Bcrypt
            && password.as_ref().len() > BCRYPT_MAX_BYTES
        {
            return Err(IdentityError::PolicyViolation {
                field: "password",
                reason: format!("must be at most {BCRYPT_MAX_BYTES} bytes"),
            });
        }

        Ok(())
    }

    /// Hash password with the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the password is too long for bcrypt or hashing
    /// fails.
    pub fn hash_password(&self, password: impl AsRef<[u8]>) -> Result<String> {
        self.check_length(password.as_ref())?;

        match self.algorithm {
            HashAlgorithm::Bcrypt => {
                bcrypt::non_truncating_hash(password.as_ref(), self.cost)
                    .catch()
            }
            HashAlgorithm::Argon2id => {
                let salt = SaltString::generate(&mut OsRng);
                self.argon2()
                    .hash_password(password.as_ref(), &salt)
                    .map(|hash| hash.to_string())
                    .map_err(|err| IdentityError::Crypto {
                        cause: err.to_string(),
                    })
            }
        }
    }

    /// Verify password against a stored hash.
    ///
    /// Parameters are read from the hash itself, so hashes created under a
    /// previous cost keep verifying. Malformed hashes never match, nor do
    /// bcrypt candidates over [`BCRYPT_MAX_BYTES`].
    pub fn verify_password(
        &self,
        algorithm: HashAlgorithm,
        password: impl AsRef<[u8]>,
        hash: &str,
    ) -> bool {
        match algorithm {
            HashAlgorithm::Bcrypt => {
                bcrypt::non_truncating_verify(password.as_ref(), hash)
                    .unwrap_or(false)
            }
            HashAlgorithm::Argon2id => match PasswordHash::new(hash) {
                Ok(parsed) => Argon2::default()
                    .verify_password(password.as_ref(), &parsed)
                    .is_ok(),
                Err(_) => false,
            },
        }
    }

    /// Spend one verification against the dummy hash.
    ///
    /// Keeps the cost of a failed lookup equal to a real verification.
    pub fn burn(&self, password: impl AsRef<[u8]>) {
        let _ = self.verify_password(self.algorithm, password, &self.dummy);
    }
}

impl std::fmt::Debug for PasswordManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordManager")
            .field("algorithm", &self.algorithm)
            .field("cost", &self.cost())
            .finish()
    }
}
