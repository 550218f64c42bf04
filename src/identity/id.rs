//! User identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{USER_ID_LENGTH, new_user_id};
use crate::error::{IdentityError, Result};

/// Value object of a user identifier.
///
/// Deserialization accepts any string so that a malformed snapshot is
/// reported by user validation rather than by the JSON decoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Generate a fresh random [`UserId`].
    pub fn generate() -> Self {
        Self(new_user_id())
    }

    /// Converts a [`String`] into a valid [`UserId`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string is not exactly 36 characters long.
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = Self(id.into());
        if !id.is_valid() {
            return Err(IdentityError::invalid(
                "id",
                id.0,
                format!("must be {USER_ID_LENGTH} characters long"),
            ));
        }
        Ok(id)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.len() == USER_ID_LENGTH
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
