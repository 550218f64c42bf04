//! Email logic management.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::{IdentityError, Result};

/// Email address attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    address: String,
    domain: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    confirmed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    primary: bool,
}

impl EmailAddress {
    /// Converts a [`str`] into a valid [`EmailAddress`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the string is not a valid email address as
    /// defined on RFC5322.
    pub fn parse(email: &str) -> Result<Self> {
        let address = email.trim();
        if !address.validate_email() {
            return Err(IdentityError::invalid(
                "email",
                address,
                "invalid email address",
            ));
        }

        let domain = address
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_lowercase())
            .unwrap_or_default();

        Ok(Self {
            address: address.to_owned(),
            domain,
            confirmed: false,
            primary: false,
        })
    }

    /// Mark as the primary address.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// Lower-cased form used for uniqueness checks.
    pub fn normalized(&self) -> String {
        self.address.to_lowercase()
    }

    #[inline]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    #[inline]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.address
    }
}
