//! Role value object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};

/// Role granted to a user, optionally scoped to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization: Option<String>,
}

impl Role {
    /// Parse `org/name` or `name`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a part is empty or there is more than one `/`.
    pub fn parse(role: &str) -> Result<Self> {
        let role = role.trim();
        let invalid = |reason: &str| IdentityError::invalid("role", role, reason);

        let (organization, name) = match role.split_once('/') {
            Some((org, name)) => {
                if org.is_empty() || name.is_empty() || name.contains('/') {
                    return Err(invalid("expected org/name"));
                }
                (Some(org.to_owned()), name)
            }
            None => (None, role),
        };

        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(invalid("role name must be a single word"));
        }

        Ok(Self {
            name: name.to_owned(),
            organization,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.organization {
            Some(org) => write!(f, "{org}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let role = Role::parse("superadmin").unwrap();
        assert_eq!(role.name(), "superadmin");
        assert_eq!(role.organization(), None);

        let role = Role::parse("internal/admin").unwrap();
        assert_eq!(role.name(), "admin");
        assert_eq!(role.organization(), Some("internal"));
        assert_eq!(role.to_string(), "internal/admin");
    }

    #[test]
    fn test_invalid() {
        for bad in ["", "/admin", "org/", "a/b/c", "two words"] {
            assert!(Role::parse(bad).is_err(), "{bad}");
        }
    }
}
