//! Personal name value object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub first: String,
    pub last: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub primary: bool,
}

impl Name {
    /// Parse `Last, First [Middle]` or `First [Middle] Last`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the text holds no name.
    pub fn parse(full_name: &str) -> Result<Self> {
        let text = full_name.trim();
        if text.is_empty() {
            return Err(IdentityError::invalid("name", text, "empty name"));
        }

        if let Some((last, rest)) = text.split_once(',') {
            let mut words = rest.split_whitespace();
            let first = words.next().unwrap_or_default();
            let middle = words.collect::<Vec<_>>().join(" ");
            return Ok(Self {
                first: first.to_owned(),
                last: last.trim().to_owned(),
                middle: (!middle.is_empty()).then_some(middle),
                ..Default::default()
            });
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        let name = match words.as_slice() {
            [single] => Self {
                first: (*single).to_owned(),
                ..Default::default()
            },
            [first, middle @ .., last] => Self {
                first: (*first).to_owned(),
                last: (*last).to_owned(),
                middle: (!middle.is_empty()).then(|| middle.join(" ")),
                ..Default::default()
            },
            [] => {
                return Err(IdentityError::invalid("name", text, "empty name"));
            }
        };

        Ok(name)
    }

    /// `First [Middle] Last`, the form used for the `name` claim.
    pub fn full_name(&self) -> String {
        [
            Some(self.first.as_str()),
            self.middle.as_deref(),
            Some(self.last.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Two names are the same person name regardless of flags.
    pub fn same_as(&self, other: &Name) -> bool {
        self.full_name() == other.full_name()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma() {
        let name = Name::parse("Smith, John").unwrap();
        assert_eq!(name.first, "John");
        assert_eq!(name.last, "Smith");
        assert_eq!(name.full_name(), "John Smith");
    }

    #[test]
    fn test_parse_words() {
        let name = Name::parse("John Paul Smith").unwrap();
        assert_eq!(name.middle.as_deref(), Some("Paul"));
        assert_eq!(name.full_name(), "John Paul Smith");

        let name = Name::parse("Cher").unwrap();
        assert_eq!(name.full_name(), "Cher");

        assert!(Name::parse("   ").is_err());
    }

    #[test]
    fn test_same_as() {
        let a = Name::parse("Smith, John").unwrap();
        let mut b = Name::parse("John Smith").unwrap();
        b.primary = true;
        assert!(a.same_as(&b));
    }
}
