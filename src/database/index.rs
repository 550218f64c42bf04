//! In-memory lookup indices over the user list.

use std::collections::HashMap;

use crate::error::{Entity, IdentityError, Result};
use crate::identity::User;

/// Maps lower-cased usernames, lower-cased emails and ids to positions in
/// the user list. Rebuilt on load, never persisted.
#[derive(Debug, Default)]
pub struct Index {
    by_id: HashMap<String, usize>,
    by_username: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
}

impl Index {
    /// Validate `users` and index them.
    ///
    /// With `skip_invalid`, a user that fails validation or duplicates an
    /// earlier one is dropped with a warning. Otherwise the first such user
    /// fails the whole build.
    ///
    /// # Errors
    ///
    /// Returns the validation or conflict error of the first rejected user.
    pub fn build(
        users: Vec<User>,
        skip_invalid: bool,
    ) -> Result<(Vec<User>, Self)> {
        let mut index = Self::default();
        let mut kept = Vec::with_capacity(users.len());

        for user in users {
            let checked = user.validate().and_then(|()| index.check(&user));
            match checked {
                Ok(()) => {
                    index.insert(&user, kept.len());
                    kept.push(user);
                }
                Err(err) if skip_invalid => {
                    tracing::warn!(
                        user_id = %user.id(),
                        error = %err,
                        "skipping invalid user record"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok((kept, index))
    }

    /// Check that none of the keys of `user` is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::AlreadyExists`] naming the taken key.
    pub fn check(&self, user: &User) -> Result<()> {
        if self.by_id.contains_key(user.id().as_str()) {
            return Err(IdentityError::AlreadyExists {
                entity: Entity::UserId,
                value: user.id().to_string(),
            });
        }
        if self.by_username.contains_key(&user.username().to_lowercase()) {
            return Err(IdentityError::AlreadyExists {
                entity: Entity::Username,
                value: user.username().to_owned(),
            });
        }
        for email in user.emails() {
            self.check_email(email.as_str())?;
        }
        Ok(())
    }

    pub fn check_email(&self, email: &str) -> Result<()> {
        if self.by_email.contains_key(&email.to_lowercase()) {
            return Err(IdentityError::AlreadyExists {
                entity: Entity::Email,
                value: email.to_owned(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, user: &User, position: usize) {
        self.by_id.insert(user.id().to_string(), position);
        self.by_username
            .insert(user.username().to_lowercase(), position);
        for email in user.emails() {
            self.by_email.insert(email.normalized(), position);
        }
    }

    #[inline]
    pub fn contains_id(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn by_id(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn by_username(&self, username: &str) -> Option<usize> {
        self.by_username.get(&username.trim().to_lowercase()).copied()
    }

    pub fn by_email(&self, email: &str) -> Option<usize> {
        self.by_email.get(&email.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::Hashing;
    use crate::crypto::PasswordManager;
    use crate::error::ErrorKind;
    use crate::identity::{EmailAddress, UserId};

    fn user(manager: &PasswordManager, username: &str, email: &str) -> User {
        let mut user = User::new(UserId::generate(), username, Utc::now());
        user.add_email_address(EmailAddress::parse(email).unwrap());
        user.add_password("P@ssw0rd123", manager, 10, Utc::now())
            .unwrap();
        user
    }

    fn manager() -> PasswordManager {
        PasswordManager::new(&Hashing {
            cost: 4,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_build_and_lookup() {
        let manager = manager();
        let users = vec![
            user(&manager, "jsmith", "jsmith@example.com"),
            user(&manager, "adoe", "adoe@example.com"),
        ];
        let id = users[1].id().to_string();

        let (users, index) = Index::build(users, false).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(index.len(), 2);
        assert_eq!(index.by_username("JSmith"), Some(0));
        assert_eq!(index.by_email("ADoe@Example.com"), Some(1));
        assert_eq!(index.by_id(&id), Some(1));
        assert!(index.contains_id(&id));
        assert_eq!(index.by_username("nobody"), None);
    }

    #[test]
    fn test_duplicates_fail_fast() {
        let manager = manager();

        let users = vec![
            user(&manager, "jsmith", "jsmith@example.com"),
            user(&manager, "JSMITH", "other@example.com"),
        ];
        let err = Index::build(users, false).unwrap_err();
        assert!(matches!(
            err,
            IdentityError::AlreadyExists {
                entity: Entity::Username,
                ..
            }
        ));

        let users = vec![
            user(&manager, "jsmith", "jsmith@example.com"),
            user(&manager, "adoe", "JSmith@example.com"),
        ];
        let err = Index::build(users, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let first = user(&manager, "jsmith", "jsmith@example.com");
        let users = vec![first.clone(), first];
        let err = Index::build(users, false).unwrap_err();
        assert!(matches!(
            err,
            IdentityError::AlreadyExists {
                entity: Entity::UserId,
                ..
            }
        ));
    }

    #[test]
    fn test_skip_invalid() {
        let manager = manager();
        let users = vec![
            user(&manager, "jsmith", "jsmith@example.com"),
            user(&manager, "jsmith", "other@example.com"),
            User::new(UserId::generate(), "nopassword", Utc::now()),
            user(&manager, "adoe", "adoe@example.com"),
        ];

        let (users, index) = Index::build(users, true).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(index.by_username("adoe"), Some(1));
        assert_eq!(index.by_email("other@example.com"), None);
    }
}
