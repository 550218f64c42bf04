//! User aggregate and its credential lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::PasswordManager;
use crate::error::{Entity, IdentityError, Result};
use crate::identity::email::EmailAddress;
use crate::identity::id::UserId;
use crate::identity::lockout::Lockout;
use crate::identity::name::Name;
use crate::identity::password::Password;
use crate::identity::role::Role;
use crate::key::PublicKey;
use crate::mfa::{MfaFlags, MfaToken};

/// Claims returned on successful authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Lower-cased username.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Space separated role list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    names: Vec<Name>,
    #[serde(default)]
    emails: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<Role>,
    /// Most recent first.
    #[serde(default)]
    passwords: Vec<Password>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    public_keys: Vec<PublicKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mfa_tokens: Vec<MfaToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lockout: Option<Lockout>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    #[serde(default)]
    revision: u64,
}

impl User {
    /// Create an empty user. It becomes valid once a password is added.
    pub fn new(id: UserId, username: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            username: username.trim().to_owned(),
            names: Vec::new(),
            emails: Vec::new(),
            roles: Vec::new(),
            passwords: Vec::new(),
            public_keys: Vec::new(),
            mfa_tokens: Vec::new(),
            lockout: None,
            created_at: now,
            last_modified: now,
            revision: 0,
        }
    }

    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidUser`] when the id has the wrong
    /// length, the username is empty or no password is active.
    pub fn validate(&self) -> Result<()> {
        let reason = if !self.id.is_valid() {
            "malformed user id"
        } else if self.username.is_empty() {
            "empty username"
        } else if !self.passwords.iter().any(Password::is_active) {
            "no active password"
        } else {
            return Ok(());
        };

        Err(IdentityError::InvalidUser {
            id: self.id.to_string(),
            reason,
        })
    }

    /// Record a mutation.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.revision += 1;
        self.last_modified = now;
    }

    /// Set a new current password.
    ///
    /// Previous passwords are disabled and kept as history, up to
    /// `retention` records in total.
    ///
    /// # Errors
    ///
    /// Returns `Err` if hashing fails. The user is unchanged in that case.
    pub fn add_password(
        &mut self,
        plaintext: &str,
        manager: &PasswordManager,
        retention: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let password = Password::new(plaintext, manager, now)?;

        self.passwords
            .iter_mut()
            .filter(|password| password.is_active())
            .for_each(|password| password.disable(now));
        self.passwords.insert(0, password);
        self.passwords.truncate(retention.max(1));

        Ok(())
    }

    /// Check `plaintext` against active passwords, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] on any mismatch.
    pub fn verify_password(
        &self,
        plaintext: &str,
        manager: &PasswordManager,
    ) -> Result<()> {
        let mut active = self.passwords.iter().filter(|p| p.is_active()).peekable();
        if active.peek().is_none() {
            manager.burn(plaintext);
            return Err(IdentityError::InvalidCredentials);
        }

        if active.any(|password| password.verify(plaintext, manager)) {
            Ok(())
        } else {
            Err(IdentityError::InvalidCredentials)
        }
    }

    /// Rotate the password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] if `old` does not
    /// verify.
    pub fn change_password(
        &mut self,
        old: &str,
        new: &str,
        manager: &PasswordManager,
        retention: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.verify_password(old, manager)?;
        self.add_password(new, manager, retention, now)
    }

    /// Add an address unless an equal one (case-insensitive) exists.
    /// The first address becomes primary when none is flagged.
    ///
    /// Returns whether the address was added.
    pub fn add_email_address(&mut self, email: EmailAddress) -> bool {
        let normalized = email.normalized();
        if self.emails.iter().any(|e| e.normalized() == normalized) {
            return false;
        }

        let email = if self.emails.is_empty() && !email.is_primary() {
            email.primary()
        } else {
            email
        };
        self.emails.push(email);
        true
    }

    /// Add a role unless the same (organization, name) pair exists.
    pub fn add_role(&mut self, role: Role) -> bool {
        if self.roles.contains(&role) {
            return false;
        }
        self.roles.push(role);
        true
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    /// Add a name unless the same full name exists. The first name is the
    /// primary one.
    pub fn add_name(&mut self, mut name: Name) -> bool {
        if self.names.iter().any(|n| n.same_as(&name)) {
            return false;
        }
        if self.names.is_empty() {
            name.primary = true;
        }
        self.names.push(name);
        true
    }

    /// Attach a parsed public key.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::AlreadyExists`] when an enabled key with the
    /// same type and fingerprint is attached.
    pub fn add_public_key(&mut self, key: PublicKey) -> Result<&PublicKey> {
        let duplicate = self.public_keys.iter().any(|k| {
            !k.is_disabled()
                && k.key_type() == key.key_type()
                && k.fingerprint() == key.fingerprint()
        });
        if duplicate {
            return Err(IdentityError::AlreadyExists {
                entity: Entity::PublicKey,
                value: key.fingerprint().to_owned(),
            });
        }

        self.public_keys.push(key);
        Ok(&self.public_keys[self.public_keys.len() - 1])
    }

    /// Remove a public key by id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub fn delete_public_key(&mut self, id: &str) -> Result<PublicKey> {
        let position = self
            .public_keys
            .iter()
            .position(|k| k.id() == id)
            .ok_or_else(|| IdentityError::not_found(Entity::PublicKey, id))?;
        Ok(self.public_keys.remove(position))
    }

    /// Attach an enrolled token.
    ///
    /// # Errors
    ///
    /// Returns a conflict when an active token already uses the same secret
    /// or the same non-empty comment.
    pub fn add_mfa_token(&mut self, token: MfaToken) -> Result<&MfaToken> {
        if token.is_active() {
            for existing in self.mfa_tokens.iter().filter(|t| t.is_active()) {
                if existing.secret() == token.secret() {
                    return Err(IdentityError::DuplicateMfaSecret);
                }
                if !token.comment().is_empty()
                    && existing.comment() == token.comment()
                {
                    return Err(IdentityError::DuplicateMfaComment(
                        token.comment().to_owned(),
                    ));
                }
            }
        }

        self.mfa_tokens.push(token);
        Ok(&self.mfa_tokens[self.mfa_tokens.len() - 1])
    }

    /// Remove a token by id.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub fn delete_mfa_token(&mut self, id: &str) -> Result<MfaToken> {
        let position = self
            .mfa_tokens
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| IdentityError::not_found(Entity::MfaToken, id))?;
        Ok(self.mfa_tokens.remove(position))
    }

    /// Check a TOTP passcode against every active TOTP token.
    pub fn verify_passcode(&self, code: &str, timestamp: i64) -> bool {
        // Every token is checked so the time spent does not reveal which
        // one matched.
        self.mfa_tokens.iter().fold(false, |matched, token| {
            token.validate_code_at(code, timestamp) | matched
        })
    }

    pub fn mfa_flags(&self) -> MfaFlags {
        MfaFlags::from_tokens(&self.mfa_tokens)
    }

    pub fn lock(&mut self, start: DateTime<Utc>, until: Option<DateTime<Utc>>) {
        self.lockout = Some(Lockout::new(start, until));
    }

    pub fn unlock(&mut self) {
        self.lockout = None;
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lockout.as_ref().is_some_and(|l| l.is_locked(now))
    }

    pub fn claims(&self) -> Claims {
        let mail = self
            .emails
            .iter()
            .find(|e| e.is_primary())
            .or_else(|| self.emails.first())
            .map(|e| e.as_str().to_owned());
        let name = self
            .names
            .iter()
            .find(|n| n.primary)
            .or_else(|| self.names.first())
            .map(Name::full_name)
            .filter(|n| !n.is_empty());
        let roles = (!self.roles.is_empty()).then(|| {
            self.roles
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ")
        });

        Claims {
            sub: self.username.to_lowercase(),
            mail,
            name,
            roles,
        }
    }

    #[inline]
    pub fn id(&self) -> &UserId {
        &self.id
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn names(&self) -> &[Name] {
        &self.names
    }

    pub fn emails(&self) -> &[EmailAddress] {
        &self.emails
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn passwords(&self) -> &[Password] {
        &self.passwords
    }

    pub fn public_keys(&self) -> &[PublicKey] {
        &self.public_keys
    }

    pub fn mfa_tokens(&self) -> &[MfaToken] {
        &self.mfa_tokens
    }

    pub fn lockout(&self) -> Option<&Lockout> {
        self.lockout.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
