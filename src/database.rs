//! Identity database: users, their indices and the on-disk snapshot.

mod index;
mod snapshot;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use validator::Validate;

pub use self::snapshot::SNAPSHOT_VERSION;
use self::index::Index;
use self::snapshot::Snapshot;
use crate::clock::{Clock, SystemClock};
use crate::config::{Configuration, Policy};
use crate::crypto::PasswordManager;
use crate::error::{Entity, IdentityError, Result};
use crate::identity::{Claims, EmailAddress, Name, Role, User, UserId};
use crate::key::PublicKey;
use crate::mfa::{MfaFlags, MfaToken, TotpParams};
use crate::request::{KeyRequest, MfaTokenRequest, NewUser};
use crate::telemetry;

/// Attempts at drawing an unused user id.
const MAX_ID_ATTEMPTS: usize = 10;

struct State {
    snapshot: Snapshot,
    index: Index,
}

impl State {
    /// Resolve identity hints to one user. Empty hints are ignored, but at
    /// least one must be given.
    fn resolve(&self, username: &str, email: &str) -> Result<usize> {
        let username = username.trim();
        let email = email.trim();

        let by_username = (!username.is_empty())
            .then(|| {
                self.index.by_username(username).ok_or_else(|| {
                    IdentityError::not_found(Entity::Username, username)
                })
            })
            .transpose()?;
        let by_email = (!email.is_empty())
            .then(|| {
                self.index
                    .by_email(email)
                    .ok_or_else(|| IdentityError::not_found(Entity::Email, email))
            })
            .transpose()?;

        match (by_username, by_email) {
            (Some(a), Some(b)) if a != b => Err(IdentityError::IdentityMismatch {
                username: username.to_owned(),
                email: email.to_owned(),
            }),
            (Some(position), _) | (None, Some(position)) => Ok(position),
            (None, None) => Err(IdentityError::invalid(
                "username",
                "",
                "username or email is required",
            )),
        }
    }

    fn user(&self, position: usize) -> &User {
        &self.snapshot.users[position]
    }
}

/// Embeddable identity store backed by a single JSON snapshot.
///
/// All state sits behind one reader/writer lock. Mutations hold the write
/// side from validation until the snapshot is on disk.
pub struct Database {
    path: PathBuf,
    config: Arc<Configuration>,
    passwords: PasswordManager,
    clock: Arc<dyn Clock>,
    state: RwLock<State>,
}

impl Database {
    /// Open the database at `path` with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`Database::open_with_clock`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Arc::new(Configuration::default()))
    }

    /// Open the database at `path` with `config`.
    ///
    /// # Errors
    ///
    /// See [`Database::open_with_clock`].
    pub fn open_with(
        path: impl AsRef<Path>,
        config: Arc<Configuration>,
    ) -> Result<Self> {
        Self::open_with_clock(path, config, Arc::new(SystemClock::new()))
    }

    /// Open the database at `path`, reading time from `clock`.
    ///
    /// An existing snapshot is loaded and indexed. Otherwise a new empty
    /// database using the configured policy is created and written.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `path` is a directory, the snapshot cannot be
    /// read, or a user record is invalid or duplicated (unless
    /// `skip_invalid_users` is set).
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        config: Arc<Configuration>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(IdentityError::io(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::IsADirectory,
                    "database path is a directory",
                ),
            ));
        }

        let passwords = PasswordManager::new(&config.hashing)?;

        let (state, created) = if path.exists() {
            let mut snapshot = Snapshot::read(&path)?;
            let users = std::mem::take(&mut snapshot.users);
            let (users, index) =
                Index::build(users, config.skip_invalid_users)?;
            snapshot.users = users;
            (State { snapshot, index }, false)
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            {
                fs::create_dir_all(parent)
                    .map_err(|err| IdentityError::io(parent, err))?;
            }
            let snapshot = Snapshot::new(config.policy.clone(), clock.now());
            (
                State {
                    snapshot,
                    index: Index::default(),
                },
                true,
            )
        };

        let database = Self {
            path,
            config,
            passwords,
            clock,
            state: RwLock::new(state),
        };

        if created {
            database.save()?;
        }

        let state = database.state.read();
        tracing::info!(
            path = %database.path.display(),
            users = state.index.len(),
            revision = state.snapshot.revision,
            created,
            "identity database opened"
        );
        drop(state);

        Ok(database)
    }

    /// Bump revision, then write the snapshot. Called with the write lock
    /// held.
    fn commit(&self, state: &mut State) -> Result<()> {
        state.snapshot.revision += 1;
        state.snapshot.last_modified = self.clock.now();
        state.snapshot.write(&self.path)?;

        metrics::counter!(telemetry::COMMITS_TOTAL).increment(1);
        tracing::debug!(
            revision = state.snapshot.revision,
            "identity database committed"
        );

        Ok(())
    }

    /// Apply `f` to the user resolved from the hints, then commit.
    fn update<T>(
        &self,
        username: &str,
        email: &str,
        f: impl FnOnce(&mut User, &Policy, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.write();
        let position = state.resolve(username, email)?;
        let now = self.clock.now();

        let Snapshot { users, policy, .. } = &mut state.snapshot;
        let user = &mut users[position];
        let value = f(user, policy, now)?;
        user.touch(now);

        self.commit(&mut state)?;
        Ok(value)
    }

    /// Write the snapshot to disk.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the snapshot cannot be written.
    pub fn save(&self) -> Result<()> {
        let mut state = self.state.write();
        self.commit(&mut state)
    }

    /// Write a copy of the current snapshot to `path`. The database keeps
    /// using its own path.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the copy cannot be written.
    pub fn copy(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| IdentityError::io(parent, err))?;
        }
        self.state.read().snapshot.write(path)
    }

    /// Create a user from `candidate`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed fields or policy
    /// violations, and [`IdentityError::AlreadyExists`] when the username
    /// or email is taken (case-insensitive).
    pub fn add_user(&self, candidate: &NewUser) -> Result<UserId> {
        candidate.validate()?;
        let email = EmailAddress::parse(&candidate.email)?;
        let name = candidate
            .full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(Name::parse)
            .transpose()?;
        let roles = candidate
            .roles
            .iter()
            .map(|role| Role::parse(role))
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.write();
        let policy = &state.snapshot.policy;
        let username = candidate.username.trim();
        policy.check_username(username)?;
        policy.check_password(&candidate.password)?;
        self.passwords.check_length(&candidate.password)?;
        let retention = policy.retention();

        if state.index.by_username(username).is_some() {
            return Err(IdentityError::AlreadyExists {
                entity: Entity::Username,
                value: username.to_owned(),
            });
        }
        state.index.check_email(email.as_str())?;

        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| UserId::generate())
            .find(|id| !state.index.contains_id(id.as_str()))
            .ok_or_else(|| {
                IdentityError::Internal("no unused user id available".into())
            })?;

        let now = self.clock.now();
        let mut user = User::new(id.clone(), username, now);
        user.add_email_address(email);
        if let Some(name) = name {
            user.add_name(name);
        }
        for role in roles {
            user.add_role(role);
        }
        user.add_password(&candidate.password, &self.passwords, retention, now)?;
        user.validate()?;

        let position = state.snapshot.users.len();
        state.index.insert(&user, position);
        state.snapshot.users.push(user);
        self.commit(&mut state)?;

        metrics::counter!(telemetry::USERS_CREATED_TOTAL).increment(1);
        tracing::info!(user_id = %id, "user created");

        Ok(id)
    }

    /// Identity removal is not supported.
    ///
    /// # Errors
    ///
    /// Always returns [`IdentityError::UnsupportedOperation`].
    pub fn delete_user(&self, _username: &str, _email: &str) -> Result<()> {
        Err(IdentityError::UnsupportedOperation {
            operation: "delete user",
        })
    }

    fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Claims, MfaFlags)> {
        let state = self.state.read();

        let Some(position) = state.index.by_username(username) else {
            self.passwords.burn(password);
            return Err(self.reject("unknown_user"));
        };

        let user = state.user(position);
        if user.verify_password(password, &self.passwords).is_err() {
            return Err(self.reject("invalid_password"));
        }
        if user.is_locked(self.clock.now()) {
            return Err(self.reject("locked"));
        }

        telemetry::authentication("success");
        tracing::info!(user_id = %user.id(), "user authenticated");

        Ok((user.claims(), user.mfa_flags()))
    }

    fn reject(&self, reason: &'static str) -> IdentityError {
        telemetry::authentication(reason);
        tracing::info!(reason, "authentication failed");
        IdentityError::InvalidCredentials
    }

    /// Authenticate with username and password.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] for any failure:
    /// unknown user, wrong password or locked account.
    pub fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Claims> {
        self.authenticate(username, password).map(|(claims, _)| claims)
    }

    /// Same as [`Database::authenticate_user`], also returning the MFA
    /// capabilities of the user.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] for any failure.
    pub fn authenticate_user_with_flags(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Claims, MfaFlags)> {
        self.authenticate(username, password)
    }

    /// Check a TOTP passcode against the active tokens of `username`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] if the user is unknown
    /// or no token accepts the passcode.
    pub fn verify_mfa_passcode(&self, username: &str, passcode: &str) -> Result<()> {
        let state = self.state.read();
        let now = self.clock.unix();
        let accepted = match state.index.by_username(username) {
            Some(position) => state.user(position).verify_passcode(passcode, now),
            None => {
                TotpParams::default().burn(passcode, now);
                false
            }
        };

        if accepted {
            Ok(())
        } else {
            tracing::info!("mfa passcode rejected");
            Err(IdentityError::InvalidCredentials)
        }
    }

    /// Return the user matching the hints.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for unknown hints and
    /// [`IdentityError::IdentityMismatch`] when they resolve to different
    /// users.
    pub fn get_user(&self, username: &str, email: &str) -> Result<User> {
        let state = self.state.read();
        let position = state.resolve(username, email)?;
        Ok(state.user(position).clone())
    }

    /// Return every user when both hints are empty, otherwise the user
    /// matching them.
    ///
    /// # Errors
    ///
    /// Same as [`Database::get_user`].
    pub fn get_users(&self, username: &str, email: &str) -> Result<Vec<User>> {
        let state = self.state.read();
        if username.trim().is_empty() && email.trim().is_empty() {
            return Ok(state.snapshot.users.clone());
        }
        let position = state.resolve(username, email)?;
        Ok(vec![state.user(position).clone()])
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown id.
    pub fn get_user_by_id(&self, id: &str) -> Result<User> {
        let state = self.state.read();
        state
            .index
            .by_id(id)
            .map(|position| state.user(position).clone())
            .ok_or_else(|| IdentityError::not_found(Entity::UserId, id))
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown username.
    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        let state = self.state.read();
        state
            .index
            .by_username(username)
            .map(|position| state.user(position).clone())
            .ok_or_else(|| IdentityError::not_found(Entity::Username, username))
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown address.
    pub fn get_user_by_email(&self, email: &str) -> Result<User> {
        let state = self.state.read();
        state
            .index
            .by_email(email)
            .map(|position| state.user(position).clone())
            .ok_or_else(|| IdentityError::not_found(Entity::Email, email))
    }

    /// Rotate the password of a user after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCredentials`] if `old` does not
    /// verify and a policy violation if `new` is not acceptable.
    pub fn change_user_password(
        &self,
        username: &str,
        email: &str,
        old: &str,
        new: &str,
    ) -> Result<()> {
        self.update(username, email, |user, policy, now| {
            policy.check_password(new)?;
            self.passwords.check_length(new)?;
            user.change_password(old, new, &self.passwords, policy.retention(), now)
        })?;

        tracing::info!(username, "password changed");
        Ok(())
    }

    /// Parse and attach a public key.
    ///
    /// # Errors
    ///
    /// Returns parsing errors from [`PublicKey::parse`] and
    /// [`IdentityError::AlreadyExists`] for a key already attached.
    pub fn add_public_key(
        &self,
        username: &str,
        email: &str,
        request: &KeyRequest,
    ) -> Result<PublicKey> {
        self.update(username, email, |user, _, now| {
            let key = PublicKey::parse(request, now)?;
            user.add_public_key(key).cloned()
        })
    }

    /// Public keys of a user. Disabled keys are left out unless
    /// `include_disabled` is set.
    ///
    /// # Errors
    ///
    /// Same as [`Database::get_user`].
    pub fn get_public_keys(
        &self,
        username: &str,
        email: &str,
        include_disabled: bool,
    ) -> Result<Vec<PublicKey>> {
        let state = self.state.read();
        let position = state.resolve(username, email)?;
        Ok(state
            .user(position)
            .public_keys()
            .iter()
            .filter(|key| include_disabled || !key.is_disabled())
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown key id.
    pub fn delete_public_key(
        &self,
        username: &str,
        email: &str,
        id: &str,
    ) -> Result<()> {
        self.update(username, email, |user, _, _| {
            user.delete_public_key(id).map(drop)
        })
    }

    /// Enroll and attach an MFA token.
    ///
    /// # Errors
    ///
    /// Returns enrollment errors from [`MfaToken::enroll`] and a conflict
    /// when the secret or comment is already used by an active token.
    pub fn add_mfa_token(
        &self,
        username: &str,
        email: &str,
        request: &MfaTokenRequest,
    ) -> Result<MfaToken> {
        self.update(username, email, |user, _, now| {
            let token = MfaToken::enroll(request, now)?;
            user.add_mfa_token(token).cloned()
        })
    }

    /// MFA tokens of a user. Disabled tokens are left out unless
    /// `include_disabled` is set.
    ///
    /// # Errors
    ///
    /// Same as [`Database::get_user`].
    pub fn get_mfa_tokens(
        &self,
        username: &str,
        email: &str,
        include_disabled: bool,
    ) -> Result<Vec<MfaToken>> {
        let state = self.state.read();
        let position = state.resolve(username, email)?;
        Ok(state
            .user(position)
            .mfa_tokens()
            .iter()
            .filter(|token| include_disabled || token.is_active())
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`IdentityError::NotFound`] for an unknown token id.
    pub fn delete_mfa_token(
        &self,
        username: &str,
        email: &str,
        id: &str,
    ) -> Result<()> {
        self.update(username, email, |user, _, _| {
            user.delete_mfa_token(id).map(drop)
        })
    }

    /// Lock a user from now until `until`, or indefinitely.
    ///
    /// # Errors
    ///
    /// Same as [`Database::get_user`], plus commit failures.
    pub fn lock_user(
        &self,
        username: &str,
        email: &str,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.update(username, email, |user, _, now| {
            user.lock(now, until);
            Ok(())
        })?;
        tracing::info!(username, email, "user locked");
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`Database::get_user`], plus commit failures.
    pub fn unlock_user(&self, username: &str, email: &str) -> Result<()> {
        self.update(username, email, |user, _, _| {
            user.unlock();
            Ok(())
        })
    }

    pub fn user_count(&self) -> usize {
        self.state.read().snapshot.users.len()
    }

    pub fn revision(&self) -> u64 {
        self.state.read().snapshot.revision
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.state.read().snapshot.last_modified
    }

    /// Policy persisted in this database.
    pub fn policy(&self) -> Policy {
        self.state.read().snapshot.policy.clone()
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("users", &self.user_count())
            .field("revision", &self.revision())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::clock::FixedClock;
    use crate::config::Hashing;
    use crate::error::ErrorKind;

    fn config() -> Arc<Configuration> {
        Arc::new(Configuration::default().hashing(Hashing {
            cost: 4,
            ..Default::default()
        }))
    }

    fn open(dir: &TempDir) -> Database {
        Database::open_with_clock(
            dir.path().join("identity.json"),
            config(),
            Arc::new(FixedClock::at(1_700_000_000)),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        db.add_user(&NewUser::new("jsmith", "P@ssw0rd123", "jsmith@example.com"))
            .unwrap();
        db.add_user(&NewUser::new("adoe", "P@ssw0rd123", "adoe@example.com"))
            .unwrap();

        let state = db.state.read();
        assert_eq!(state.resolve("JSmith", "").unwrap(), 0);
        assert_eq!(state.resolve("", "adoe@example.com").unwrap(), 1);
        assert_eq!(state.resolve("adoe", "ADOE@example.com").unwrap(), 1);
        assert_eq!(
            state.resolve("jsmith", "adoe@example.com").unwrap_err().kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            state.resolve("nobody", "").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            state.resolve(" ", "").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_commit_bumps_revision() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        let revision = db.revision();
        assert_eq!(revision, 1);

        db.save().unwrap();
        assert_eq!(db.revision(), revision + 1);

        let snapshot = Snapshot::read(db.path()).unwrap();
        assert_eq!(snapshot.revision, revision + 1);
        assert_eq!(snapshot.last_modified, db.last_modified());
    }

    #[test]
    fn test_failed_mutation_does_not_commit() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        db.add_user(&NewUser::new("jsmith", "P@ssw0rd123", "jsmith@example.com"))
            .unwrap();
        let revision = db.revision();

        let err = db.delete_public_key("jsmith", "", "missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(db.revision(), revision);
    }

    #[test]
    fn test_directory_path() {
        let dir = TempDir::new().unwrap();
        let err = Database::open_with(dir.path(), config()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
