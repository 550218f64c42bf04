//! Embeddable identity store.
//!
//! Holds user credentials (passwords, MFA tokens, public keys) in a single
//! JSON snapshot, enforces policy over them and authenticates callers.
//!
//! ```no_run
//! use identity_store::{Database, NewUser};
//!
//! let db = Database::open("identity.json")?;
//! db.add_user(&NewUser::new("jsmith", "P@ssw0rd123", "jsmith@example.com"))?;
//! let claims = db.authenticate_user("jsmith", "P@ssw0rd123")?;
//! assert_eq!(claims.sub, "jsmith");
//! # Ok::<(), identity_store::IdentityError>(())
//! ```

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod identity;
pub mod key;
pub mod mfa;
pub mod request;
pub mod telemetry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Configuration, Policy};
pub use database::Database;
pub use error::{ErrorKind, IdentityError, Result};
pub use identity::{Claims, User, UserId};
pub use key::{KeyUsage, PublicKey};
pub use mfa::{MfaFlags, MfaToken};
pub use request::{
    KeyRequest, KeySpec, MfaTokenRequest, NewUser, TotpRequest, U2fRequest,
};
