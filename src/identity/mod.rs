//! User identity: value objects, password records and the user aggregate.

pub mod email;
pub mod id;
pub mod lockout;
pub mod name;
pub mod password;
pub mod role;
pub mod user;

pub use email::EmailAddress;
pub use id::UserId;
pub use lockout::Lockout;
pub use name::Name;
pub use password::Password;
pub use role::Role;
pub use user::{Claims, User};
