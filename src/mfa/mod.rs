//! Multi-factor authentication engine.

pub mod token;
pub mod totp;
pub mod webauthn;

pub use token::{MfaFlags, MfaParams, MfaToken};
pub use totp::{TotpAlgorithm, TotpParams};
pub use webauthn::{MfaDevice, Transport, U2fParams};
