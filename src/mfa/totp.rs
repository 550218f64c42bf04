//! TOTP generator using HMAC-SHA1, HMAC-SHA256 or HMAC-SHA512.

use std::fmt;
use std::str::FromStr;

use base32::Alphabet;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use url::Url;

use crate::error::{IdentityError, Result};

pub const DEFAULT_PERIOD: u64 = 30;
pub const DEFAULT_DIGITS: u32 = 6;
pub const MIN_PERIOD: u64 = 30;
pub const MAX_PERIOD: u64 = 300;
pub const MIN_DIGITS: u32 = 4;
pub const MAX_DIGITS: u32 = 8;

/// Supported TOTP algorithms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotpAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl TotpAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>> {
        let crypto = |err: hmac::digest::InvalidLength| IdentityError::Crypto {
            cause: err.to_string(),
        };

        let sum = match self {
            Self::Sha1 => {
                let mut mac =
                    Hmac::<Sha1>::new_from_slice(key).map_err(crypto)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha256 => {
                let mut mac =
                    Hmac::<Sha256>::new_from_slice(key).map_err(crypto)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha512 => {
                let mut mac =
                    Hmac::<Sha512>::new_from_slice(key).map_err(crypto)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        };

        Ok(sum)
    }
}

impl FromStr for TotpAlgorithm {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(IdentityError::invalid(
                "algorithm",
                other,
                "must be sha1, sha256 or sha512",
            )),
        }
    }
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a decimal number written in canonical form.
///
/// `"030"`, `"+30"` and `"30a"` are all rejected.
fn parse_canonical<T>(field: &'static str, text: &str) -> Result<T>
where
    T: FromStr + ToString,
{
    let value = text.parse::<T>().map_err(|_| {
        IdentityError::invalid(field, text, "must be a decimal number")
    })?;

    if value.to_string() != text {
        return Err(IdentityError::invalid(
            field,
            text,
            "must be written without sign or leading zeros",
        ));
    }

    Ok(value)
}

/// Validated TOTP parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpParams {
    algorithm: TotpAlgorithm,
    period: u64,
    digits: u32,
}

impl Default for TotpParams {
    fn default() -> Self {
        Self {
            algorithm: TotpAlgorithm::Sha1,
            period: DEFAULT_PERIOD,
            digits: DEFAULT_DIGITS,
        }
    }
}

impl TotpParams {
    /// Create new parameters with validation.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `period` is outside 30..=300 seconds or `digits`
    /// outside 4..=8.
    pub fn new(
        algorithm: TotpAlgorithm,
        period: u64,
        digits: u32,
    ) -> Result<Self> {
        if !(MIN_PERIOD..=MAX_PERIOD).contains(&period) {
            return Err(IdentityError::invalid(
                "period",
                period.to_string(),
                format!("must be between {MIN_PERIOD} and {MAX_PERIOD} seconds"),
            ));
        }

        if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
            return Err(IdentityError::invalid(
                "digits",
                digits.to_string(),
                format!("must be between {MIN_DIGITS} and {MAX_DIGITS}"),
            ));
        }

        Ok(Self {
            algorithm,
            period,
            digits,
        })
    }

    /// Create parameters from their textual form. Absent values take the
    /// defaults (sha1, 30 seconds, 6 digits).
    ///
    /// # Errors
    ///
    /// Returns `Err` on unknown algorithm, non-numeric or non-canonical
    /// numbers, or out of range values.
    pub fn from_text(
        algorithm: Option<&str>,
        period: Option<&str>,
        digits: Option<&str>,
    ) -> Result<Self> {
        let algorithm = algorithm
            .map(TotpAlgorithm::from_str)
            .transpose()?
            .unwrap_or_default();
        let period = period
            .map(|p| parse_canonical::<u64>("period", p))
            .transpose()?
            .unwrap_or(DEFAULT_PERIOD);
        let digits = digits
            .map(|d| parse_canonical::<u32>("digits", d))
            .transpose()?
            .unwrap_or(DEFAULT_DIGITS);

        Self::new(algorithm, period, digits)
    }

    #[inline]
    pub fn algorithm(&self) -> TotpAlgorithm {
        self.algorithm
    }

    #[inline]
    pub fn period(&self) -> u64 {
        self.period
    }

    #[inline]
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Get time counter based on Unix epoch. Times before the epoch map
    /// to counter zero.
    fn time_counter(&self, timestamp: i64) -> u64 {
        u64::try_from(timestamp).unwrap_or(0) / self.period
    }

    /// Generate TOTP code for a specific time counter.
    pub fn generate_code(&self, secret: &[u8], counter: u64) -> Result<String> {
        let sum = self.algorithm.sign(secret, &counter.to_be_bytes())?;

        // Dynamic truncation (RFC 4226).
        let offset = (sum[sum.len() - 1] & 0x0f) as usize;
        let binary_code = ((sum[offset] as u32 & 0x7f) << 24)
            | ((sum[offset + 1] as u32) << 16)
            | ((sum[offset + 2] as u32) << 8)
            | (sum[offset + 3] as u32);

        let code_int = binary_code % 10u32.pow(self.digits);
        Ok(format!(
            "{:0>width$}",
            code_int,
            width = self.digits as usize
        ))
    }

    /// Generate the code valid at `timestamp` (Unix seconds).
    pub fn generate_at(&self, secret: &[u8], timestamp: i64) -> Result<String> {
        self.generate_code(secret, self.time_counter(timestamp))
    }

    /// Validate `code` at `timestamp`, tolerating one period of skew in
    /// both directions.
    ///
    /// The length check happens before any HMAC is computed.
    pub fn validate_at(&self, secret: &[u8], code: &str, timestamp: i64) -> bool {
        let code = code.trim();
        if code.len() != self.digits as usize
            || !(MIN_DIGITS as usize..=MAX_DIGITS as usize).contains(&code.len())
        {
            return false;
        }

        let counter = self.time_counter(timestamp);
        let candidates =
            [Some(counter), counter.checked_add(1), counter.checked_sub(1)];

        let mut valid = false;
        for counter in candidates.into_iter().flatten() {
            let Ok(expected) = self.generate_code(secret, counter) else {
                continue;
            };
            valid |= constant_time_eq::constant_time_eq(
                expected.as_bytes(),
                code.as_bytes(),
            );
        }

        valid
    }

    /// Spend one validation against a throwaway secret.
    ///
    /// Keeps the cost of an unknown account equal to a real check.
    pub fn burn(&self, code: &str, timestamp: i64) {
        let _ = self.validate_at(&[0; 20], code, timestamp);
    }

    /// Build the `otpauth://` URI an authenticator app enrolls from.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `issuer` or `account` produce an invalid URI.
    pub fn provisioning_uri(
        &self,
        secret: &[u8],
        issuer: &str,
        account: &str,
    ) -> Result<String> {
        let encoded =
            base32::encode(Alphabet::Rfc4648 { padding: false }, secret);
        let mut uri = Url::parse("otpauth://totp/").map_err(|err| {
            IdentityError::invalid("uri", "otpauth://totp/", err.to_string())
        })?;

        uri.set_path(&format!("{issuer}:{account}"));
        uri.query_pairs_mut()
            .append_pair("secret", &encoded)
            .append_pair("issuer", issuer)
            .append_pair("algorithm", &self.algorithm.as_str().to_uppercase())
            .append_pair("digits", &self.digits.to_string())
            .append_pair("period", &self.period.to_string());

        Ok(uri.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA1_SECRET: &[u8] = b"12345678901234567890";
    const SHA256_SECRET: &[u8] = b"12345678901234567890123456789012";
    const SHA512_SECRET: &[u8] =
        b"1234567890123456789012345678901234567890123456789012345678901234";

    fn params(algorithm: TotpAlgorithm, digits: u32) -> TotpParams {
        TotpParams::new(algorithm, 30, digits).unwrap()
    }

    #[test]
    fn test_rfc6238_vectors() {
        let cases = [
            (TotpAlgorithm::Sha1, SHA1_SECRET, 59, "94287082"),
            (TotpAlgorithm::Sha256, SHA256_SECRET, 59, "46119246"),
            (TotpAlgorithm::Sha512, SHA512_SECRET, 59, "90693936"),
            (TotpAlgorithm::Sha1, SHA1_SECRET, 1111111109, "07081804"),
            (TotpAlgorithm::Sha256, SHA256_SECRET, 1111111109, "68084774"),
            (TotpAlgorithm::Sha512, SHA512_SECRET, 1111111109, "25091201"),
            (TotpAlgorithm::Sha1, SHA1_SECRET, 20000000000, "65353130"),
        ];

        for (algorithm, secret, time, expected) in cases {
            let code = params(algorithm, 8).generate_at(secret, time).unwrap();
            assert_eq!(code, expected, "{algorithm} at {time}");
        }
    }

    #[test]
    fn test_six_digits_truncation() {
        let code = params(TotpAlgorithm::Sha1, 6)
            .generate_at(SHA1_SECRET, 1111111109)
            .unwrap();
        assert_eq!(code, "081804");
    }

    #[test]
    fn test_skew_window() {
        let totp = params(TotpAlgorithm::Sha1, 6);
        let t = 1_700_000_010;
        let code = totp.generate_at(SHA1_SECRET, t).unwrap();

        assert!(totp.validate_at(SHA1_SECRET, &code, t));
        assert!(totp.validate_at(SHA1_SECRET, &code, t - 30));
        assert!(totp.validate_at(SHA1_SECRET, &code, t + 30));
        assert!(!totp.validate_at(SHA1_SECRET, &code, t - 60));
        assert!(!totp.validate_at(SHA1_SECRET, &code, t + 60));
        assert!(totp.validate_at(SHA1_SECRET, &format!(" {code}\n"), t));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let totp = params(TotpAlgorithm::Sha1, 6);
        let code = totp.generate_at(SHA1_SECRET, 59).unwrap();
        assert!(!totp.validate_at(SHA1_SECRET, &code[..5], 59));
        assert!(!totp.validate_at(SHA1_SECRET, &format!("{code}0"), 59));
        assert!(!totp.validate_at(SHA1_SECRET, "", 59));
    }

    #[test]
    fn test_counter_zero() {
        let totp = params(TotpAlgorithm::Sha1, 6);
        let code = totp.generate_at(SHA1_SECRET, 0).unwrap();
        assert!(totp.validate_at(SHA1_SECRET, &code, 0));
        assert!(totp.validate_at(SHA1_SECRET, &code, -5));
    }

    #[test]
    fn test_from_text() {
        let totp = TotpParams::from_text(None, None, None).unwrap();
        assert_eq!(totp, TotpParams::default());

        let totp =
            TotpParams::from_text(Some("SHA256"), Some("60"), Some("8")).unwrap();
        assert_eq!(totp.algorithm(), TotpAlgorithm::Sha256);
        assert_eq!(totp.period(), 60);
        assert_eq!(totp.digits(), 8);

        for (algo, period, digits) in [
            (Some("md5"), None, None),
            (None, Some("30a"), None),
            (None, Some("030"), None),
            (None, Some("29"), None),
            (None, Some("301"), None),
            (None, None, Some("3")),
            (None, None, Some("9")),
            (None, None, Some("six")),
        ] {
            assert!(
                TotpParams::from_text(algo, period, digits).is_err(),
                "{algo:?} {period:?} {digits:?}"
            );
        }
    }

    #[test]
    fn test_provisioning_uri() {
        let uri = TotpParams::default()
            .provisioning_uri(b"Hello!\xde\xad\xbe\xef", "Acme", "jsmith")
            .unwrap();
        assert!(uri.starts_with("otpauth://totp/Acme:jsmith?"));
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXP"));
        assert!(uri.contains("algorithm=SHA1"));
        assert!(uri.contains("digits=6"));
        assert!(uri.contains("period=30"));
    }
}
