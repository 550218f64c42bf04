//! WebAuthn registration payload parsing.
//!
//! The payload is the base64 JSON rendering of a registration ceremony as
//! produced by the browser helper. Only the fields needed to later check an
//! assertion are kept: credential id, COSE key parameters and curve point.

use std::fmt;
use std::str::FromStr;

use base64ct::{Base64, Encoding};
use p256::elliptic_curve::sec1::FromEncodedPoint;
use p256::{EncodedPoint, FieldBytes, PublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};

// See https://www.iana.org/assignments/cose/cose.xhtml
const COSE_KEY_TYPE_EC2: i64 = 2;
const COSE_ALG_ES256: i64 = -7;
const COSE_CURVE_P256: i64 = 1;
const COORDINATE_LENGTH: usize = 32;

const CREDENTIAL_TYPE: &str = "public-key";

/// Authenticator transport hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Usb,
    Nfc,
    Ble,
    Internal,
    Hybrid,
}

impl FromStr for Transport {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "usb" => Ok(Self::Usb),
            "nfc" => Ok(Self::Nfc),
            "ble" => Ok(Self::Ble),
            "internal" => Ok(Self::Internal),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(IdentityError::invalid(
                "transport",
                other,
                "must be usb, nfc, ble, internal or hybrid",
            )),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Usb => "usb",
            Self::Nfc => "nfc",
            Self::Ble => "ble",
            Self::Internal => "internal",
            Self::Hybrid => "hybrid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationPayload {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    transports: Vec<String>,
    attestation_object: Option<AttestationObject>,
    device: Option<DevicePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttestationObject {
    auth_data: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    #[serde(default)]
    signature_counter: u32,
    credential_data: Option<CredentialData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialData {
    #[serde(default)]
    credential_id: String,
    public_key: Option<CoseKey>,
}

/// COSE key as flattened by the browser helper.
#[derive(Debug, Deserialize)]
struct CoseKey {
    key_type: Option<i64>,
    algorithm: Option<i64>,
    curve_type: Option<i64>,
    curve_x: Option<String>,
    curve_y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DevicePayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    vendor: String,
    #[serde(default, rename = "type")]
    kind: String,
}

/// Device that performed the registration, as reported by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaDevice {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

/// Key parameters of an accepted WebAuthn credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct U2fParams {
    pub credential_id: String,
    /// COSE key type, always `ec2`.
    pub key_type: String,
    /// COSE algorithm, always `es256`.
    pub key_algorithm: String,
    /// COSE curve, always `p256`.
    pub curve: String,
    /// Base64 affine X coordinate.
    pub curve_x: String,
    /// Base64 affine Y coordinate.
    pub curve_y: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<Transport>,
    #[serde(default)]
    pub signature_counter: u32,
}

/// Result of a parsed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub params: U2fParams,
    pub device: Option<MfaDevice>,
}

fn missing(part: &'static str) -> IdentityError {
    IdentityError::invalid("webauthn_register", part, "missing from payload")
}

fn decode_coordinate(field: &'static str, value: &str) -> Result<Vec<u8>> {
    let bytes = Base64::decode_vec(value).map_err(|_| {
        IdentityError::invalid(field, value, "malformed base64 coordinate")
    })?;
    if bytes.len() != COORDINATE_LENGTH {
        return Err(IdentityError::invalid(
            field,
            value,
            format!("coordinate must be {COORDINATE_LENGTH} bytes"),
        ));
    }
    Ok(bytes)
}

/// Parse a base64 encoded registration payload.
///
/// # Errors
///
/// Returns a validation error for malformed payloads or missing parts and
/// [`IdentityError::Unsupported`] for any key other than EC2/ES256/P-256.
pub fn parse_registration(encoded: &str) -> Result<Registration> {
    let decoded = Base64::decode_vec(encoded.trim()).map_err(|_| {
        IdentityError::invalid(
            "webauthn_register",
            "payload",
            "malformed base64 webauthn register",
        )
    })?;
    let payload: RegistrationPayload = serde_json::from_slice(&decoded)
        .map_err(|err| {
            IdentityError::invalid(
                "webauthn_register",
                "payload",
                format!("malformed json webauthn register: {err}"),
            )
        })?;

    let transports = payload
        .transports
        .iter()
        .map(|t| t.parse::<Transport>())
        .collect::<Result<Vec<_>>>()?;

    let auth_data = payload
        .attestation_object
        .ok_or_else(|| missing("attestationObject"))?
        .auth_data
        .ok_or_else(|| missing("authData"))?;
    let credential = auth_data
        .credential_data
        .ok_or_else(|| missing("credentialData"))?;
    let key = credential
        .public_key
        .ok_or_else(|| missing("publicKey"))?;

    let credential_id = if payload.id.is_empty() {
        credential.credential_id
    } else {
        payload.id
    };
    if credential_id.is_empty() {
        return Err(missing("id"));
    }
    if payload.kind != CREDENTIAL_TYPE {
        return Err(IdentityError::invalid(
            "type",
            payload.kind,
            "credential type must be public-key",
        ));
    }

    match key.key_type {
        Some(COSE_KEY_TYPE_EC2) => {},
        Some(other) => return Err(IdentityError::unsupported("key_type", other)),
        None => return Err(missing("key_type")),
    }
    match key.algorithm {
        Some(COSE_ALG_ES256) => {},
        Some(other) => return Err(IdentityError::unsupported("algorithm", other)),
        None => return Err(missing("algorithm")),
    }
    match key.curve_type {
        Some(COSE_CURVE_P256) => {},
        Some(other) => return Err(IdentityError::unsupported("curve_type", other)),
        None => return Err(missing("curve_type")),
    }

    let curve_x = key.curve_x.ok_or_else(|| missing("curve_x"))?;
    let curve_y = key.curve_y.ok_or_else(|| missing("curve_y"))?;
    let x = decode_coordinate("curve_x", &curve_x)?;
    let y = decode_coordinate("curve_y", &curve_y)?;

    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(&x),
        FieldBytes::from_slice(&y),
        false,
    );
    if Option::<PublicKey>::from(PublicKey::from_encoded_point(&point)).is_none() {
        return Err(IdentityError::invalid(
            "publicKey",
            curve_x,
            "point is not on the P-256 curve",
        ));
    }

    let device = payload.device.map(|d| MfaDevice {
        name: d.name,
        vendor: d.vendor,
        kind: d.kind,
    });

    Ok(Registration {
        params: U2fParams {
            credential_id,
            key_type: "ec2".into(),
            key_algorithm: "es256".into(),
            curve: "p256".into(),
            curve_x,
            curve_y,
            transports,
            signature_counter: auth_data.signature_counter,
        },
        device,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::error::ErrorKind;

    pub(crate) const CURVE_X: &str = "ebU8qvYMvcHxXLT58Gdx6KN1LVWNlZo65fJ2q3SsBrA=";
    pub(crate) const CURVE_Y: &str = "YL0wsPaI7QeBleyEXRNtZjAOOeFbJRz1x6iVYRLxDYM=";

    pub(crate) fn registration_json() -> Value {
        json!({
            "id": "sStGN074SAU0",
            "type": "public-key",
            "transports": ["usb", "nfc"],
            "success": true,
            "attestationObject": {
                "fmt": "packed",
                "authData": {
                    "rpIdHash": "49960de5880e8c687434170f6476605b8fe4aeb9a28632c7995cf3ba831d9763",
                    "signatureCounter": 3,
                    "credentialData": {
                        "aaguid": "7ogoeXIcSROXdT38zpcHKg==",
                        "credentialId": "sStGN074SAU0",
                        "publicKey": {
                            "key_type": 2,
                            "algorithm": -7,
                            "curve_type": 1,
                            "curve_x": CURVE_X,
                            "curve_y": CURVE_Y
                        }
                    }
                }
            },
            "clientData": {
                "type": "webauthn.create",
                "challenge": "AAALAAAAAABeAAAADgALAAAAANcAAAbahQAPAACyAAAAAA",
                "origin": "https://localhost:8443"
            },
            "device": { "name": "Unknown device", "type": "unknown" }
        })
    }

    pub(crate) fn encode(value: &Value) -> String {
        Base64::encode_string(value.to_string().as_bytes())
    }

    #[test]
    fn test_valid_registration() {
        let reg = parse_registration(&encode(&registration_json())).unwrap();
        assert_eq!(reg.params.credential_id, "sStGN074SAU0");
        assert_eq!(reg.params.key_type, "ec2");
        assert_eq!(reg.params.key_algorithm, "es256");
        assert_eq!(reg.params.curve, "p256");
        assert_eq!(reg.params.curve_x, CURVE_X);
        assert_eq!(reg.params.curve_y, CURVE_Y);
        assert_eq!(reg.params.transports, vec![Transport::Usb, Transport::Nfc]);
        assert_eq!(reg.params.signature_counter, 3);
        assert_eq!(reg.device.unwrap().name, "Unknown device");
    }

    #[test]
    fn test_malformed_payload() {
        assert!(parse_registration("not base64!").is_err());
        assert!(parse_registration(&Base64::encode_string(b"{nope")).is_err());
    }

    #[test]
    fn test_requires_type_and_transports() {
        let mut value = registration_json();
        value["type"] = json!("password");
        assert!(parse_registration(&encode(&value)).is_err());

        let mut value = registration_json();
        value["transports"] = json!(["usb", "carrier-pigeon"]);
        let err = parse_registration(&encode(&value)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_missing_parts() {
        let mut value = registration_json();
        value["attestationObject"]["authData"]["credentialData"]
            .as_object_mut()
            .unwrap()
            .remove("publicKey");
        assert!(parse_registration(&encode(&value)).is_err());

        let mut value = registration_json();
        value.as_object_mut().unwrap().remove("attestationObject");
        assert!(parse_registration(&encode(&value)).is_err());
    }

    #[test]
    fn test_unsupported_parameters() {
        let key = "/attestationObject/authData/credentialData/publicKey";
        for (field, bad) in
            [("key_type", json!(3)), ("algorithm", json!(-257)), ("curve_type", json!(2))]
        {
            let mut value = registration_json();
            value.pointer_mut(key).unwrap()[field] = bad;
            let err = parse_registration(&encode(&value)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unsupported, "{field}");
        }
    }

    #[test]
    fn test_point_off_curve() {
        let mut value = registration_json();
        value["attestationObject"]["authData"]["credentialData"]["publicKey"]
            ["curve_y"] = json!(CURVE_X);
        let err = parse_registration(&encode(&value)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
