//! Bearer envelope carrying attestation and assertion metadata.
//!
//! The envelope is a JWT-shaped token (`header.claims.signature`, each segment
//! base64url without padding). It is only a structured container: the server reads
//! the claims without checking the signature, and integrity comes from the
//! hardware-signed attestation or assertion object carried inside.
//!
//! The HS256 signature is computed with a fresh random secret that is discarded
//! immediately. It exists because the server's token parser expects three segments,
//! and must never be treated as a security control.

use std::collections::BTreeMap;

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use crate::error::{AppAttestError, AppAttestResult};

/// Claim carrying the key id.
pub const KEY_ID_CLAIM: &str = "key_id_b64";
/// Claim carrying the base64 encoded challenge.
pub const CHALLENGE_CLAIM: &str = "challenge_b64";
/// Claim carrying the app bundle identifier.
pub const BUNDLE_ID_CLAIM: &str = "bundle_id";
/// Object claim used when enrolling a key.
pub const ATTESTATION_OBJECT_CLAIM: &str = "attestation_obj_b64";
/// Object claim used when signing a request.
pub const ASSERTION_OBJECT_CLAIM: &str = "assertion_obj_b64";

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

type HmacSha256 = Hmac<Sha256>;

/// The claims shared by every envelope sent to the trust server.
#[derive(Debug, Clone)]
pub struct Envelope<'a> {
    key_id: &'a str,
    challenge: &'a str,
    object_claim: &'a str,
    object: &'a [u8],
    bundle_id: &'a str,
}

impl<'a> Envelope<'a> {
    /// Creates an envelope. `object_claim` names the claim the `object` bytes are
    /// stored under, usually [`ATTESTATION_OBJECT_CLAIM`] or [`ASSERTION_OBJECT_CLAIM`].
    #[must_use]
    pub const fn new(
        key_id: &'a str,
        challenge: &'a str,
        object_claim: &'a str,
        object: &'a [u8],
        bundle_id: &'a str,
    ) -> Self {
        Self {
            key_id,
            challenge,
            object_claim,
            object,
            bundle_id,
        }
    }

    /// Encodes the envelope as a bearer token.
    ///
    /// # Errors
    /// - [`AppAttestError::InvalidChallenge`] if the challenge is empty.
    /// - [`AppAttestError::SerializationError`] if the claims cannot be serialized.
    pub fn encode(&self) -> AppAttestResult<String> {
        if self.challenge.is_empty() {
            return Err(AppAttestError::InvalidChallenge {
                reason: "challenge is empty".to_string(),
            });
        }

        let claims = BTreeMap::from([
            (KEY_ID_CLAIM, self.key_id.to_string()),
            (CHALLENGE_CLAIM, STANDARD.encode(self.challenge.as_bytes())),
            (self.object_claim, STANDARD.encode(self.object)),
            (BUNDLE_ID_CLAIM, self.bundle_id.to_string()),
        ]);
        let claims = serde_json::to_vec(&claims)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let signature = throwaway_signature(signing_input.as_bytes())?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}

fn throwaway_signature(message: &[u8]) -> AppAttestResult<Vec<u8>> {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);

    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|e| {
        AppAttestError::SerializationError {
            error: format!("failed to key envelope signature: {e}"),
        }
    })?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
pub(crate) mod test_support {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use serde_json::Value;

    /// Decodes the claims segment of an envelope token.
    pub fn decode_claims(token: &str) -> Value {
        let claims = token.split('.').nth(1).expect("claims segment");
        let bytes = URL_SAFE_NO_PAD.decode(claims).expect("base64url claims");
        serde_json::from_slice(&bytes).expect("json claims")
    }
}
