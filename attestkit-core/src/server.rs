//! Remote trust server contract and its HTTP implementation.
//!
//! The server exposes three interactions:
//! 1. a challenge endpoint issuing single-use nonces scoped to a key id,
//! 2. an attestation endpoint establishing trust in a key once, after checking the
//!    manufacturer certificate chain,
//! 3. a per-request endpoint verifying assertions against the stored public key.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::{
    config::{Endpoints, ServerConfig},
    envelope::{Envelope, ASSERTION_OBJECT_CLAIM, ATTESTATION_OBJECT_CLAIM},
    error::{AppAttestError, AppAttestResult},
    http_request::Request,
};

/// Query parameter carrying the key id on challenge requests.
pub const KEY_ID_QUERY_PARAM: &str = "key_id_b64";
/// Header selecting the server-to-server auth scheme.
pub const SERVICE_TYPE_HEADER: &str = "service-type";
/// Value of [`SERVICE_TYPE_HEADER`] for App Attest requests.
pub const SERVICE_TYPE_VALUE: &str = "s2s";
/// Header routing the request to App Attest verification.
pub const USE_APP_ATTEST_HEADER: &str = "use-app-attest";

pub(crate) const BEARER_PREFIX: &str = "Bearer ";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Server-side half of the attestation and assertion flows.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait AppAttestRemoteServer: Send + Sync {
    /// Fetches a fresh single-use challenge scoped to `key_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot issue a challenge.
    async fn fetch_challenge(&self, key_id: String) -> AppAttestResult<String>;

    /// Submits an attestation object for one-time trust establishment.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the attestation.
    async fn send_attestation(
        &self,
        key_id: String,
        attestation_object: Vec<u8>,
        challenge: String,
    ) -> AppAttestResult<()>;

    /// Submits an assertion together with the payload it signs.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the assertion.
    async fn send_assertion(
        &self,
        key_id: String,
        assertion_object: Vec<u8>,
        payload: Vec<u8>,
        challenge: String,
    ) -> AppAttestResult<()>;
}

#[derive(Debug, Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

/// HTTP client for the LLM proxy trust server.
pub struct MlpaServer {
    bundle_id: String,
    endpoints: Endpoints,
    request: Request,
}

impl MlpaServer {
    /// Creates a client for the server described by `config`.
    ///
    /// # Errors
    /// Returns [`AppAttestError::InvalidEndpointConfiguration`] if an endpoint cannot be
    /// resolved.
    pub fn new(config: &ServerConfig) -> AppAttestResult<Self> {
        Ok(Self {
            bundle_id: config.bundle_id.clone(),
            endpoints: config.endpoints()?,
            request: Request::new(config.timeout()),
        })
    }

    /// The resolved endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Encodes the bearer envelope for a request to this server.
    fn bearer(
        &self,
        key_id: &str,
        challenge: &str,
        object_claim: &str,
        object: &[u8],
    ) -> AppAttestResult<String> {
        let token =
            Envelope::new(key_id, challenge, object_claim, object, &self.bundle_id).encode()?;
        Ok(format!("{BEARER_PREFIX}{token}"))
    }
}

#[async_trait::async_trait]
impl AppAttestRemoteServer for MlpaServer {
    async fn fetch_challenge(&self, key_id: String) -> AppAttestResult<String> {
        if key_id.is_empty() {
            return Err(AppAttestError::InvalidKeyId {
                reason: "key id is empty".to_string(),
            });
        }

        // Base64 key ids contain `+`, `/` and `=`, which the form encoder escapes.
        let mut url = self.endpoints.challenge.clone();
        url.query_pairs_mut()
            .append_pair(KEY_ID_QUERY_PARAM, &key_id);

        let response = self.request.handle(self.request.get(url)).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| AppAttestError::NetworkError {
                url: self.endpoints.challenge.to_string(),
                error: format!("failed to read challenge response: {e}"),
            })?;
        let ChallengeResponse { challenge } =
            serde_json::from_slice(&body).map_err(|e| AppAttestError::SerializationError {
                error: format!("[MlpaServer] failed to parse challenge response: {e}"),
            })?;

        if challenge.is_empty() {
            return Err(AppAttestError::InvalidChallenge {
                reason: "server returned an empty challenge".to_string(),
            });
        }

        log::debug!("[MlpaServer] received challenge");
        Ok(challenge)
    }

    async fn send_attestation(
        &self,
        key_id: String,
        attestation_object: Vec<u8>,
        challenge: String,
    ) -> AppAttestResult<()> {
        let bearer = self.bearer(
            &key_id,
            &challenge,
            ATTESTATION_OBJECT_CLAIM,
            &attestation_object,
        )?;

        let request_builder = self
            .request
            .post(self.endpoints.attest.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(AUTHORIZATION, bearer);
        self.request.handle(request_builder).await?;

        log::debug!("[MlpaServer] attestation accepted");
        Ok(())
    }

    async fn send_assertion(
        &self,
        key_id: String,
        assertion_object: Vec<u8>,
        payload: Vec<u8>,
        challenge: String,
    ) -> AppAttestResult<()> {
        let bearer = self.bearer(&key_id, &challenge, ASSERTION_OBJECT_CLAIM, &assertion_object)?;

        let request_builder = self
            .request
            .post(self.endpoints.completions.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .header(AUTHORIZATION, bearer)
            .header(SERVICE_TYPE_HEADER, SERVICE_TYPE_VALUE)
            .header(USE_APP_ATTEST_HEADER, "true")
            .body(payload);
        self.request.handle(request_builder).await?;

        log::debug!("[MlpaServer] assertion accepted");
        Ok(())
    }
}

/// Creates the HTTP trust server client for `config`.
///
/// The returned object is meant to be handed to `AppAttestClient`.
///
/// # Errors
/// Returns [`AppAttestError::InvalidEndpointConfiguration`] if an endpoint cannot be
/// resolved.
#[uniffi::export]
pub fn mlpa_server(config: ServerConfig) -> AppAttestResult<Arc<dyn AppAttestRemoteServer>> {
    Ok(Arc::new(MlpaServer::new(&config)?))
}
