//! Attestation and assertion flows.
//!
//! [`AppAttestClient`] ties together the hardware provider, the remote trust server
//! and the key id store:
//!
//! - **Attestation** runs once per device. A hardware key is generated, bound to a
//!   server challenge, and submitted to the server. The key id is persisted only
//!   after the server accepts it, so a failure anywhere leaves the client unenrolled
//!   and the next call starts over with a new key.
//! - **Assertion** runs once per request. The payload is canonically encoded,
//!   hashed, and signed by the enrolled key together with a fresh challenge.

use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use crate::{
    error::{AppAttestError, AppAttestResult},
    key_store::KeyIdStore,
    logger::fingerprint,
    payload::Payload,
    server::AppAttestRemoteServer,
    service::AppAttestService,
};

type AttestationFlight = Arc<OnceCell<AppAttestResult<String>>>;

/// Output of a per-request signing ceremony.
///
/// Callers use these primitives to build whatever auth format the server expects.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AssertionResult {
    /// The enrolled key id that signed the payload.
    pub key_id: String,
    /// The assertion object produced by the hardware.
    pub assertion: Vec<u8>,
    /// The challenge bound into this assertion. Never reused.
    pub challenge: String,
    /// The canonical payload bytes that were hashed and signed.
    pub payload: Vec<u8>,
}

/// Client driving App Attest enrollment and per-request assertions.
#[derive(uniffi::Object)]
pub struct AppAttestClient {
    service: Arc<dyn AppAttestService>,
    remote_server: Arc<dyn AppAttestRemoteServer>,
    key_store: Arc<dyn KeyIdStore>,
    attestation_flight: Mutex<Option<AttestationFlight>>,
}

#[uniffi::export(async_runtime = "tokio")]
impl AppAttestClient {
    /// Creates a client.
    ///
    /// # Errors
    /// Returns [`AppAttestError::UnsupportedHardware`] if the device cannot attest keys.
    #[uniffi::constructor]
    pub fn new(
        service: Arc<dyn AppAttestService>,
        remote_server: Arc<dyn AppAttestRemoteServer>,
        key_store: Arc<dyn KeyIdStore>,
    ) -> AppAttestResult<Self> {
        if !service.is_supported() {
            return Err(AppAttestError::UnsupportedHardware);
        }

        Ok(Self {
            service,
            remote_server,
            key_store,
            attestation_flight: Mutex::new(None),
        })
    }

    /// Establishes device trust with the server and returns the enrolled key id.
    ///
    /// Returns the stored key id immediately when the device is already enrolled.
    /// Concurrent callers share a single enrollment and all observe its outcome.
    ///
    /// # Errors
    /// Any failure from the hardware provider, the server or the key id store. The key
    /// id is not persisted unless the server accepted the attestation.
    pub async fn perform_attestation(&self) -> AppAttestResult<String> {
        if let Some(key_id) = self.key_store.load_key_id() {
            return Ok(key_id);
        }

        let flight = self
            .attestation_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(Default::default)
            .clone();

        let outcome = flight.get_or_init(|| self.enroll()).await.clone();

        // Let the next call re-evaluate state instead of replaying this outcome.
        {
            let mut slot = self
                .attestation_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &flight))
            {
                *slot = None;
            }
        }

        outcome
    }

    /// Signs a JSON object payload with the enrolled key.
    ///
    /// See [`AppAttestClient::perform_assertion`].
    ///
    /// # Errors
    /// Fails like [`AppAttestClient::perform_assertion`], and with
    /// [`AppAttestError::InvalidPayload`] or [`AppAttestError::SerializationError`] if
    /// `payload_json` is not a JSON object.
    pub async fn perform_assertion_with_json(
        &self,
        payload_json: String,
    ) -> AppAttestResult<AssertionResult> {
        let payload = Payload::from_json_slice(payload_json.as_bytes())?;
        self.perform_assertion(&payload).await
    }

    /// Signs a JSON object payload and submits the assertion to the server.
    ///
    /// # Errors
    /// See [`AppAttestClient::perform_assertion_and_send`].
    pub async fn perform_assertion_and_send_with_json(
        &self,
        payload_json: String,
    ) -> AppAttestResult<()> {
        let payload = Payload::from_json_slice(payload_json.as_bytes())?;
        self.perform_assertion_and_send(&payload).await
    }

    /// Clears the stored key id, forcing a new enrollment on the next attestation.
    ///
    /// Local only: the server keeps its record of the abandoned key.
    ///
    /// # Errors
    /// Returns an error if the key id store fails to clear.
    pub fn reset_key(&self) -> AppAttestResult<()> {
        log::info!("[AppAttestClient] resetting enrolled key");
        self.key_store.clear_key_id()
    }

    /// Returns the enrolled key id, if any.
    #[must_use]
    pub fn current_key_id(&self) -> Option<String> {
        self.key_store.load_key_id()
    }
}

impl AppAttestClient {
    /// Signs `payload` with the enrolled key.
    ///
    /// Fetches a fresh challenge, hashes the canonical encoding of `payload` and asks
    /// the hardware to sign the hash. Persisted state is not touched.
    ///
    /// # Errors
    /// - [`AppAttestError::MissingKeyId`] if no key is enrolled. No request is made.
    /// - Any failure from the server, the payload encoder or the hardware provider.
    pub async fn perform_assertion(&self, payload: &Payload) -> AppAttestResult<AssertionResult> {
        let key_id = self
            .key_store
            .load_key_id()
            .ok_or(AppAttestError::MissingKeyId)?;

        let challenge = self.remote_server.fetch_challenge(key_id.clone()).await?;

        let canonical = payload.canonical_bytes()?;
        let client_data_hash = Sha256::digest(&canonical).to_vec();
        let assertion = self
            .service
            .generate_assertion(key_id.clone(), client_data_hash)
            .await?;

        log::debug!(
            "[AppAttestClient] generated assertion over {} payload bytes",
            canonical.len()
        );

        Ok(AssertionResult {
            key_id,
            assertion,
            challenge,
            payload: canonical,
        })
    }

    /// Signs `payload` and submits the assertion with the canonical payload to the
    /// server's per-request endpoint.
    ///
    /// # Errors
    /// Fails like [`AppAttestClient::perform_assertion`], or if the server rejects
    /// the assertion.
    pub async fn perform_assertion_and_send(&self, payload: &Payload) -> AppAttestResult<()> {
        let AssertionResult {
            key_id,
            assertion,
            challenge,
            payload,
        } = self.perform_assertion(payload).await?;

        self.remote_server
            .send_assertion(key_id, assertion, payload, challenge)
            .await
    }

    async fn enroll(&self) -> AppAttestResult<String> {
        // A concurrent flight may have finished between the caller's check and now.
        if let Some(key_id) = self.key_store.load_key_id() {
            return Ok(key_id);
        }

        log::info!("[AppAttestClient] enrolling a new hardware key");

        let key_id = self.service.generate_key().await?;
        if key_id.is_empty() {
            return Err(AppAttestError::InvalidKeyId {
                reason: "hardware returned an empty key id".to_string(),
            });
        }

        let challenge = self.remote_server.fetch_challenge(key_id.clone()).await?;
        if challenge.is_empty() {
            return Err(AppAttestError::InvalidChallenge {
                reason: "challenge is empty".to_string(),
            });
        }

        // The hardware expects the hash of the client data, not the raw challenge.
        let client_data_hash = Sha256::digest(challenge.as_bytes()).to_vec();
        let attestation = self
            .service
            .attest_key(key_id.clone(), client_data_hash)
            .await?;

        self.remote_server
            .send_attestation(key_id.clone(), attestation, challenge)
            .await?;

        if let Err(e) = self.key_store.save_key_id(key_id.clone()) {
            log::warn!(
                "[AppAttestClient] server accepted the key but it could not be stored; \
                 the next attestation enrolls a new key: {e}"
            );
            return Err(e);
        }

        log::info!(
            "[AppAttestClient] enrollment complete for key {}",
            fingerprint(&key_id)
        );
        Ok(key_id)
    }
}
