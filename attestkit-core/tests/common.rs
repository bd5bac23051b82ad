//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attestkit_core::{
    AppAttestClient, AppAttestError, AppAttestRemoteServer, AppAttestResult, AppAttestService,
    InMemoryKeyIdStore,
};

/// Prefix the fake hardware puts in front of the hash it attested.
pub const ATTESTATION_PREFIX: &[u8] = b"attestation:";
/// Prefix the fake hardware puts in front of the hash it signed.
pub const ASSERTION_PREFIX: &[u8] = b"assertion:";

/// Fake secure hardware.
///
/// Key ids are `key-0`, `key-1`, ... in generation order. Attestation and assertion
/// objects are the client data hash behind a fixed prefix, so tests can check what
/// the hardware was asked to sign.
#[derive(Default)]
pub struct FakeHardware {
    /// Reports the device as lacking attestation support.
    pub unsupported: bool,
    /// Makes `attest_key` fail with a hardware error.
    pub fail_attest: AtomicBool,
    /// Makes `generate_assertion` fail with a hardware error.
    pub fail_assert: AtomicBool,
    /// Number of keys generated so far.
    pub generated: AtomicUsize,
    /// Hashes passed to `attest_key`.
    pub attested_hashes: Mutex<Vec<Vec<u8>>>,
    /// Hashes passed to `generate_assertion`.
    pub asserted_hashes: Mutex<Vec<Vec<u8>>>,
}

impl FakeHardware {
    /// Number of keys generated so far.
    pub fn generated_keys(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AppAttestService for FakeHardware {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn generate_key(&self) -> AppAttestResult<String> {
        let n = self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(format!("key-{n}"))
    }

    async fn attest_key(
        &self,
        _key_id: String,
        client_data_hash: Vec<u8>,
    ) -> AppAttestResult<Vec<u8>> {
        if self.fail_attest.load(Ordering::SeqCst) {
            return Err(AppAttestError::HardwareError {
                error: "attestation refused".to_string(),
            });
        }
        self.attested_hashes
            .lock()
            .unwrap()
            .push(client_data_hash.clone());
        Ok([ATTESTATION_PREFIX, &client_data_hash[..]].concat())
    }

    async fn generate_assertion(
        &self,
        _key_id: String,
        client_data_hash: Vec<u8>,
    ) -> AppAttestResult<Vec<u8>> {
        if self.fail_assert.load(Ordering::SeqCst) {
            return Err(AppAttestError::HardwareError {
                error: "assertion refused".to_string(),
            });
        }
        self.asserted_hashes
            .lock()
            .unwrap()
            .push(client_data_hash.clone());
        Ok([ASSERTION_PREFIX, &client_data_hash[..]].concat())
    }
}

/// An attestation received by [`FakeTrustServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedAttestation {
    /// Key id the attestation was sent for.
    pub key_id: String,
    /// Attestation object bytes.
    pub attestation: Vec<u8>,
    /// Challenge bound into the attestation.
    pub challenge: String,
}

/// An assertion received by [`FakeTrustServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedAssertion {
    /// Key id that signed the assertion.
    pub key_id: String,
    /// Assertion object bytes.
    pub assertion: Vec<u8>,
    /// Payload bytes sent alongside.
    pub payload: Vec<u8>,
    /// Challenge bound into the assertion.
    pub challenge: String,
}

/// In-process trust server.
///
/// Hands out `challenge-0`, `challenge-1`, ... and records what it receives.
/// Failures can be injected per endpoint.
#[derive(Default)]
pub struct FakeTrustServer {
    /// Number of challenges issued so far.
    pub issued: AtomicUsize,
    /// Error returned by `fetch_challenge`, if set.
    pub challenge_error: Mutex<Option<AppAttestError>>,
    /// Error returned by `send_attestation`, if set.
    pub attestation_error: Mutex<Option<AppAttestError>>,
    /// Delay applied before answering `send_attestation`.
    pub enrollment_delay: Option<Duration>,
    /// Attestations accepted so far.
    pub attestations: Mutex<Vec<ReceivedAttestation>>,
    /// Assertions accepted so far.
    pub assertions: Mutex<Vec<ReceivedAssertion>>,
}

impl FakeTrustServer {
    /// Creates a server that answers attestations after `delay`.
    pub fn with_enrollment_delay(delay: Duration) -> Self {
        Self {
            enrollment_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Number of challenges issued so far.
    pub fn challenges_issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Sets or clears the error returned by `fetch_challenge`.
    pub fn fail_challenges_with(&self, error: Option<AppAttestError>) {
        *self.challenge_error.lock().unwrap() = error;
    }

    /// Sets or clears the error returned by `send_attestation`.
    pub fn fail_attestations_with(&self, error: Option<AppAttestError>) {
        *self.attestation_error.lock().unwrap() = error;
    }

    /// Snapshot of the accepted attestations.
    pub fn attestations(&self) -> Vec<ReceivedAttestation> {
        self.attestations.lock().unwrap().clone()
    }

    /// Snapshot of the accepted assertions.
    pub fn assertions(&self) -> Vec<ReceivedAssertion> {
        self.assertions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AppAttestRemoteServer for FakeTrustServer {
    async fn fetch_challenge(&self, _key_id: String) -> AppAttestResult<String> {
        if let Some(error) = self.challenge_error.lock().unwrap().clone() {
            return Err(error);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(format!("challenge-{n}"))
    }

    async fn send_attestation(
        &self,
        key_id: String,
        attestation_object: Vec<u8>,
        challenge: String,
    ) -> AppAttestResult<()> {
        if let Some(delay) = self.enrollment_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.attestation_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.attestations.lock().unwrap().push(ReceivedAttestation {
            key_id,
            attestation: attestation_object,
            challenge,
        });
        Ok(())
    }

    async fn send_assertion(
        &self,
        key_id: String,
        assertion_object: Vec<u8>,
        payload: Vec<u8>,
        challenge: String,
    ) -> AppAttestResult<()> {
        self.assertions.lock().unwrap().push(ReceivedAssertion {
            key_id,
            assertion: assertion_object,
            payload,
            challenge,
        });
        Ok(())
    }
}

/// A client wired to fresh fakes, with handles to each of them.
pub struct Harness {
    /// The fake hardware provider.
    pub hardware: Arc<FakeHardware>,
    /// The fake trust server.
    pub server: Arc<FakeTrustServer>,
    /// The key id store.
    pub store: Arc<InMemoryKeyIdStore>,
    /// The client under test.
    pub client: Arc<AppAttestClient>,
}

impl Harness {
    /// Creates an unenrolled harness.
    pub fn new() -> Self {
        Self::with_parts(FakeTrustServer::default(), InMemoryKeyIdStore::new())
    }

    /// Creates a harness whose store already holds `key_id`.
    pub fn enrolled(key_id: &str) -> Self {
        Self::with_parts(
            FakeTrustServer::default(),
            InMemoryKeyIdStore::with_key_id(key_id.to_string()),
        )
    }

    /// Creates a harness from a custom server and store.
    pub fn with_parts(server: FakeTrustServer, store: InMemoryKeyIdStore) -> Self {
        let hardware = Arc::new(FakeHardware::default());
        let server = Arc::new(server);
        let store = Arc::new(store);
        let client = Arc::new(
            AppAttestClient::new(hardware.clone(), server.clone(), store.clone()).unwrap(),
        );
        Self {
            hardware,
            server,
            store,
            client,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
