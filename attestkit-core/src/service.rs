//! Hardware attestation capability supplied by the host platform.
//!
//! On iOS this is backed by `DCAppAttestService`. The private keys never leave the
//! secure hardware; the core only ever sees opaque key ids and the signed objects.

use crate::error::AppAttestResult;

/// Platform API generating hardware-backed keys and signing with them.
///
/// Implementations must not fall back to software keys: the server relies on the
/// manufacturer-signed attestation to trust the key.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait AppAttestService: Send + Sync {
    /// Whether the device offers hardware attestation at all.
    fn is_supported(&self) -> bool;

    /// Generates a new hardware-backed key pair and returns its key id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppAttestError::HardwareError`] if key generation fails.
    async fn generate_key(&self) -> AppAttestResult<String>;

    /// Produces an attestation object binding the key to `client_data_hash`.
    ///
    /// `client_data_hash` is the SHA-256 of the server challenge.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppAttestError::HardwareError`] if attestation fails.
    async fn attest_key(
        &self,
        key_id: String,
        client_data_hash: Vec<u8>,
    ) -> AppAttestResult<Vec<u8>>;

    /// Produces an assertion object: a signature over `client_data_hash` with the key.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppAttestError::HardwareError`] if signing fails.
    async fn generate_assertion(
        &self,
        key_id: String,
        client_data_hash: Vec<u8>,
    ) -> AppAttestResult<Vec<u8>>;
}
