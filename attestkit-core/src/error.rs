use thiserror::Error;

/// Result type for App Attest operations.
pub type AppAttestResult<T> = Result<T, AppAttestError>;

/// Error outputs from `AttestKit`
///
/// Errors are `Clone` so the outcome of a single attestation flight can be handed
/// to every caller that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum AppAttestError {
    /// The device has no hardware attestation capability.
    #[error("unsupported_hardware")]
    UnsupportedHardware,

    /// The challenge cannot be encoded for hashing or transport.
    #[error("invalid_challenge: {reason}")]
    InvalidChallenge {
        /// Why the challenge was rejected.
        reason: String,
    },

    /// An assertion was requested before any key id was enrolled.
    #[error("missing_key_id")]
    MissingKeyId,

    /// The key id cannot be used for a request.
    #[error("invalid_key_id: {reason}")]
    InvalidKeyId {
        /// Why the key id was rejected.
        reason: String,
    },

    /// A configured endpoint cannot be turned into a valid URL.
    #[error("invalid_endpoint_configuration: {endpoint}: {reason}")]
    InvalidEndpointConfiguration {
        /// Name of the misconfigured endpoint.
        endpoint: String,
        /// Why the endpoint was rejected.
        reason: String,
    },

    /// The remote trust server answered with a non-2xx status.
    #[error("server_error: {status}: {body}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Best-effort UTF-8 decode of the response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("network_error: {url}: {error}")]
    NetworkError {
        /// The URL of the failed request.
        url: String,
        /// Transport error details.
        error: String,
    },

    /// The key id store failed to load, save or clear.
    #[error("storage_error: {error}")]
    StorageError {
        /// Error reported by the store.
        error: String,
    },

    /// The hardware attestation provider failed to generate, attest or sign.
    #[error("hardware_error: {error}")]
    HardwareError {
        /// Error reported by the provider.
        error: String,
    },

    /// The payload cannot be encoded canonically.
    #[error("invalid_payload: {reason}")]
    InvalidPayload {
        /// Why the payload was rejected.
        reason: String,
    },

    /// Unexpected error serializing or deserializing information.
    #[error("serialization_error: {error}")]
    SerializationError {
        /// Error details.
        error: String,
    },

    /// Unexpected failure, typically from a foreign callback.
    #[error("generic_error: {error}")]
    Generic {
        /// Error details.
        error: String,
    },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for AppAttestError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::Generic {
            error: error.reason,
        }
    }
}

impl From<serde_json::Error> for AppAttestError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}
