//! Authentication strategies for outgoing requests.

use std::{collections::HashMap, sync::Arc};

use crate::{
    client::AppAttestClient,
    envelope::{Envelope, ASSERTION_OBJECT_CLAIM},
    error::AppAttestResult,
    payload::Payload,
    server::{BEARER_PREFIX, SERVICE_TYPE_HEADER, SERVICE_TYPE_VALUE, USE_APP_ATTEST_HEADER},
};

/// Name of the header carrying bearer tokens.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// An outgoing HTTP request, as seen by authentication strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Header map. Names are matched case-insensitively by the helpers below.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl OutboundRequest {
    /// Creates a request without headers.
    #[must_use]
    pub fn new(method: impl Into<String>, url: impl Into<String>, body: Option<Vec<u8>>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body,
        }
    }

    /// Returns the value of the header `name`, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets the header `name`, replacing any existing value regardless of case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }
}

/// A strategy applying authentication to an outgoing request.
///
/// Implementations may mutate headers and body, and may perform network or
/// hardware work before returning.
#[async_trait::async_trait]
pub trait RequestAuth: Send + Sync {
    /// Authenticates `request` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication material cannot be produced. The request
    /// must not be sent in that case.
    async fn authenticate(&self, request: &mut OutboundRequest) -> AppAttestResult<()>;
}

/// Authenticates requests with an App Attest assertion over the request body.
///
/// For each request the JSON body is signed by the enrolled hardware key, the
/// assertion is wrapped in a bearer envelope, and the body is replaced with the
/// canonical encoding that was signed so the server hashes the same bytes.
#[derive(uniffi::Object)]
pub struct AppAttestRequestAuth {
    client: Arc<AppAttestClient>,
    bundle_id: String,
}

#[uniffi::export(async_runtime = "tokio")]
impl AppAttestRequestAuth {
    /// Creates the strategy. `bundle_id` identifies the app to the server.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(client: Arc<AppAttestClient>, bundle_id: String) -> Self {
        Self { client, bundle_id }
    }

    /// Returns `request` with authentication applied.
    ///
    /// # Errors
    /// See [`RequestAuth::authenticate`].
    pub async fn authenticate_request(
        &self,
        mut request: OutboundRequest,
    ) -> AppAttestResult<OutboundRequest> {
        self.authenticate(&mut request).await?;
        Ok(request)
    }
}

#[async_trait::async_trait]
impl RequestAuth for AppAttestRequestAuth {
    async fn authenticate(&self, request: &mut OutboundRequest) -> AppAttestResult<()> {
        let payload = Payload::from_json_slice(request.body.as_deref().unwrap_or_default())?;

        // Trust must be established before the first assertion; cheap once enrolled.
        self.client.perform_attestation().await?;
        let result = self.client.perform_assertion(&payload).await?;

        let token = Envelope::new(
            &result.key_id,
            &result.challenge,
            ASSERTION_OBJECT_CLAIM,
            &result.assertion,
            &self.bundle_id,
        )
        .encode()?;

        request.set_header(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{token}"));
        request.set_header(SERVICE_TYPE_HEADER, SERVICE_TYPE_VALUE);
        request.set_header(USE_APP_ATTEST_HEADER, "true");
        request.body = Some(result.payload);
        Ok(())
    }
}

/// Authenticates requests with a static API key.
///
/// ```
/// # tokio_test::block_on(async {
/// use attestkit_core::{BearerRequestAuth, OutboundRequest, RequestAuth};
///
/// let auth = BearerRequestAuth::new("api-key".to_string());
/// let mut request = OutboundRequest::new("POST", "https://example.com/v1", None);
/// auth.authenticate(&mut request).await.unwrap();
/// assert_eq!(request.header("authorization"), Some("Bearer api-key"));
/// # });
/// ```
#[derive(uniffi::Object)]
pub struct BearerRequestAuth {
    api_key: String,
}

#[uniffi::export(async_runtime = "tokio")]
impl BearerRequestAuth {
    /// Creates the strategy.
    #[uniffi::constructor]
    #[must_use]
    pub const fn new(api_key: String) -> Self {
        Self { api_key }
    }

    /// Returns `request` with the API key attached.
    ///
    /// # Errors
    /// Never fails; the signature matches the other strategies.
    pub async fn authenticate_request(
        &self,
        mut request: OutboundRequest,
    ) -> AppAttestResult<OutboundRequest> {
        self.authenticate(&mut request).await?;
        Ok(request)
    }
}

#[async_trait::async_trait]
impl RequestAuth for BearerRequestAuth {
    async fn authenticate(&self, request: &mut OutboundRequest) -> AppAttestResult<()> {
        request.set_header(AUTHORIZATION_HEADER, format!("{BEARER_PREFIX}{}", self.api_key));
        Ok(())
    }
}
