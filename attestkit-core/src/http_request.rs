use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use url::Url;

use crate::error::{AppAttestError, AppAttestResult};

/// A simple wrapper on an HTTP client for making requests. Sets sensible defaults such as
/// timeouts and user-agent.
///
/// Requests are sent exactly once. A retried attestation or assertion would resend a
/// challenge the server may already have consumed, so retry policy is left to callers.
pub struct Request {
    client: reqwest::Client,
    timeout: Duration,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("attestkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: Url) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request built by `req`/`get`/`post` and fails on any non-2xx status.
    ///
    /// # Errors
    /// - [`AppAttestError::NetworkError`] if no response was received.
    /// - [`AppAttestError::ServerError`] if the server answered with a non-2xx status.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> AppAttestResult<Response> {
        let (client, request) = request_builder.build_split();
        let request = request.map_err(|err| AppAttestError::NetworkError {
            url: err
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            error: format!("request build failed: {err}"),
        })?;
        let url = request.url().clone();

        let response = client.execute(request).await.map_err(|err| {
            let error = if err.is_timeout() {
                format!("request timed out: {err}")
            } else {
                format!("request failed: {err}")
            };
            AppAttestError::NetworkError {
                url: redacted(&url),
                error,
            }
        })?;

        ensure_success(response).await
    }
}

/// Turns a non-2xx response into [`AppAttestError::ServerError`].
///
/// The body is decoded as lossy UTF-8 so diagnostics survive binary error pages.
pub(crate) async fn ensure_success(response: Response) -> AppAttestResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .bytes()
        .await
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    Err(AppAttestError::ServerError {
        status: status.as_u16(),
        body,
    })
}

/// Drops the query string, which carries the key id on challenge requests.
fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(server: &mockito::ServerGuard, path: &str) -> Url {
        Url::parse(&format!("{}{path}", server.url())).unwrap()
    }

    #[tokio::test]
    async fn test_user_agent_is_set() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header(
                "user-agent",
                format!("attestkit-core/{}", env!("CARGO_PKG_VERSION")).as_str(),
            )
            .with_status(204)
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(5));
        let response = request
            .handle(request.get(url(&server, "/ping")))
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 204);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/fail")
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(5));
        let err = request
            .handle(request.post(url(&server, "/fail")))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppAttestError::ServerError {
                status: 403,
                body: "forbidden".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_binary_error_body_is_decoded_lossily() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/fail")
            .with_status(500)
            .with_body([b'o', b'k', 0xFF])
            .create_async()
            .await;

        let request = Request::new(Duration::from_secs(5));
        let err = request
            .handle(request.post(url(&server, "/fail")))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AppAttestError::ServerError {
                status: 500,
                body: "ok\u{FFFD}".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connection_failure_is_network_error() {
        let request = Request::new(Duration::from_secs(5));
        let target = Url::parse("http://127.0.0.1:9/verify/challenge?key_id_b64=secret").unwrap();

        let err = request.handle(request.get(target)).await.unwrap_err();

        match err {
            AppAttestError::NetworkError { url, .. } => {
                assert_eq!(url, "http://127.0.0.1:9/verify/challenge");
            }
            other => panic!("expected NetworkError, got {other:?}"),
        }
    }
}
