use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use serde_json::Value;

use crate::error::MirrorError;

/// The two kinds of calls the sync engine makes against OSF.
pub trait OsfTransport {
    /// Authenticated GET returning the decoded JSON body; non-success is a `RequestFailure`.
    fn get_json(&self, url: &str) -> Result<Value, MirrorError>;

    /// GET without following redirects, returning the `Location` target if any.
    ///
    /// `authorized` attaches the bearer token; an authorized probe that is neither a success nor a
    /// redirect is a `RequestFailure`.
    fn redirect_target(&self, url: &str, authorized: bool) -> Result<Option<String>, MirrorError>;
}

impl<T: OsfTransport + ?Sized> OsfTransport for &T {
    fn get_json(&self, url: &str) -> Result<Value, MirrorError> {
        (**self).get_json(url)
    }

    fn redirect_target(&self, url: &str, authorized: bool) -> Result<Option<String>, MirrorError> {
        (**self).redirect_target(url, authorized)
    }
}

#[derive(Clone)]
pub struct OsfHttpClient {
    client: Client,
    probe_client: Client,
    token: Option<HeaderValue>,
}

impl OsfHttpClient {
    pub fn new(token: Option<&str>) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("osf-mirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers.clone())
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| MirrorError::Http(err.to_string()))?;
        let probe_client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .redirect(Policy::none())
            .build()
            .map_err(|err| MirrorError::Http(err.to_string()))?;

        let token = token
            .map(|token| {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|err| MirrorError::Http(err.to_string()))?;
                value.set_sensitive(true);
                Ok::<_, MirrorError>(value)
            })
            .transpose()?;

        Ok(Self {
            client,
            probe_client,
            token,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, token.clone()),
            None => request,
        }
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, MirrorError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        tracing::debug!(status, attempt, "retrying OSF request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        tracing::debug!(error = %err, attempt, "retrying OSF request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(MirrorError::Http(err.to_string()));
                }
            }
        }
    }
}

impl OsfTransport for OsfHttpClient {
    fn get_json(&self, url: &str) -> Result<Value, MirrorError> {
        let response = self.send_with_retries(|| self.authorize(self.client.get(url)))?;
        let response = handle_status(response)?;
        response
            .json()
            .map_err(|err| MirrorError::Http(format!("decode {url}: {err}")))
    }

    fn redirect_target(&self, url: &str, authorized: bool) -> Result<Option<String>, MirrorError> {
        let response = self.send_with_retries(|| {
            let request = self.probe_client.get(url);
            if authorized {
                self.authorize(request)
            } else {
                request
            }
        })?;
        let status = response.status();
        if authorized && !status.is_success() && !status.is_redirection() {
            return Err(failure(response));
        }
        Ok(response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string()))
    }
}

fn handle_status(response: Response) -> Result<Response, MirrorError> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(failure(response))
}

fn failure(response: Response) -> MirrorError {
    let url = response.url().to_string();
    let body = response
        .text()
        .unwrap_or_else(|_| "OSF request failed".to_string());
    MirrorError::RequestFailure { url, body }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
