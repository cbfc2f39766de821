// Copyright (c) 2025 Verrazzano Monitoring Operator Contributors
// SPDX-License-Identifier: MIT

//! JSON request helpers shared by the operator and the backup hook.

use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::errors::SearchError;
use crate::reconcilers::retry::http_backoff;

/// Response status and body text.
pub type RawResponse = (StatusCode, String);

/// Join `path` onto `base`, keeping any path prefix `base` already has.
///
/// # Errors
///
/// Returns [`SearchError::InvalidUrl`] if the result is not a valid URL.
pub fn endpoint(base: &Url, path: &str) -> Result<Url, SearchError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| SearchError::InvalidUrl {
        url: joined,
        reason: e.to_string(),
    })
}

/// Send one request with an optional JSON body.
///
/// # Errors
///
/// Returns [`SearchError::Transport`] if no response arrives.
pub async fn send(
    client: &HttpClient,
    method: Method,
    url: &Url,
    body: Option<&Value>,
) -> Result<RawResponse, SearchError> {
    debug!(method = %method, url = %url, "OpenSearch request");
    let mut request = client.request(method, url.clone());
    if let Some(body) = body {
        request = request.json(body);
    }
    let transport = |source| SearchError::Transport {
        url: url.to_string(),
        source,
    };
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    let text = response.text().await.map_err(transport)?;
    Ok((status, text))
}

/// Like [`send`], retrying transport failures and retryable statuses with
/// exponential backoff.
///
/// # Errors
///
/// Returns the last error once the backoff budget is exhausted, or the first
/// non-transient error.
pub async fn send_with_retry(
    client: &HttpClient,
    method: Method,
    url: &Url,
    body: Option<&Value>,
) -> Result<RawResponse, SearchError> {
    let mut backoff = http_backoff();
    let start_time = Instant::now();
    loop {
        let result = match send(client, method.clone(), url, body).await {
            Ok((status, text)) if crate::reconcilers::retry::is_retryable_http_status(status) => {
                Err(status_error(&method, url, status, text))
            }
            other => other,
        };
        match result {
            Err(e) if e.is_transient() => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(url = %url, error = %e, retry_after = ?delay, "Retryable OpenSearch error, will retry");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(url = %url, elapsed = ?start_time.elapsed(), "OpenSearch retries exhausted");
                    return Err(e);
                }
            },
            other => return other,
        }
    }
}

/// Build the error for an unexpected status.
#[must_use]
pub fn status_error(method: &Method, url: &Url, status: StatusCode, body: String) -> SearchError {
    SearchError::Status {
        method: method.to_string(),
        url: url.to_string(),
        status,
        body,
    }
}

/// Fail unless `status` is one of `accepted`.
///
/// # Errors
///
/// Returns [`SearchError::Status`] for any other status.
pub fn expect_status(
    method: &Method,
    url: &Url,
    response: RawResponse,
    accepted: &[StatusCode],
) -> Result<String, SearchError> {
    let (status, body) = response;
    if accepted.contains(&status) {
        Ok(body)
    } else {
        Err(status_error(method, url, status, body))
    }
}

/// Decode a JSON body.
///
/// # Errors
///
/// Returns [`SearchError::Decode`] if the body does not match `T`.
pub fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T, SearchError> {
    serde_json::from_str(body).map_err(|e| SearchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// GET `url` and decode a 200 response.
///
/// # Errors
///
/// Returns an error on transport failure, non-200 status or undecodable body.
pub async fn get_json<T: DeserializeOwned>(client: &HttpClient, url: &Url) -> Result<T, SearchError> {
    let response = send(client, Method::GET, url, None).await?;
    let body = expect_status(&Method::GET, url, response, &[StatusCode::OK])?;
    decode(url, &body)
}
