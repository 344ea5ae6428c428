use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum HttpError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} failed: {status} {body}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{method} {url} decode failed: {source} | {body}")]
    Decode {
        method: &'static str,
        url: String,
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

/// Credentials attached to an outgoing request.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Auth<'a> {
    Bearer(&'a str),
    ApiKey { key: &'a str, version: &'a str },
}

#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub(crate) fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpError::Client)?;
        Ok(Self { client })
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, url: &str, auth: Auth<'_>) -> Result<T, HttpError> {
        let req = with_auth(self.client.get(url), auth);
        let text = send_ok("GET", url, req)?.text().unwrap_or_default();
        decode("GET", url, text)
    }

    pub(crate) fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        auth: Auth<'_>,
        body: &B,
    ) -> Result<T, HttpError> {
        let req = with_auth(self.client.post(url), auth)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        let text = send_ok("POST", url, req)?.text().unwrap_or_default();
        decode("POST", url, text)
    }

    /// Posts a body and hands back the open response for incremental reads.
    pub(crate) fn post_stream<B: Serialize>(
        &self,
        url: &str,
        auth: Auth<'_>,
        body: &B,
    ) -> Result<Response, HttpError> {
        let req = with_auth(self.client.post(url), auth)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(body);
        send_ok("POST", url, req)
    }
}

fn with_auth(req: RequestBuilder, auth: Auth<'_>) -> RequestBuilder {
    match auth {
        Auth::Bearer(token) => req.bearer_auth(token),
        Auth::ApiKey { key, version } => req
            .header("Api-Key", key)
            .header("X-Pinecone-API-Version", version),
    }
}

fn send_ok(method: &'static str, url: &str, req: RequestBuilder) -> Result<Response, HttpError> {
    let resp = req.send().map_err(|source| HttpError::Transport {
        method,
        url: url.to_string(),
        source,
    })?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(HttpError::Status {
            method,
            url: url.to_string(),
            status,
            body,
        });
    }
    Ok(resp)
}

fn decode<T: DeserializeOwned>(method: &'static str, url: &str, text: String) -> Result<T, HttpError> {
    from_str::<T>(&text).map_err(|source| HttpError::Decode {
        method,
        url: url.to_string(),
        source,
        body: text,
    })
}
