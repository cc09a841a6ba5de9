// ── Concrete reqwest-backed driver ──
//
// URL scheme: {base}/{version}/{endpoint}. The credential travels as a
// `Token` header on every call when set. All request-time failures
// (connect errors, non-2xx statuses, unparseable bodies) are converted
// into the synthetic `E-SERVER-ERROR` response; the optional error
// handler observes every unsuccessful response — synthesized ones
// included — before the caller does.

use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::driver::{ApiDriver, UploadFile, UploadProgress};
use crate::error::Error;
use crate::response::ApiResponse;
use crate::transport::TransportConfig;

/// Callback observing every unsuccessful response.
pub type ErrorHandler = Arc<dyn Fn(&ApiResponse) + Send + Sync>;

/// Callback observing upload progress.
pub type ProgressHandler = Arc<dyn Fn(UploadProgress) + Send + Sync>;

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Reqwest-backed [`ApiDriver`].
///
/// The settable pieces — token, base endpoint, version, error handler,
/// upload handler — live behind per-instance locks with last-write-wins
/// semantics: a caller that swaps a handler while a request is in flight
/// races with it, and no further ordering is guaranteed.
pub struct Api {
    http: reqwest::Client,
    base_endpoint: RwLock<String>,
    version: RwLock<String>,
    token: RwLock<Option<HeaderValue>>,
    on_error: RwLock<Option<ErrorHandler>>,
    on_upload_progress: RwLock<Option<ProgressHandler>>,
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Api {
    /// Create a driver for `{base_endpoint}/{version}/…`.
    ///
    /// The base endpoint must be a valid absolute URL.
    pub fn new(
        base_endpoint: &str,
        version: &str,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Url::parse(base_endpoint)?;
        let http = transport.build_client()?;

        Ok(Self {
            http,
            base_endpoint: RwLock::new(base_endpoint.trim_end_matches('/').to_owned()),
            version: RwLock::new(version.to_owned()),
            token: RwLock::new(None),
            on_error: RwLock::new(None),
            on_upload_progress: RwLock::new(None),
        })
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Set the credential sent as the `Token` header on every call.
    pub fn set_token(&self, token: &str) -> Result<&Self, Error> {
        let mut value =
            HeaderValue::from_str(token).map_err(|e| Error::InvalidToken(e.to_string()))?;
        value.set_sensitive(true);
        *write(&self.token) = Some(value);
        Ok(self)
    }

    /// Stop sending the `Token` header.
    pub fn clear_token(&self) -> &Self {
        *write(&self.token) = None;
        self
    }

    /// Replace the base endpoint.
    pub fn set_base_endpoint(&self, endpoint: &str) -> Result<&Self, Error> {
        Url::parse(endpoint)?;
        *write(&self.base_endpoint) = endpoint.trim_end_matches('/').to_owned();
        Ok(self)
    }

    /// Replace the API version segment.
    pub fn set_version(&self, version: &str) -> &Self {
        *write(&self.version) = version.to_owned();
        self
    }

    /// Install a callback invoked synchronously with every unsuccessful
    /// response, for every call type, before the response is returned.
    pub fn set_error_handler(
        &self,
        handler: impl Fn(&ApiResponse) + Send + Sync + 'static,
    ) -> &Self {
        *write(&self.on_error) = Some(Arc::new(handler));
        self
    }

    /// Remove the error handler.
    pub fn remove_error_handler(&self) -> &Self {
        *write(&self.on_error) = None;
        self
    }

    /// Install a callback receiving progress events during `upload`.
    pub fn set_upload_handler(
        &self,
        handler: impl Fn(UploadProgress) + Send + Sync + 'static,
    ) -> &Self {
        *write(&self.on_upload_progress) = Some(Arc::new(handler));
        self
    }

    /// The currently installed upload handler, if any.
    pub fn upload_handler(&self) -> Option<ProgressHandler> {
        read(&self.on_upload_progress).clone()
    }

    /// Remove the upload handler.
    pub fn remove_upload_handler(&self) -> &Self {
        *write(&self.on_upload_progress) = None;
        self
    }

    // ── Request plumbing ─────────────────────────────────────────────

    /// Compose `{base}/{version}/{endpoint}`.
    fn endpoint_url(&self, endpoint: &str) -> String {
        let base = read(&self.base_endpoint).clone();
        let version = read(&self.version).clone();
        format!("{base}/{version}/{}", endpoint.trim_start_matches('/'))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = read(&self.token).clone() {
            headers.insert("Token", token);
        }
        headers
    }

    fn fire_error_handler(&self, response: &ApiResponse) {
        if let Some(handler) = read(&self.on_error).clone() {
            handler(response);
        }
    }

    /// Produce the synthetic transport-failure response and notify the
    /// error handler.
    fn fail(&self) -> ApiResponse {
        let response = ApiResponse::server_error();
        self.fire_error_handler(&response);
        response
    }

    /// Send a prepared request and normalize whatever comes back.
    async fn dispatch(&self, request: reqwest::RequestBuilder) -> ApiResponse {
        let result = request.headers(self.headers()).send().await;

        let resp = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("transport failure: {e}");
                return self.fail();
            }
        };

        // Mirrors a client that throws on non-2xx: the envelope is only
        // consulted for successful statuses.
        if !resp.status().is_success() {
            debug!("unsuccessful status: {}", resp.status());
            return self.fail();
        }

        let payload: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                debug!("unparseable response body: {e}");
                return self.fail();
            }
        };

        let response = ApiResponse::from_payload(&payload);
        if !response.is_successful() {
            self.fire_error_handler(&response);
        }
        response
    }

    /// Build the progress-reporting streaming body for an upload.
    fn upload_part(&self, file: UploadFile) -> reqwest::multipart::Part {
        let total = file.content.len() as u64;
        let file_name = file.file_name;

        match self.upload_handler() {
            Some(handler) => {
                let chunks: Vec<Bytes> = file
                    .content
                    .chunks(UPLOAD_CHUNK_SIZE)
                    .map(Bytes::copy_from_slice)
                    .collect();

                let mut sent = 0u64;
                let stream = futures_util::stream::iter(chunks).map(move |chunk| {
                    sent += chunk.len() as u64;
                    handler(UploadProgress { sent, total });
                    Ok::<Bytes, Infallible>(chunk)
                });

                reqwest::multipart::Part::stream_with_length(
                    reqwest::Body::wrap_stream(stream),
                    total,
                )
                .file_name(file_name)
            }
            None => reqwest::multipart::Part::bytes(file.content).file_name(file_name),
        }
    }
}

#[async_trait]
impl ApiDriver for Api {
    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> ApiResponse {
        let url = self.endpoint_url(endpoint);
        debug!("GET {url}");
        self.dispatch(self.http.get(url).query(query)).await
    }

    async fn post(&self, endpoint: &str, body: &Map<String, Value>) -> ApiResponse {
        let url = self.endpoint_url(endpoint);
        debug!("POST {url}");
        self.dispatch(self.http.post(url).json(body)).await
    }

    async fn patch(&self, endpoint: &str, body: &Map<String, Value>) -> ApiResponse {
        let url = self.endpoint_url(endpoint);
        debug!("PATCH {url}");
        self.dispatch(self.http.patch(url).json(body)).await
    }

    async fn delete(&self, endpoint: &str, body: &Map<String, Value>) -> ApiResponse {
        let url = self.endpoint_url(endpoint);
        debug!("DELETE {url}");
        let mut request = self.http.delete(url);
        if !body.is_empty() {
            request = request.json(body);
        }
        self.dispatch(request).await
    }

    async fn upload(
        &self,
        endpoint: &str,
        file: UploadFile,
        extra: &[(String, String)],
    ) -> ApiResponse {
        let url = self.endpoint_url(endpoint);
        debug!("POST {url} (multipart, {} bytes)", file.content.len());

        let mut form = reqwest::multipart::Form::new().part("file", self.upload_part(file));
        for (key, value) in extra {
            form = form.text(key.clone(), value.clone());
        }

        self.dispatch(self.http.post(url).multipart(form)).await
    }
}
