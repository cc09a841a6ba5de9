// ── Transport capability ──
//
// `ApiDriver` is the seam between the model layer and HTTP: models and
// repositories hold an `Arc<dyn ApiDriver>` and never see reqwest. Every
// operation resolves to an `ApiResponse` — transport failures are
// converted into an unsuccessful response, never raised.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::response::ApiResponse;

/// Opaque handle for a file to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), content }
    }
}

/// Progress event emitted while an upload body is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    /// Bytes of the file body handed to the transport so far.
    pub sent: u64,
    /// Total size of the file body.
    pub total: u64,
}

/// Asynchronous REST transport capability.
///
/// `endpoint` is a path relative to the driver's configured base and
/// version (`{base}/{version}/{endpoint}`). `query` entries become URL
/// query parameters; bodies are flat JSON bags.
#[async_trait]
pub trait ApiDriver: Send + Sync {
    /// Execute a GET request.
    async fn get(&self, endpoint: &str, query: &[(String, String)]) -> ApiResponse;

    /// Execute a POST request with a JSON body.
    async fn post(&self, endpoint: &str, body: &Map<String, Value>) -> ApiResponse;

    /// Execute a PATCH request with a JSON body.
    async fn patch(&self, endpoint: &str, body: &Map<String, Value>) -> ApiResponse;

    /// Execute a DELETE request, with an optional JSON body (empty bag =
    /// no body).
    async fn delete(&self, endpoint: &str, body: &Map<String, Value>) -> ApiResponse;

    /// Upload a file as multipart form data (a `file` part plus the
    /// given extra text fields).
    async fn upload(
        &self,
        endpoint: &str,
        file: UploadFile,
        extra: &[(String, String)],
    ) -> ApiResponse;
}
