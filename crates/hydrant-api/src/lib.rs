// hydrant-api: Async REST transport layer for the hydrant data-mapping crates.

pub mod casing;
pub mod client;
pub mod driver;
pub mod error;
pub mod response;
pub mod transport;

pub use client::Api;
pub use driver::{ApiDriver, UploadFile, UploadProgress};
pub use error::Error;
pub use response::{ApiErrorInfo, ApiResponse, json_is_falsy};
pub use transport::{TlsMode, TransportConfig};
