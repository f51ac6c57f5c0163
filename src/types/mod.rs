//! Core request and response types.

mod progress;
mod request;
mod response;

pub use progress::{ByteProgress, DownloadStats};
pub use request::{ApiRequest, RequestFactory, RequestParts};
pub use response::{ApiResponse, Outcome, Parsed, ResponseKind};
