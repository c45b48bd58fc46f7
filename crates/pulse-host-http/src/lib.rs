//! Pulse HTTP
//!
//! The HTTP transport as a capability: "issue a request, get status and body
//! bytes, respect a cancellation signal". The engine only sees the
//! [`HttpClient`] trait; [`ReqwestClient`] is the production implementation.

mod client;
mod decode;
mod error;

pub use client::{HttpClient, HttpRequest, HttpResponse, ReqwestClient, parse_method, validate_url};
pub use decode::decode_body;
pub use error::HttpError;
