//! Core Infrastructure
//!
//! HTTP transport abstraction and shared synchronization helpers.

pub(crate) mod sync;
pub mod transport;

pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
    AUTHORIZATION,
};
