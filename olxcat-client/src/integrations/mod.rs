pub mod http;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use http::{ApiRequest, HttpClient, HttpError, RequestOptions};
pub use transport::{Method, ReqwestTransport, Transport, TransportError, TransportResponse};
