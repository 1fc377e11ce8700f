//! Concrete token handlers.

pub mod http;

pub use http::HttpTokenHandler;
