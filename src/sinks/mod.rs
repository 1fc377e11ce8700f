//! Concrete result sinks.

pub mod active_token;

pub use active_token::{ActiveTokenReader, ActiveTokenSink};
