//! Client for the persona prediction service.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{ClientError, PredictClient};
