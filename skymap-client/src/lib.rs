pub mod client;
pub mod error;
pub mod payload;
pub mod request;

pub use client::EnumerationClient;
pub use error::ClientError;
pub use payload::{ElementGroup, ElementRecord, EnumerationResponse, FindingRecord};
pub use request::EnumerationRequest;
