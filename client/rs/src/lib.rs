pub mod api;
pub mod entities;
pub mod error;
pub mod ws;

#[cfg(feature = "http-client")]
pub mod http_client;

pub use error::Error;

pub type VibemanResult<T> = Result<T, Error>;
