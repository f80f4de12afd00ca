pub mod api_error;

pub use api_error::JanusError;

pub type Result<T> = std::result::Result<T, JanusError>;
