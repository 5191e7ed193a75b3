pub mod config;
pub mod error;
pub mod types;

pub use error::{AuthFailure, SealError, SealResult};
pub use types::Scheme;
