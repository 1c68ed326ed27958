//! learnpy common types
//!
//! Request/response bodies, domain models and the error type shared by the
//! HTTP layer and its services.

pub mod error;
pub mod types;

pub use error::{AppError, Result};
