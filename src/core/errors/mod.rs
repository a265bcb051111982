//! Error types for the recognition pipeline.
//!
//! This module provides the error handling system for the pipeline: the main
//! [`CaptchaError`] enum, helper constructors for creating well-structured
//! errors with context, and a convenient result alias.

pub mod types;

pub use types::{CaptchaError, OpaqueError};

/// Convenient result alias for recognition operations.
pub type CaptchaResult<T> = Result<T, CaptchaError>;
