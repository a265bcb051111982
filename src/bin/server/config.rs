//! Configuration types for the CAPTCHA server and CLI.

use captcha_ocr::core::CaptchaError;
use captcha_ocr::pipeline::CaptchaEngine;
use std::path::PathBuf;

/// Configuration for building the recognition engine.
#[derive(Clone)]
pub struct EngineConfig {
    pub model: PathBuf,
    pub labels: Option<PathBuf>,
    pub session_pool_size: usize,
}

impl EngineConfig {
    /// Builds the engine from this configuration.
    pub fn build_engine(&self) -> Result<CaptchaEngine, CaptchaError> {
        let mut builder =
            CaptchaEngine::builder(&self.model).session_pool_size(self.session_pool_size);
        if let Some(labels) = &self.labels {
            builder = builder.labels_path(labels);
        }
        builder.build()
    }
}

/// Configuration for the HTTP server.
#[derive(Clone)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    pub host: String,
    pub port: u16,
}
