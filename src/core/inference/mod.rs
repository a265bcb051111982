//! ONNX Runtime backend for the recognition model.
//!
//! Wraps a small pool of `ort` sessions behind the [`RecognitionModel`]
//! trait. Sessions are handed out round-robin so concurrent requests do not
//! serialize on a single session lock.

use crate::core::errors::{CaptchaError, OpaqueError};
use crate::core::traits::RecognitionModel;
use crate::core::{Tensor3D, Tensor4D};
use ndarray::ArrayView3;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A CTC recognition model executed through ONNX Runtime.
pub struct OrtModel {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    output_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for OrtModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtModel")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl OrtModel {
    /// Loads the model from an ONNX file, creating `pool_size` sessions.
    ///
    /// Input and output tensor names are discovered from the session
    /// metadata. A missing or unreadable model file is fatal.
    pub fn from_file(
        model_path: impl AsRef<Path>,
        pool_size: usize,
    ) -> Result<Self, CaptchaError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(CaptchaError::model_load(path, "model file not found", None));
        }

        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()
                .and_then(|mut b| b.commit_from_file(path))
                .map_err(|e| {
                    CaptchaError::model_load(
                        path,
                        "failed to create ONNX session",
                        Some(Box::new(e)),
                    )
                })?;
            sessions.push(Mutex::new(session));
        }

        let (input_name, output_name) = {
            let session = sessions[0].lock().map_err(|_| {
                CaptchaError::model_load(path, "failed to acquire session lock", None)
            })?;
            let input_name = session
                .inputs()
                .first()
                .map(|i| i.name().to_string())
                .ok_or_else(|| {
                    CaptchaError::model_load(path, "model exposes no input tensors", None)
                })?;
            let output_name = session
                .outputs()
                .first()
                .map(|o| o.name().to_string())
                .ok_or_else(|| {
                    CaptchaError::model_load(path, "model exposes no output tensors", None)
                })?;
            (input_name, output_name)
        };

        let model_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "captcha".to_string());

        Ok(Self {
            sessions,
            next_idx: AtomicUsize::new(0),
            input_name,
            output_name,
            model_path: path.to_path_buf(),
            model_name,
        })
    }

    /// Returns the model path associated with this backend.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Returns the model name associated with this backend.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl RecognitionModel for OrtModel {
    fn predict(&self, batch: &Tensor4D) -> Result<Tensor3D, CaptchaError> {
        let input_shape = batch.shape().to_vec();

        let input_tensor = TensorRef::from_array_view(batch.view()).map_err(|e| {
            CaptchaError::inference(
                &self.model_name,
                format!("failed to convert input tensor with shape {input_shape:?}"),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            CaptchaError::inference(
                &self.model_name,
                format!("failed to acquire session lock {}/{}", idx, self.sessions.len()),
                OpaqueError::new("session lock acquisition failed"),
            )
        })?;

        let outputs = session.run(inputs).map_err(|e| {
            CaptchaError::inference(
                &self.model_name,
                format!(
                    "forward pass failed with input '{}' -> output '{}'",
                    self.input_name, self.output_name
                ),
                e,
            )
        })?;

        let (output_shape, output_data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                CaptchaError::inference(
                    &self.model_name,
                    format!("failed to extract output tensor '{}' as f32", self.output_name),
                    e,
                )
            })?;

        if output_shape.len() != 3 {
            return Err(CaptchaError::shape_mismatch(
                "model output",
                &[3],
                &[output_shape.len()],
            ));
        }

        let batch_size = output_shape[0] as usize;
        let timesteps = output_shape[1] as usize;
        let classes = output_shape[2] as usize;
        let expected_len = batch_size * timesteps * classes;

        if output_data.len() != expected_len {
            return Err(CaptchaError::shape_mismatch(
                "model output data",
                &[expected_len],
                &[output_data.len()],
            ));
        }

        let view = ArrayView3::from_shape((batch_size, timesteps, classes), output_data)
            .map_err(CaptchaError::Tensor)?;
        Ok(view.to_owned())
    }
}
