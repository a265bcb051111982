//! High-level recognition engine.
//!
//! [`CaptchaEngine`] is an explicitly constructed, immutable context object
//! holding the model, codec, preprocessor, and decoder. It is built once at
//! startup and shared read-only by request handlers; each prediction call is
//! a pure function of the engine and its input, so concurrent requests never
//! contend on mutable state.

use crate::core::constants::MAX_SEQUENCE_LENGTH;
use crate::core::errors::CaptchaError;
use crate::core::inference::OrtModel;
use crate::core::traits::RecognitionModel;
use crate::processors::alphabet::{Alphabet, LabelCodec};
use crate::processors::dataset::LabeledDataset;
use crate::processors::decode::CtcLabelDecode;
use crate::processors::preprocess::CaptchaPreprocessor;
use std::path::PathBuf;
use tracing::{debug, warn};

/// The result of recognizing one CAPTCHA image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The decoded text.
    pub text: String,
    /// Mean probability of the kept decode timesteps.
    pub confidence: f32,
}

/// The assembled recognition pipeline: preprocess, predict, decode.
pub struct CaptchaEngine {
    model: Box<dyn RecognitionModel>,
    preprocessor: CaptchaPreprocessor,
    decoder: CtcLabelDecode,
}

impl std::fmt::Debug for CaptchaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaEngine")
            .field("alphabet_len", &self.alphabet().len())
            .finish()
    }
}

impl CaptchaEngine {
    /// Creates a builder for an engine backed by an ONNX model file.
    pub fn builder(model_path: impl Into<PathBuf>) -> CaptchaEngineBuilder {
        CaptchaEngineBuilder::new(model_path)
    }

    /// Assembles an engine from an injected model and alphabet.
    ///
    /// This is the dependency-injection seam: tests pass synthetic models
    /// that return fixed probability matrices.
    pub fn from_parts(model: Box<dyn RecognitionModel>, alphabet: Alphabet) -> Self {
        let codec = LabelCodec::new(alphabet);
        Self {
            model,
            preprocessor: CaptchaPreprocessor::new(),
            decoder: CtcLabelDecode::new(codec),
        }
    }

    /// Returns the alphabet the engine decodes over.
    pub fn alphabet(&self) -> &Alphabet {
        self.decoder.codec().alphabet()
    }

    /// Recognizes the text in a single raw image buffer.
    pub fn recognize(&self, bytes: &[u8]) -> Result<Prediction, CaptchaError> {
        let tensor = self.preprocessor.apply(bytes)?;
        let probabilities = self.model.predict(&tensor)?;
        let decoded = self.decoder.apply(&probabilities)?;
        let (text, confidence) = decoded.into_iter().next().ok_or_else(|| {
            CaptchaError::shape_mismatch("model output batch", &[1], &[0])
        })?;

        let char_count = text.chars().count();
        if char_count > MAX_SEQUENCE_LENGTH {
            warn!(
                text = %text,
                length = char_count,
                "decoded text exceeds the trained sequence cap"
            );
        }
        debug!(text = %text, confidence, "decoded captcha");

        Ok(Prediction { text, confidence })
    }

    /// Recognizes a batch of raw image buffers sequentially.
    ///
    /// Returns one result per element; a failure on one element never aborts
    /// the rest of the batch.
    pub fn recognize_batch<B: AsRef<[u8]>>(
        &self,
        payloads: &[B],
    ) -> Vec<Result<Prediction, CaptchaError>> {
        payloads
            .iter()
            .map(|payload| self.recognize(payload.as_ref()))
            .collect()
    }
}

/// Builder for [`CaptchaEngine`].
#[derive(Debug, Clone)]
pub struct CaptchaEngineBuilder {
    model_path: PathBuf,
    labels_path: Option<PathBuf>,
    session_pool_size: usize,
}

impl CaptchaEngineBuilder {
    /// Creates a builder for the given ONNX model path.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: None,
            session_pool_size: 1,
        }
    }

    /// Sets the labels file the alphabet is built from.
    ///
    /// Without it the engine falls back to the hardcoded superset alphabet,
    /// a degraded mode that risks an alphabet/model mismatch.
    pub fn labels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    /// Sets the number of ONNX sessions to pool for concurrent inference.
    pub fn session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size;
        self
    }

    /// Loads the model and alphabet and assembles the engine.
    pub fn build(self) -> Result<CaptchaEngine, CaptchaError> {
        let alphabet = match &self.labels_path {
            Some(path) => {
                let dataset = LabeledDataset::from_file(path)?;
                let alphabet = Alphabet::from_dataset(&dataset)?;
                debug!(
                    records = dataset.len(),
                    alphabet_len = alphabet.len(),
                    "alphabet built from labels file"
                );
                alphabet
            }
            None => {
                warn!(
                    "no labels file configured; falling back to the built-in superset alphabet. \
                     Predictions will be wrong if the model was trained on a different alphabet"
                );
                Alphabet::fallback()
            }
        };

        let model = OrtModel::from_file(&self.model_path, self.session_pool_size)?;
        Ok(CaptchaEngine::from_parts(Box::new(model), alphabet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Tensor3D, Tensor4D};
    use image::{ImageFormat, Rgb, RgbImage};
    use ndarray::Array3;
    use std::io::Cursor;

    /// A model that ignores its input and returns a fixed spike matrix.
    struct SpikeModel {
        matrix: Tensor3D,
    }

    impl RecognitionModel for SpikeModel {
        fn predict(&self, _batch: &Tensor4D) -> Result<Tensor3D, CaptchaError> {
            Ok(self.matrix.clone())
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(120, 50, Rgb([200, 180, 160]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn spike_matrix(class_count: usize, spikes: &[usize]) -> Tensor3D {
        let mut pred = Array3::from_elem((1, spikes.len(), class_count), 0.01);
        for (t, &class) in spikes.iter().enumerate() {
            pred[[0, t, class]] = 0.95;
        }
        pred
    }

    #[test]
    fn test_end_to_end_decode_matches_ground_truth() {
        // Alphabet sorts by codepoint: '1'=0, '2'=1, 'а'=2, 'б'=3, blank=4.
        let alphabet = Alphabet::from_characters("а1б2".chars());
        let blank = alphabet.len();
        // Spike pattern for "а1б2", blank-separated.
        let matrix = spike_matrix(blank + 1, &[2, blank, 0, blank, 3, blank, 1, blank]);
        let engine = CaptchaEngine::from_parts(Box::new(SpikeModel { matrix }), alphabet);

        let prediction = engine.recognize(&png_bytes()).unwrap();
        assert_eq!(prediction.text, "а1б2");
        assert!(prediction.confidence > 0.9);
    }

    #[test]
    fn test_batch_isolation_with_corrupt_middle_element() {
        let alphabet = Alphabet::from_characters("аб".chars());
        let matrix = spike_matrix(3, &[0, 2, 1]);
        let engine = CaptchaEngine::from_parts(Box::new(SpikeModel { matrix }), alphabet);

        let good = png_bytes();
        let corrupt = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let results = engine.recognize_batch(&[good.clone(), corrupt, good]);

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CaptchaError::ImageDecode { .. })
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_class_count_mismatch_surfaces_as_shape_error() {
        // Model emits 3 classes but the alphabet expects 4 + blank.
        let alphabet = Alphabet::from_characters("абвг".chars());
        let matrix = spike_matrix(3, &[0, 1]);
        let engine = CaptchaEngine::from_parts(Box::new(SpikeModel { matrix }), alphabet);

        let result = engine.recognize(&png_bytes());
        assert!(matches!(result, Err(CaptchaError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_missing_model_file_fails_at_build() {
        let result = CaptchaEngine::builder("/nonexistent/model.onnx").build();
        assert!(matches!(result, Err(CaptchaError::ModelLoad { .. })));
    }
}
