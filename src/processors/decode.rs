//! Greedy CTC decoding.
//!
//! Converts a per-timestep class-probability tensor into text: take the
//! argmax class at every timestep, merge consecutive runs of the same class
//! into one occurrence, then drop the blank class. A blank between two
//! identical symbols separates them, so the network can emit genuinely
//! repeated characters. Greedy best-path decoding is deterministic and fast
//! but does not marginalize over alignments the way a beam search would.

use crate::core::constants::UNKNOWN_CHAR;
use crate::core::errors::CaptchaError;
use crate::core::Tensor3D;
use crate::processors::alphabet::LabelCodec;
use ndarray::Axis;

/// Greedy CTC decoder over a [`LabelCodec`].
#[derive(Debug, Clone)]
pub struct CtcLabelDecode {
    codec: LabelCodec,
}

impl CtcLabelDecode {
    /// Creates a decoder over the given codec.
    pub fn new(codec: LabelCodec) -> Self {
        Self { codec }
    }

    /// Returns the codec this decoder maps indices through.
    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    /// Decodes a batch of probability matrices into (text, confidence) pairs.
    ///
    /// The class axis must have exactly `|alphabet| + 1` entries (the last
    /// class is blank); anything else indicates an alphabet/model mismatch
    /// and fails the call. Confidence is the mean probability of the kept
    /// timesteps, 0.0 when nothing is kept.
    pub fn apply(&self, pred: &Tensor3D) -> Result<Vec<(String, f32)>, CaptchaError> {
        let shape = pred.shape();
        let class_count = self.codec.class_count();
        if shape[2] != class_count {
            return Err(CaptchaError::shape_mismatch(
                "probability matrix",
                &[shape[0], shape[1], class_count],
                shape,
            ));
        }

        let blank = self.codec.blank_index();
        let mut results = Vec::with_capacity(shape[0]);

        for batch_idx in 0..shape[0] {
            let matrix = pred.index_axis(Axis(0), batch_idx);

            let mut sequence_idx = Vec::with_capacity(shape[1]);
            let mut sequence_prob = Vec::with_capacity(shape[1]);
            for row in matrix.outer_iter() {
                if let Some((idx, &prob)) = row
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                {
                    sequence_idx.push(idx);
                    sequence_prob.push(prob);
                } else {
                    sequence_idx.push(blank);
                    sequence_prob.push(0.0);
                }
            }

            // Collapse rule: drop repeats of the previous timestep first,
            // then drop blanks, so a blank still separates two genuine
            // repetitions of the same symbol.
            let mut selection = vec![true; sequence_idx.len()];
            for i in 1..sequence_idx.len() {
                if sequence_idx[i] == sequence_idx[i - 1] {
                    selection[i] = false;
                }
            }
            for (i, &idx) in sequence_idx.iter().enumerate() {
                if idx == blank {
                    selection[i] = false;
                }
            }

            let mut text = String::new();
            let mut kept_probs = Vec::new();
            for (i, &idx) in sequence_idx.iter().enumerate() {
                if !selection[i] {
                    continue;
                }
                let character = self.codec.decode(idx as i64);
                if character == UNKNOWN_CHAR {
                    continue;
                }
                text.push(character);
                kept_probs.push(sequence_prob[i]);
            }

            let confidence = if kept_probs.is_empty() {
                0.0
            } else {
                kept_probs.iter().sum::<f32>() / kept_probs.len() as f32
            };
            results.push((text, confidence));
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::alphabet::Alphabet;
    use ndarray::Array3;

    /// Builds a (1, T, C) matrix with a 0.9 spike at each requested class.
    fn spike_matrix(class_count: usize, spikes: &[usize]) -> Tensor3D {
        let mut pred = Array3::from_elem((1, spikes.len(), class_count), 0.1 / class_count as f32);
        for (t, &class) in spikes.iter().enumerate() {
            pred[[0, t, class]] = 0.9;
        }
        pred
    }

    fn decoder(chars: &str) -> CtcLabelDecode {
        CtcLabelDecode::new(LabelCodec::new(Alphabet::from_characters(chars.chars())))
    }

    #[test]
    fn test_consecutive_repeats_collapse() {
        // alphabet: a=0, b=1, blank=2
        // Raw best path [a, a, blank, a, b, b]: the doubled a and doubled b
        // each collapse to one occurrence, while the blank keeps the third a
        // separate from the run before it.
        let decoder = decoder("ab");
        let pred = spike_matrix(3, &[0, 0, 2, 0, 1, 1]);
        let results = decoder.apply(&pred).unwrap();
        assert_eq!(results[0].0, "aab");
    }

    #[test]
    fn test_blank_separates_repeated_symbols() {
        let decoder = decoder("ab");
        let pred = spike_matrix(3, &[0, 2, 0]);
        let results = decoder.apply(&pred).unwrap();
        assert_eq!(results[0].0, "aa");
    }

    #[test]
    fn test_all_blank_decodes_to_empty_with_zero_confidence() {
        let decoder = decoder("ab");
        let pred = spike_matrix(3, &[2, 2, 2, 2]);
        let results = decoder.apply(&pred).unwrap();
        assert_eq!(results[0].0, "");
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_class_count_mismatch_is_fatal() {
        let decoder = decoder("abc");
        // 3 classes supplied, but |alphabet| + 1 = 4 expected.
        let pred = spike_matrix(3, &[0, 1]);
        let result = decoder.apply(&pred);
        assert!(matches!(result, Err(CaptchaError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_confidence_is_mean_of_kept_timesteps() {
        let decoder = decoder("ab");
        let mut pred = Array3::zeros((1, 2, 3));
        pred[[0, 0, 0]] = 0.8;
        pred[[0, 1, 1]] = 0.6;
        let results = decoder.apply(&pred).unwrap();
        assert_eq!(results[0].0, "ab");
        assert!((results[0].1 - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_batch_items_decode_independently() {
        let decoder = decoder("ab");
        let mut pred = Array3::zeros((2, 3, 3));
        // item 0: a, blank, b
        pred[[0, 0, 0]] = 0.9;
        pred[[0, 1, 2]] = 0.9;
        pred[[0, 2, 1]] = 0.9;
        // item 1: b, b, blank
        pred[[1, 0, 1]] = 0.9;
        pred[[1, 1, 1]] = 0.9;
        pred[[1, 2, 2]] = 0.9;
        let results = decoder.apply(&pred).unwrap();
        assert_eq!(results[0].0, "ab");
        assert_eq!(results[1].0, "b");
    }
}
