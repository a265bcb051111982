//! Alphabet construction and label encoding.
//!
//! The alphabet is the fixed, ordered set of characters the model can output.
//! Its ordering assigns the integer class indices baked into the trained
//! model's output layer, so it must be reproducible: characters are
//! deduplicated and sorted by codepoint, and building the alphabet twice
//! from the same dataset always yields the same index assignment.

use crate::core::constants::{FALLBACK_ALPHABET, LABEL_PAD, MAX_SEQUENCE_LENGTH, UNKNOWN_CHAR};
use crate::core::errors::CaptchaError;
use crate::processors::dataset::LabeledDataset;
use std::collections::{BTreeSet, HashMap};

/// The ordered set of characters the model recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    characters: Vec<char>,
}

impl Alphabet {
    /// Builds the alphabet from every character appearing in any dataset
    /// label.
    pub fn from_dataset(dataset: &LabeledDataset) -> Result<Self, CaptchaError> {
        let mut set = BTreeSet::new();
        for record in dataset.records() {
            set.extend(record.text.chars());
        }
        if set.is_empty() {
            return Err(CaptchaError::dataset(
                "dataset labels contain no characters",
            ));
        }
        Ok(Self {
            characters: set.into_iter().collect(),
        })
    }

    /// Builds an alphabet from an explicit character collection.
    ///
    /// Characters are deduplicated and sorted by codepoint, the same
    /// normalization applied when building from a dataset.
    pub fn from_characters(characters: impl IntoIterator<Item = char>) -> Self {
        let set: BTreeSet<char> = characters.into_iter().collect();
        Self {
            characters: set.into_iter().collect(),
        }
    }

    /// The hardcoded superset alphabet used when no labels file is available.
    pub fn fallback() -> Self {
        Self::from_characters(FALLBACK_ALPHABET.chars())
    }

    /// Returns the characters in index order.
    pub fn chars(&self) -> &[char] {
        &self.characters
    }

    /// Returns the number of characters.
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Returns true if the alphabet is empty.
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Returns true if the character belongs to the alphabet.
    pub fn contains(&self, character: char) -> bool {
        self.characters.binary_search(&character).is_ok()
    }
}

/// Bidirectional mapping between characters and integer class indices.
///
/// The character-to-index direction is a hash map; the index-to-character
/// direction is the alphabet vector itself, indexed by class id. Both are
/// built once at construction time and never mutated.
#[derive(Debug, Clone)]
pub struct LabelCodec {
    alphabet: Alphabet,
    char_to_index: HashMap<char, usize>,
}

impl LabelCodec {
    /// Creates a codec over the given alphabet.
    pub fn new(alphabet: Alphabet) -> Self {
        let char_to_index = alphabet
            .chars()
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i))
            .collect();
        Self {
            alphabet,
            char_to_index,
        }
    }

    /// Returns the alphabet this codec maps over.
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Number of output classes including the trailing blank.
    pub fn class_count(&self) -> usize {
        self.alphabet.len() + 1
    }

    /// Index of the CTC blank class (the last class).
    pub fn blank_index(&self) -> usize {
        self.alphabet.len()
    }

    /// Maps a character to its class index.
    ///
    /// Fails with [`CaptchaError::UnknownCharacter`] for characters outside
    /// the alphabet; training-label encoding skips such records instead of
    /// aborting the pipeline.
    pub fn encode(&self, character: char) -> Result<usize, CaptchaError> {
        self.char_to_index
            .get(&character)
            .copied()
            .ok_or(CaptchaError::UnknownCharacter { character })
    }

    /// Encodes a whole training label, right-padded with [`LABEL_PAD`] to
    /// [`MAX_SEQUENCE_LENGTH`].
    pub fn encode_label(&self, label: &str) -> Result<Vec<i64>, CaptchaError> {
        let char_count = label.chars().count();
        if char_count > MAX_SEQUENCE_LENGTH {
            return Err(CaptchaError::dataset(format!(
                "label '{label}' has {char_count} characters, more than the maximum of {MAX_SEQUENCE_LENGTH}"
            )));
        }
        let mut encoded = Vec::with_capacity(MAX_SEQUENCE_LENGTH);
        for character in label.chars() {
            encoded.push(self.encode(character)? as i64);
        }
        encoded.resize(MAX_SEQUENCE_LENGTH, LABEL_PAD);
        Ok(encoded)
    }

    /// Maps a class index back to its character.
    ///
    /// Returns [`UNKNOWN_CHAR`] for negative indices (the padding/blank
    /// sentinel) and any index outside the alphabet range. The marker is
    /// filtered out of user-facing decoded text.
    pub fn decode(&self, index: i64) -> char {
        if index < 0 {
            return UNKNOWN_CHAR;
        }
        self.alphabet
            .chars()
            .get(index as usize)
            .copied()
            .unwrap_or(UNKNOWN_CHAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dataset_file(rows: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[test]
    fn test_alphabet_is_sorted_and_deduplicated() {
        let file = dataset_file(&["б1а;0001.png", "а2б;0002.png"]);
        let dataset = LabeledDataset::from_file(file.path()).unwrap();
        let alphabet = Alphabet::from_dataset(&dataset).unwrap();

        // Codepoint order: digits before Cyrillic letters.
        assert_eq!(alphabet.chars(), &['1', '2', 'а', 'б']);
    }

    #[test]
    fn test_alphabet_determinism() {
        let file = dataset_file(&["вба21;0001.png", "гг3;0002.png"]);
        let dataset = LabeledDataset::from_file(file.path()).unwrap();

        let first = Alphabet::from_dataset(&dataset).unwrap();
        let second = Alphabet::from_dataset(&dataset).unwrap();
        assert_eq!(first, second);

        let first_codec = LabelCodec::new(first);
        let second_codec = LabelCodec::new(second);
        for &c in first_codec.alphabet().chars() {
            assert_eq!(
                first_codec.encode(c).unwrap(),
                second_codec.encode(c).unwrap()
            );
        }
    }

    #[test]
    fn test_codec_round_trip() {
        let codec = LabelCodec::new(Alphabet::from_characters("а1б2в3".chars()));
        for &c in codec.alphabet().chars() {
            let index = codec.encode(c).unwrap();
            assert_eq!(codec.decode(index as i64), c);
        }
    }

    #[test]
    fn test_decode_out_of_range_yields_unknown_marker() {
        let codec = LabelCodec::new(Alphabet::from_characters("аб".chars()));
        assert_eq!(codec.decode(-1), UNKNOWN_CHAR);
        assert_eq!(codec.decode(codec.alphabet().len() as i64), UNKNOWN_CHAR);
        assert_eq!(codec.decode(1000), UNKNOWN_CHAR);
    }

    #[test]
    fn test_encode_unknown_character_fails() {
        let codec = LabelCodec::new(Alphabet::from_characters("аб".chars()));
        assert!(matches!(
            codec.encode('z'),
            Err(CaptchaError::UnknownCharacter { character: 'z' })
        ));
    }

    #[test]
    fn test_encode_label_pads_to_max_length() {
        let codec = LabelCodec::new(Alphabet::from_characters("аб12".chars()));
        let encoded = codec.encode_label("а1").unwrap();
        assert_eq!(encoded.len(), MAX_SEQUENCE_LENGTH);
        assert_eq!(&encoded[..2], &[2, 0]);
        assert!(encoded[2..].iter().all(|&i| i == LABEL_PAD));
    }

    #[test]
    fn test_encode_label_rejects_overlong_labels() {
        let codec = LabelCodec::new(Alphabet::from_characters("а".chars()));
        let result = codec.encode_label("аааааааа");
        assert!(matches!(result, Err(CaptchaError::Dataset { .. })));
    }

    #[test]
    fn test_fallback_alphabet_covers_digits_and_cyrillic() {
        let alphabet = Alphabet::fallback();
        assert!(alphabet.contains('0'));
        assert!(alphabet.contains('9'));
        assert!(alphabet.contains('а'));
        assert!(alphabet.contains('я'));
        assert_eq!(alphabet.len(), 42);
    }
}
