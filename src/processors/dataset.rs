//! Labeled dataset parsing.
//!
//! The dataset file is UTF-8 text with one `label;filename` record per line.
//! Malformed rows are skipped with a warning; an unreadable or empty file is
//! fatal because no alphabet can be built without it.

use crate::core::errors::CaptchaError;
use std::path::Path;
use tracing::warn;

/// A single `label;filename` record from the dataset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRecord {
    /// The ground-truth text of the CAPTCHA.
    pub text: String,
    /// The image filename the label belongs to.
    pub filename: String,
}

/// A parsed labeled dataset.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    records: Vec<LabelRecord>,
}

impl LabeledDataset {
    /// Reads and parses a semicolon-delimited labels file.
    ///
    /// Rows without a `;` separator or with an empty label or filename are
    /// skipped with a warning. Returns an error if the file cannot be read
    /// or contains no usable records.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CaptchaError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CaptchaError::dataset(format!(
                "failed to read labels file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.split_once(';') {
                Some((text, filename))
                    if !text.trim().is_empty() && !filename.trim().is_empty() =>
                {
                    records.push(LabelRecord {
                        text: text.trim().to_string(),
                        filename: filename.trim().to_string(),
                    });
                }
                _ => {
                    skipped += 1;
                    warn!(line = line_no + 1, "skipping malformed labels row");
                }
            }
        }

        if records.is_empty() {
            return Err(CaptchaError::dataset(format!(
                "no usable records in labels file '{}'",
                path.display()
            )));
        }
        if skipped > 0 {
            warn!(skipped, "labels file contained malformed rows");
        }

        Ok(Self { records })
    }

    /// Returns the parsed records.
    pub fn records(&self) -> &[LabelRecord] {
        &self.records
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the dataset holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_labels_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ав3г1;0001.png").unwrap();
        writeln!(file, "2бвг;0002.png").unwrap();

        let dataset = LabeledDataset::from_file(file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records()[0].text, "ав3г1");
        assert_eq!(dataset.records()[1].filename, "0002.png");
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ав3г1;0001.png").unwrap();
        writeln!(file, "no-separator-here").unwrap();
        writeln!(file, ";missing-label.png").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "2бвг;0002.png").unwrap();

        let dataset = LabeledDataset::from_file(file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = LabeledDataset::from_file("/nonexistent/labels.csv");
        assert!(matches!(result, Err(CaptchaError::Dataset { .. })));
    }

    #[test]
    fn test_all_rows_malformed_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, "more garbage").unwrap();

        let result = LabeledDataset::from_file(file.path());
        assert!(matches!(result, Err(CaptchaError::Dataset { .. })));
    }
}
