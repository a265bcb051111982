//! CLI mode for CAPTCHA recognition.

use crate::config::EngineConfig;
use captcha_ocr::pipeline::CaptchaEngine;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// File extensions scanned in folder mode, matched case-insensitively.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff"];

/// Recognize a single image file.
pub fn process_image(
    path: &Path,
    config: &EngineConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();

    info!("Initializing recognition engine...");
    let engine = config.build_engine()?;
    let init_time = start.elapsed();
    info!("Engine initialized in {:.2}ms", init_time.as_secs_f64() * 1000.0);

    let bytes = std::fs::read(path)?;
    let predict_start = Instant::now();
    let prediction = engine.recognize(&bytes)?;
    let predict_time = predict_start.elapsed();
    info!(
        "Recognition completed in {:.2}ms",
        predict_time.as_secs_f64() * 1000.0
    );

    println!(
        "{}: {} ({:.1}%)",
        path.display(),
        prediction.text,
        prediction.confidence * 100.0
    );

    Ok(())
}

/// Recognize every image in a folder.
///
/// Per-file failures are logged and skipped; the run continues. When an
/// output folder is given, a plain-text `predictions.txt` with one
/// `filename: prediction` row per recognized image is written into it.
pub fn process_folder(
    folder: &Path,
    config: &EngineConfig,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let files = collect_image_files(folder)?;
    if files.is_empty() {
        return Err(format!("no images found in folder '{}'", folder.display()).into());
    }
    info!("Found {} images", files.len());

    info!("Initializing recognition engine...");
    let engine = config.build_engine()?;

    let start = Instant::now();
    let results = recognize_files(&engine, &files);
    info!(
        "Recognized {}/{} images in {:.2}ms",
        results.len(),
        files.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    for (filename, text) in &results {
        println!("{filename}: {text}");
    }

    if let Some(output) = output {
        std::fs::create_dir_all(output)?;
        let results_path = output.join("predictions.txt");
        let mut file = std::fs::File::create(&results_path)?;
        for (filename, text) in &results {
            writeln!(file, "{filename}: {text}")?;
        }
        info!("Results written to {}", results_path.display());
    }

    Ok(())
}

/// Runs every file through the engine, skipping failures with a warning.
fn recognize_files(engine: &CaptchaEngine, files: &[PathBuf]) -> Vec<(String, String)> {
    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let outcome = std::fs::read(path)
            .map_err(captcha_ocr::core::CaptchaError::from)
            .and_then(|bytes| engine.recognize(&bytes));
        match outcome {
            Ok(prediction) => {
                info!(
                    file = %filename,
                    text = %prediction.text,
                    confidence = prediction.confidence,
                    "recognized"
                );
                results.push((filename, prediction.text));
            }
            Err(e) => {
                warn!(file = %filename, error = %e, "skipping file");
            }
        }
    }
    results
}

/// Lists image files in the folder, sorted by name for deterministic output.
fn collect_image_files(
    folder: &Path,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error + Send + Sync>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_image_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt", "c.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = collect_image_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.jpeg"]);
    }
}
