//! Downloading live CAPTCHAs from the FSSP service.
//!
//! The endpoint answers with a JSONP payload wrapping a JSON object whose
//! `image` field is a base64-encoded PNG, usually carrying a `data:` prefix.

use captcha_ocr::processors::decode_base64_image;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const FSSP_CAPTCHA_URL: &str = "https://is.fssp.gov.ru/refresh_visual_captcha/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// JSON object inside the JSONP callback.
#[derive(Deserialize)]
struct CaptchaPayload {
    image: Option<String>,
}

/// Downloads `count` CAPTCHAs and saves them as PNG files into `output_dir`.
///
/// Individual download failures are logged and skipped; the run fails only
/// when nothing could be fetched at all.
pub async fn fetch_captchas(
    count: usize,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(output_dir)?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(10))
        .build()?;

    let mut saved = Vec::new();
    for i in 0..count {
        match fetch_one(&client).await {
            Ok(bytes) => {
                let millis = unix_millis();
                let path = output_dir.join(format!("captcha_{millis}_{}.png", i + 1));
                std::fs::write(&path, &bytes)?;
                info!("CAPTCHA {}: saved to {}", i + 1, path.display());
                saved.push(path);
            }
            Err(e) => {
                warn!("CAPTCHA {}: download failed: {}", i + 1, e);
            }
        }
        if i + 1 < count {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    if saved.is_empty() {
        return Err("no CAPTCHAs could be fetched".into());
    }
    Ok(saved)
}

/// Fetches one CAPTCHA image as raw bytes.
async fn fetch_one(
    client: &reqwest::Client,
) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
    let millis = unix_millis();
    let response = client
        .get(FSSP_CAPTCHA_URL)
        .query(&[
            ("callback", format!("callback_{millis}")),
            ("_", millis.to_string()),
        ])
        .header(reqwest::header::REFERER, "https://is.fssp.gov.ru/")
        .header(reqwest::header::ACCEPT, "application/json, text/javascript, */*; q=0.01")
        .header("X-Requested-With", "XMLHttpRequest")
        .send()
        .await?
        .error_for_status()?;

    let text = response.text().await?;
    let payload: CaptchaPayload = serde_json::from_str(strip_jsonp(&text))?;
    let image = payload
        .image
        .ok_or("response carries no 'image' field")?;
    Ok(decode_base64_image(&image)?)
}

/// Extracts the JSON object from a `callback_123({...})` JSONP wrapper.
///
/// Payloads that are already plain JSON pass through unchanged.
fn strip_jsonp(text: &str) -> &str {
    match (text.find("({"), text.rfind("})")) {
        (Some(start), Some(end)) if end > start => &text[start + 1..end + 1],
        _ => text.trim(),
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_jsonp_unwraps_callback() {
        let wrapped = r#"callback_170({"image":"data:image/png;base64,AAAA"})"#;
        assert_eq!(strip_jsonp(wrapped), r#"{"image":"data:image/png;base64,AAAA"}"#);
    }

    #[test]
    fn test_strip_jsonp_passes_plain_json_through() {
        let plain = r#"  {"image":"AAAA"}  "#;
        assert_eq!(strip_jsonp(plain), r#"{"image":"AAAA"}"#);
    }
}
