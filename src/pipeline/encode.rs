//! Image encoding: file bytes → base64 JPEG wrapped in `ImageData`.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body. The scan is decoded and re-encoded
//! as JPEG regardless of its on-disk format: phone-camera scans of paper
//! registers compress very well as JPEG, and one canonical mime type keeps
//! the request body predictable. `detail: "high"` instructs GPT-4-class
//! models to use the full image tile budget; without it the small
//! handwritten figures in register cells are lost.

use crate::error::Scan2SheetError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Load the image at `path` and encode it as a base64 JPEG attachment.
pub fn encode_image(path: &Path) -> Result<ImageData, Scan2SheetError> {
    let bytes = std::fs::read(path).map_err(|e| Scan2SheetError::ImageEncoding {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    encode_bytes(&bytes, path)
}

/// Decode raw image bytes, re-encode as JPEG, and base64-wrap the result.
pub fn encode_bytes(bytes: &[u8], path: &Path) -> Result<ImageData, Scan2SheetError> {
    let encoding_err = |detail: String| Scan2SheetError::ImageEncoding {
        path: path.to_path_buf(),
        detail,
    };

    let img = image::load_from_memory(bytes).map_err(|e| encoding_err(e.to_string()))?;

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .map_err(|e| encoding_err(e.to_string()))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/jpeg").with_detail("high"))
}
