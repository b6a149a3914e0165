//! Decoding of images returned by a worker generation call.
//!
//! Workers return each image either as a raw base64 string or as a
//! `data:` URI. Some misconfigured workers return server-side file
//! paths instead; those are unusable here and are skipped with a
//! warning. A single undecodable entry never fails the batch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

/// Media type assumed when an entry does not declare one.
const DEFAULT_MEDIA_TYPE: &str = "image/png";

/// One decoded output image.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Media type, from the data URI when present.
    pub media_type: String,
}

/// Decode every usable image out of a generation response.
///
/// Entries that fail to decode are logged and skipped; the caller
/// decides whether an empty result is an error.
pub fn decode_images(response: &Value) -> Vec<GeneratedImage> {
    let Some(entries) = response.get("images").and_then(Value::as_array) else {
        tracing::warn!("Generation response carries no images array");
        return Vec::new();
    };

    let mut images = Vec::new();
    for entry in entries {
        let Some(data) = entry.as_str() else {
            tracing::debug!(entry = %entry, "Skipping non-string image entry");
            continue;
        };
        if let Some(image) = decode_entry(data) {
            tracing::debug!(bytes = image.bytes.len(), "Decoded generated image");
            images.push(image);
        }
    }

    if images.is_empty() {
        tracing::warn!("No usable images in generation response");
    }
    images
}

/// Decode one image entry, or `None` when it is unusable.
fn decode_entry(data: &str) -> Option<GeneratedImage> {
    let (media_type, payload) = if data.starts_with("data:image") {
        let comma = match data.find(',') {
            Some(i) if i + 1 < data.len() => i,
            _ => {
                tracing::warn!("Invalid image data URI (no payload after comma)");
                return None;
            }
        };
        (data_uri_media_type(&data[..comma]), &data[comma + 1..])
    } else if data.starts_with("Output/") || data.contains('/') {
        // A path on the remote worker's disk; the worker should have
        // returned encoded bytes instead.
        tracing::warn!(path = %data, "Received file path instead of image data");
        return None;
    } else {
        (DEFAULT_MEDIA_TYPE.to_string(), data)
    };

    match STANDARD.decode(payload) {
        Ok(bytes) if !bytes.is_empty() => Some(GeneratedImage { bytes, media_type }),
        Ok(_) => {
            tracing::warn!("Image entry decoded to zero bytes");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to decode base64 image data");
            None
        }
    }
}

/// Media type segment of a data URI header, e.g. `image/png` from
/// `data:image/png;base64`.
fn data_uri_media_type(header: &str) -> String {
    let media_type = header
        .strip_prefix("data:")
        .unwrap_or(header)
        .split(';')
        .next()
        .unwrap_or("");
    if media_type.is_empty() {
        DEFAULT_MEDIA_TYPE.to_string()
    } else {
        media_type.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
