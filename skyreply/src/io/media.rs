//! Local image loading for post attachments.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// MIME type assumed when the file signature is not recognized.
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Image bytes ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub alt: String,
}

/// Read an image file and sniff its MIME type from the content.
pub fn load_image(path: &Path, alt: &str) -> Result<ImageAttachment> {
    let bytes = fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    if bytes.is_empty() {
        return Err(anyhow!("image {} is empty", path.display()));
    }
    let mime = match infer::get(&bytes) {
        Some(kind) if matches!(kind.matcher_type(), infer::MatcherType::Image) => kind.mime_type(),
        Some(kind) => {
            return Err(anyhow!(
                "{} is not an image (detected {})",
                path.display(),
                kind.mime_type()
            ));
        }
        None => DEFAULT_IMAGE_MIME,
    };
    debug!(path = %path.display(), mime, size = bytes.len(), "loaded image");
    Ok(ImageAttachment {
        bytes,
        mime: mime.to_string(),
        alt: alt.to_string(),
    })
}
