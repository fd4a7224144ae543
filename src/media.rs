//! Post illustrations. An upload must declare an image content type and its
//! bytes must decode as an image. Accepted files are stored under
//! `media_root/posts/` with a generated name.

use image::ImageFormat;
use rocket::fs::TempFile;
use rocket::http::ContentType;
use rocket::tokio::fs;
use rocket::tokio::io::AsyncReadExt;
use rocket::tokio::task;
use std::io;
use std::path::Path;

use crate::types::ValidationError;

const UPLOAD_DIR: &str = "posts";

/// An uploaded image that passed, or is about to pass, validation. `path` is
/// relative to the media root.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub content_type: Option<ContentType>,
    /// The format the bytes decoded as, `None` when they did not decode.
    pub format: Option<ImageFormat>,
    pub path: String,
}

impl ImageUpload {
    pub fn new(content_type: Option<ContentType>, format: Option<ImageFormat>) -> ImageUpload {
        let extension = format
            .and_then(|format| format.extensions_str().first().copied())
            .map(str::to_owned)
            .or_else(|| {
                content_type
                    .as_ref()
                    .and_then(|ct| ct.extension())
                    .map(|ext| ext.as_str().to_owned())
            })
            .unwrap_or_else(|| "img".to_owned());
        let path = format!("{}/{}.{}", UPLOAD_DIR, uuid::Uuid::new_v4(), extension);
        ImageUpload {
            content_type,
            format,
            path,
        }
    }

    pub fn from_bytes(content_type: Option<ContentType>, bytes: &[u8]) -> ImageUpload {
        ImageUpload::new(content_type, decoded_format(bytes))
    }

    /// Reads the whole upload and decodes it off the async runtime.
    pub async fn inspect(file: &TempFile<'_>) -> io::Result<ImageUpload> {
        let bytes = read(file).await?;
        let format = task::spawn_blocking(move || decoded_format(&bytes))
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(ImageUpload::new(file.content_type().cloned(), format))
    }

    pub fn check(&self) -> Result<(), ValidationError> {
        if !is_image(self.content_type.as_ref()) {
            let declared = self
                .content_type
                .as_ref()
                .map(|ct| ct.to_string())
                .unwrap_or_else(|| "unknown".to_owned());
            Err(ValidationError::from(
                "image",
                format!("Upload a valid image, got {}", declared),
            ))
        } else if self.format.is_none() {
            Err(ValidationError::from(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            ))
        } else {
            Ok(())
        }
    }
}

// SVG is markup, not a raster image.
pub fn is_image(content_type: Option<&ContentType>) -> bool {
    match content_type {
        Some(ct) => ct.top().as_str().eq_ignore_ascii_case("image") && *ct != ContentType::SVG,
        None => false,
    }
}

/// The format of `bytes` if they fully decode as an image.
pub fn decoded_format(bytes: &[u8]) -> Option<ImageFormat> {
    let format = image::guess_format(bytes).ok()?;
    image::load_from_memory_with_format(bytes, format)
        .ok()
        .map(|_| format)
}

async fn read(file: &TempFile<'_>) -> io::Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(file.len() as usize);
    let reader = file.open().await?;
    rocket::tokio::pin!(reader);
    reader.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

pub async fn store(file: &mut TempFile<'_>, media_root: &Path, upload: &ImageUpload) -> io::Result<()> {
    let target = media_root.join(&upload.path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    file.move_copy_to(&target).await?;
    tracing::info!("stored image {}", upload.path);
    Ok(())
}

/// Removes a stored file. A file that cannot be removed is only logged.
pub async fn discard(media_root: &Path, path: &str) {
    match fs::remove_file(media_root.join(path)).await {
        Ok(()) => tracing::info!("removed image {}", path),
        Err(e) => tracing::warn!("could not remove image {}: {}", path, e),
    }
}
