//! Подготовка постера события перед загрузкой.
//!
//! Проверка (`validate`) выполняется до любой сетевой активности. Сжатие
//! (`prepare`) - оптимизация без гарантий: при ошибке декодирования или
//! кодирования возвращается исходный файл.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::{debug, info, warn};

use crate::config::PosterConfig;
use crate::error::{AppError, AppResult};

pub const ACCEPTED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];
pub const JPEG_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosterFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PosterFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Результат подготовки: сжатый файл или исходный без изменений.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedPoster {
    Compressed(PosterFile),
    Original(PosterFile),
}

impl PreparedPoster {
    pub fn file(&self) -> &PosterFile {
        match self {
            PreparedPoster::Compressed(file) | PreparedPoster::Original(file) => file,
        }
    }

    pub fn into_file(self) -> PosterFile {
        match self {
            PreparedPoster::Compressed(file) | PreparedPoster::Original(file) => file,
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, PreparedPoster::Compressed(_))
    }
}

fn format_mib(bytes: usize) -> String {
    format!("{:.0} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Предварительная проверка типа и размера.
pub fn validate(file: &PosterFile, config: &PosterConfig) -> AppResult<()> {
    let content_type = file.content_type.trim().to_ascii_lowercase();
    if !ACCEPTED_MIME_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported image type '{}'. Please upload a JPEG, PNG, GIF or WebP image.",
            file.content_type
        )));
    }
    if file.size() > config.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "Image is too large ({} bytes). Maximum size is {}.",
            file.size(),
            format_mib(config.max_upload_bytes)
        )));
    }
    Ok(())
}

/// Синхронное сжатие. Файлы меньше порога возвращаются как есть.
pub fn compress(file: PosterFile, config: &PosterConfig) -> PreparedPoster {
    if file.size() < config.compression_threshold_bytes {
        return PreparedPoster::Original(file);
    }

    match reencode(&file.bytes, config) {
        Ok(bytes) => {
            info!(
                "Compressed poster {}: {} -> {} bytes",
                file.name,
                file.size(),
                bytes.len()
            );
            PreparedPoster::Compressed(PosterFile {
                name: file.name,
                content_type: JPEG_MIME_TYPE.to_string(),
                bytes,
            })
        }
        Err(e) => {
            warn!("Poster compression failed for {}, uploading original: {}", file.name, e);
            PreparedPoster::Original(file)
        }
    }
}

fn reencode(bytes: &[u8], config: &PosterConfig) -> image::ImageResult<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let scaled = scale_to_width(decoded, config.max_width);
    debug!("Re-encoding poster at {}x{}", scaled.width(), scaled.height());

    // JPEG без альфа-канала
    let rgb = DynamicImage::ImageRgb8(scaled.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), config.jpeg_quality);
    rgb.write_with_encoder(encoder)?;
    Ok(out)
}

fn scale_to_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if width <= max_width {
        return image;
    }
    let new_height = ((height as u64 * max_width as u64) / width as u64).max(1) as u32;
    image.resize_exact(max_width, new_height, FilterType::Triangle)
}

/// Асинхронная обёртка: сжатие выполняется одной блокирующей задачей.
pub async fn prepare(file: PosterFile, config: &PosterConfig) -> PreparedPoster {
    if file.size() < config.compression_threshold_bytes {
        return PreparedPoster::Original(file);
    }

    let config = config.clone();
    let fallback = file.clone();
    match tokio::task::spawn_blocking(move || compress(file, &config)).await {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!("Poster compression task failed: {}", e);
            PreparedPoster::Original(fallback)
        }
    }
}
