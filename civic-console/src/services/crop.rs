use std::sync::Arc;

use base64::prelude::*;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};

use civic_shared::errors::{AppError, AppResult};

use crate::models::SolutionImageUpload;

pub const JPEG_QUALITY: u8 = 100;
const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Crop rectangle in on-screen (displayed) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Uploaded image bytes plus the size they were displayed at while cropping.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Arc<[u8]>,
    displayed_width: f64,
    displayed_height: f64,
}

impl SourceImage {
    pub fn new(bytes: impl Into<Arc<[u8]>>, displayed_width: f64, displayed_height: f64) -> Self {
        Self {
            bytes: bytes.into(),
            displayed_width,
            displayed_height,
        }
    }

    /// Accepts raw base64 or a `data:<mime>;base64,` URL.
    pub fn from_base64(payload: &str, displayed_width: f64, displayed_height: f64) -> AppResult<Self> {
        let encoded = match payload.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => payload,
        };
        let bytes = BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Validation(format!("source image is not valid base64: {e}")))?;
        Ok(Self::new(bytes, displayed_width, displayed_height))
    }
}

/// Self-contained JPEG payload ready for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    pub fn upload(&self) -> SolutionImageUpload {
        SolutionImageUpload {
            solution_image: self.data_url.clone(),
            original_width: self.width,
            original_height: self.height,
        }
    }
}

/// Crop state for one solution-image upload: the chosen source and, once the
/// user has finished dragging, the completed rectangle.
#[derive(Debug, Clone, Default)]
pub struct CropSession {
    source: Option<SourceImage>,
    completed: Option<CropRect>,
}

impl CropSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selecting a new source discards any earlier crop.
    pub fn select_source(&mut self, source: SourceImage) {
        self.source = Some(source);
        self.completed = None;
    }

    pub fn complete(&mut self, crop: CropRect) {
        self.completed = Some(crop);
    }

    pub fn reset(&mut self) {
        self.source = None;
        self.completed = None;
    }

    /// Decodes, crops and re-encodes on a blocking worker. Resolves exactly
    /// once; callers must not start a second encode before this one returns.
    pub async fn encode(&self) -> AppResult<EncodedImage> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| AppError::invalid_crop_state("no source image selected"))?;
        let crop = self
            .completed
            .ok_or_else(|| AppError::invalid_crop_state("crop has not been completed"))?;

        tokio::task::spawn_blocking(move || encode_cropped(&source, &crop))
            .await
            .map_err(|e| AppError::internal(format!("image encode task failed: {e}")))?
    }
}

/// Maps a displayed-pixel crop into natural-pixel space, clamped to the image.
/// Returns `(x, y, width, height)`, or `None` when nothing is left.
pub fn natural_rect(
    crop: &CropRect,
    scale_x: f64,
    scale_y: f64,
    natural_width: u32,
    natural_height: u32,
) -> Option<(u32, u32, u32, u32)> {
    let values = [crop.x, crop.y, crop.width, crop.height, scale_x, scale_y];
    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let x = ((crop.x * scale_x).round().max(0.0) as u32).min(natural_width);
    let y = ((crop.y * scale_y).round().max(0.0) as u32).min(natural_height);
    let width = ((crop.width * scale_x).round().max(0.0) as u32).min(natural_width - x);
    let height = ((crop.height * scale_y).round().max(0.0) as u32).min(natural_height - y);

    (width > 0 && height > 0).then_some((x, y, width, height))
}

fn encode_cropped(source: &SourceImage, crop: &CropRect) -> AppResult<EncodedImage> {
    if source.displayed_width <= 0.0 || source.displayed_height <= 0.0 {
        return Err(AppError::invalid_crop_state("displayed image size is unknown"));
    }

    let image = image::load_from_memory(&source.bytes)
        .map_err(|e| AppError::Validation(format!("source image could not be decoded: {e}")))?;

    let (natural_width, natural_height) = (image.width(), image.height());
    let scale_x = natural_width as f64 / source.displayed_width;
    let scale_y = natural_height as f64 / source.displayed_height;

    let (x, y, width, height) = natural_rect(crop, scale_x, scale_y, natural_width, natural_height)
        .ok_or_else(|| AppError::invalid_crop_state("crop region is empty"))?;

    let cropped = image.crop_imm(x, y, width, height).to_rgb8();

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(&cropped)
        .map_err(|e| AppError::internal(format!("jpeg encode failed: {e}")))?;

    tracing::debug!(x, y, width, height, bytes = buf.len(), "solution image encoded");

    Ok(EncodedImage {
        data_url: format!("{DATA_URL_PREFIX}{}", BASE64_STANDARD.encode(&buf)),
        width,
        height,
    })
}
