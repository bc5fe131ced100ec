//! Decide whether fetched bytes are a usable logo image and fingerprint it.
//!
//! Vector input (SVG) is rasterized with resvg before decoding. Raster
//! input is decoded and verified with the `image` crate. The perceptual
//! hash is a 64-bit DCT mean hash from `img_hash`.

use img_hash::image::{self, DynamicImage, GenericImageView};
use img_hash::{HashAlg, HasherConfig};
use resvg::{tiny_skia, usvg};
use thiserror::Error;
use url::Url;

use crate::hash_store::PerceptualHash;

/// Longest edge of the bitmap an SVG is rendered to
const MAX_SVG_EDGE: f32 = 512.0;

/// What a response body claims to be, judged from its content type and URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    RasterImage,
    VectorImage,
    Unknown,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageCheckError {
    #[error("SVG conversion failed: {0}")]
    SvgConversion(String),

    #[error("Image validation failed: {0}")]
    Validation(String),

    #[error("Unsupported content type '{0}'")]
    UnsupportedContentType(String),
}

/// Classify a response by declared content type, falling back to the URL
/// path for SVG files served with a generic type.
pub fn classify_content(content_type: &str, url: &str) -> ContentKind {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("svg") || url_path_is_svg(url) {
        ContentKind::VectorImage
    } else if content_type.contains("image") || content_type.contains("octet-stream") {
        ContentKind::RasterImage
    } else {
        ContentKind::Unknown
    }
}

fn url_path_is_svg(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".svg"),
        Err(_) => url.to_ascii_lowercase().ends_with(".svg"),
    }
}

/// Validate `bytes` as an image and return its perceptual hash.
///
/// Pure and idempotent: the same input always yields the same verdict and
/// the same hash.
pub fn validate_image(bytes: &[u8], content_type: &str, url: &str) -> Result<PerceptualHash, ImageCheckError> {
    match classify_content(content_type, url) {
        ContentKind::VectorImage => {
            let png = rasterize_svg(bytes).map_err(ImageCheckError::SvgConversion)?;
            let img = decode_raster(&png).map_err(ImageCheckError::SvgConversion)?;
            Ok(perceptual_hash(&img))
        }
        ContentKind::RasterImage => {
            let img = decode_raster(bytes).map_err(ImageCheckError::Validation)?;
            Ok(perceptual_hash(&img))
        }
        ContentKind::Unknown => Err(ImageCheckError::UnsupportedContentType(content_type.to_string())),
    }
}

/// Run [`validate_image`] on the blocking pool; decoding and hashing are
/// CPU-bound and must not stall the fetch tasks.
pub async fn validate_image_blocking(
    bytes: Vec<u8>,
    content_type: String,
    url: String,
) -> Result<PerceptualHash, ImageCheckError> {
    tokio::task::spawn_blocking(move || validate_image(&bytes, &content_type, &url))
        .await
        .unwrap_or_else(|e| Err(ImageCheckError::Validation(format!("image task failed: {}", e))))
}

fn decode_raster(bytes: &[u8]) -> Result<DynamicImage, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(format!("image has empty dimensions {}x{}", width, height));
    }
    Ok(img)
}

/// Render SVG markup to PNG bytes
pub fn rasterize_svg(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &options).map_err(|e| e.to_string())?;

    let size = tree.size().to_int_size();
    let longest = size.width().max(size.height()) as f32;
    let scale = if longest > MAX_SVG_EDGE { MAX_SVG_EDGE / longest } else { 1.0 };
    let width = ((size.width() as f32 * scale).round() as u32).max(1);
    let height = ((size.height() as f32 * scale).round() as u32).max(1);

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| format!("cannot allocate {}x{} canvas", width, height))?;
    resvg::render(&tree, tiny_skia::Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| e.to_string())
}

/// 64-bit perceptual hash of a decoded image
pub fn perceptual_hash(img: &DynamicImage) -> PerceptualHash {
    let hasher = HasherConfig::new()
        .hash_size(8, 8)
        .preproc_dct()
        .hash_alg(HashAlg::Mean)
        .to_hasher();

    PerceptualHash::from_bytes(hasher.hash_image(img).as_bytes().to_vec())
}
