use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, RgbImage};

use crate::config::GalleryConfig;
use crate::errors::AppResult;

/// A file read into memory and ready for the upload pipeline.
#[derive(Debug, Clone)]
pub struct LoadedMedia {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl LoadedMedia {
    /// Reads a file from disk, guessing its MIME type from the extension.
    pub async fn read(path: &Path) -> AppResult<LoadedMedia> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archivo".to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(LoadedMedia {
            file_name,
            mime_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video")
    }
}

/// Shrinks large photos before upload. Videos, non-images, and files under
/// the configured threshold pass through untouched. A failed recompression
/// is logged and the original bytes are uploaded instead.
pub fn prepare_for_upload(media: LoadedMedia, config: &GalleryConfig) -> LoadedMedia {
    if !media.is_image() {
        log::debug!("{} is not an image, skipping compression", media.file_name);
        return media;
    }

    if (media.bytes.len() as u64) < config.compress_threshold_bytes {
        log::debug!(
            "{} is {} bytes, below the compression threshold",
            media.file_name,
            media.bytes.len()
        );
        return media;
    }

    match recompress(&media.bytes, config) {
        Ok(jpeg) => {
            log::info!(
                "Compressed {} from {} KB to {} KB",
                media.file_name,
                media.bytes.len() / 1024,
                jpeg.len() / 1024
            );

            let file_name = Path::new(&media.file_name)
                .with_extension("jpg")
                .to_string_lossy()
                .to_string();

            LoadedMedia {
                file_name,
                mime_type: "image/jpeg".to_string(),
                bytes: jpeg,
            }
        }
        Err(e) => {
            log::warn!(
                "Could not compress {}, uploading original: {}",
                media.file_name,
                e
            );
            media
        }
    }
}

/// Decodes, fits into the configured bounding box, flattens any alpha
/// channel onto white, and re-encodes as JPEG.
fn recompress(bytes: &[u8], config: &GalleryConfig) -> AppResult<Vec<u8>> {
    let mut img = image::load_from_memory(bytes)?;

    let (width, height) = img.dimensions();
    if width > config.max_dimension || height > config.max_dimension {
        log::debug!(
            "Resizing from {}x{} to fit within {}px",
            width,
            height,
            config.max_dimension
        );
        img = img.resize(config.max_dimension, config.max_dimension, FilterType::Lanczos3);
    }

    let flattened = flatten_onto_white(&img);

    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), config.jpeg_quality);
    flattened.write_with_encoder(encoder)?;

    Ok(output)
}

/// JPEG has no alpha channel, so transparent regions are composited onto
/// a white background first. PNGs with transparency otherwise come out
/// black after encoding.
fn flatten_onto_white(img: &image::DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let [r, g, b, a] = pixel.0;
        let blend = |channel: u8| -> u8 {
            ((channel as u16 * a as u16 + 255 * (255 - a) as u16) / 255) as u8
        };
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_media(name: &str, width: u32, height: u32, pixel: Rgba<u8>) -> LoadedMedia {
        let img = RgbaImage::from_pixel(width, height, pixel);
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        LoadedMedia {
            file_name: name.to_string(),
            mime_type: "image/png".to_string(),
            bytes,
        }
    }

    fn eager_config() -> GalleryConfig {
        GalleryConfig {
            compress_threshold_bytes: 1,
            max_dimension: 40,
            ..GalleryConfig::default()
        }
    }

    #[test]
    fn test_videos_pass_through_untouched() {
        let media = LoadedMedia {
            file_name: "vals.mp4".to_string(),
            mime_type: "video/mp4".to_string(),
            bytes: vec![0u8; 4096],
        };
        let original = media.bytes.clone();

        let prepared = prepare_for_upload(media, &eager_config());
        assert_eq!(prepared.file_name, "vals.mp4");
        assert_eq!(prepared.mime_type, "video/mp4");
        assert_eq!(prepared.bytes, original);
    }

    #[test]
    fn test_small_images_pass_through_untouched() {
        let media = png_media("mesa.png", 8, 8, Rgba([10, 20, 30, 255]));
        let original = media.bytes.clone();

        let prepared = prepare_for_upload(media, &GalleryConfig::default());
        assert_eq!(prepared.file_name, "mesa.png");
        assert_eq!(prepared.mime_type, "image/png");
        assert_eq!(prepared.bytes, original);
    }

    #[test]
    fn test_large_images_are_resized_and_renamed() {
        let media = png_media("retrato.png", 120, 60, Rgba([200, 100, 50, 255]));

        let prepared = prepare_for_upload(media, &eager_config());
        assert_eq!(prepared.file_name, "retrato.jpg");
        assert_eq!(prepared.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (40, 20));
    }

    #[test]
    fn test_images_within_bounds_keep_their_dimensions() {
        let media = png_media("anillo.png", 30, 20, Rgba([80, 80, 80, 255]));

        let prepared = prepare_for_upload(media, &eager_config());
        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (30, 20));
    }

    #[test]
    fn test_transparency_is_flattened_onto_white() {
        let media = png_media("velo.png", 16, 16, Rgba([255, 0, 0, 0]));

        let prepared = prepare_for_upload(media, &eager_config());
        assert_eq!(prepared.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&prepared.bytes).unwrap().to_rgb8();
        let center = decoded.get_pixel(8, 8);
        assert!(
            center.0.iter().all(|&c| c > 240),
            "expected near-white, got {:?}",
            center
        );
    }

    #[test]
    fn test_undecodable_bytes_fall_back_to_the_original() {
        let media = LoadedMedia {
            file_name: "roto.png".to_string(),
            mime_type: "image/png".to_string(),
            bytes: vec![0xAB; 4096],
        };
        let original = media.bytes.clone();

        let prepared = prepare_for_upload(media, &eager_config());
        assert_eq!(prepared.file_name, "roto.png");
        assert_eq!(prepared.bytes, original);
    }

    #[tokio::test]
    async fn test_read_guesses_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brindis.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let media = LoadedMedia::read(&path).await.unwrap();
        assert_eq!(media.file_name, "brindis.jpg");
        assert_eq!(media.mime_type, "image/jpeg");
        assert!(media.is_image());
        assert!(!media.is_video());
    }

    #[tokio::test]
    async fn test_read_of_missing_file_is_an_error() {
        let result = LoadedMedia::read(Path::new("/definitivamente/no/existe.png")).await;
        assert!(result.is_err());
    }
}
