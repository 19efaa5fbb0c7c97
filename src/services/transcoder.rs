use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// File-to-file image re-encoding.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, src: &Path, dest: &Path) -> Result<()>;

    /// Content type of the files this transcoder produces
    fn content_type(&self) -> &str;
}

/// Re-encodes with the `image` crate, without resizing.
pub struct ImageTranscoder {
    format: ImageFormat,
}

impl ImageTranscoder {
    pub fn new(format: ImageFormat) -> Self {
        Self { format }
    }

    /// Picks the output format from a target extension such as `.webp`.
    pub fn for_extension(ext: &str) -> Result<Self> {
        let trimmed = ext.trim_start_matches('.');
        let format = ImageFormat::from_extension(trimmed)
            .ok_or_else(|| anyhow!("Unsupported target extension: {}", ext))?;
        if !matches!(
            format,
            ImageFormat::WebP | ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif
        ) {
            return Err(anyhow!("No encoder available for target extension: {}", ext));
        }
        Ok(Self::new(format))
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Converts the decoded image into a color type the output encoder accepts.
    fn prepare(img: DynamicImage, format: ImageFormat) -> DynamicImage {
        match format {
            // WebP does not support 16-bit or 32-bit float color spaces. Convert down to 8-bit.
            ImageFormat::WebP => match img.color() {
                image::ColorType::Rgba16 | image::ColorType::La16 | image::ColorType::Rgba32F => {
                    DynamicImage::ImageRgba8(img.to_rgba8())
                }
                image::ColorType::Rgb16 | image::ColorType::L16 | image::ColorType::Rgb32F => {
                    DynamicImage::ImageRgb8(img.to_rgb8())
                }
                _ => img,
            },
            ImageFormat::Jpeg => match img.color() {
                image::ColorType::L8 | image::ColorType::Rgb8 => img,
                _ => DynamicImage::ImageRgb8(img.to_rgb8()),
            },
            _ => img,
        }
    }

    fn encode_file(src: &Path, dest: &Path, format: ImageFormat) -> Result<()> {
        let img = image::io::Reader::open(src)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| anyhow!("Failed to decode {}: {}", src.display(), e))?;

        let img = Self::prepare(img, format);

        let mut writer = BufWriter::new(File::create(dest)?);
        img.write_to(&mut writer, format)
            .map_err(|e| anyhow!("Failed to encode {:?}: {}", format, e))?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for ImageTranscoder {
    async fn transcode(&self, src: &Path, dest: &Path) -> Result<()> {
        let format = self.format;
        let src: PathBuf = src.to_path_buf();
        let dest: PathBuf = dest.to_path_buf();

        tokio::task::spawn_blocking(move || Self::encode_file(&src, &dest, format))
            .await
            .map_err(|e| anyhow!("Transcode task failed to complete: {}", e))?
    }

    fn content_type(&self) -> &str {
        match self.format {
            ImageFormat::WebP => "image/webp",
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            _ => "application/octet-stream",
        }
    }
}
