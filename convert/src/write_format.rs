use std::{borrow::Cow, io::Write};

use image::{ColorType, DynamicImage, GenericImageView, ImageEncoder, ImageFormat};
use thiserror::Error;

pub const WEBP_QUALITY: f32 = 85.0;
pub const JPEG_QUALITY: u8 = 90;

/// The encodings that variants can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Pick the output encoding for a decoded source image.
    ///
    /// With conversion enabled everything becomes WebP. Otherwise PNG stays PNG and every other
    /// source falls back to JPEG.
    pub fn for_source(source: ImageFormat, convert_webp: bool) -> Self {
        if convert_webp {
            return Self::Webp;
        }

        match source {
            ImageFormat::Png => Self::Png,
            _ => Self::Jpeg,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Returns the extension that an output file should use, given the extension of the original.
    /// The original extension is kept when it already names this encoding, so `photo.jpeg`
    /// produces `photo_small.jpeg` rather than `photo_small.jpg`.
    pub fn extension_for<'a>(&self, original_extension: &'a str) -> Cow<'a, str> {
        let original = original_extension.trim_start_matches('.');
        let keep = match self {
            Self::Webp => original.eq_ignore_ascii_case("webp"),
            Self::Jpeg => ["jpg", "jpeg", "jpe"]
                .iter()
                .any(|e| original.eq_ignore_ascii_case(e)),
            Self::Png => original.eq_ignore_ascii_case("png"),
        };

        if keep {
            Cow::Borrowed(original)
        } else {
            Cow::Borrowed(self.extension())
        }
    }
}

impl From<OutputFormat> for ImageFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Webp => ImageFormat::WebP,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

fn to_8bit(image: &'_ DynamicImage) -> Cow<'_, DynamicImage> {
    let input_color = image.color();
    match (input_color.has_alpha(), input_color.bytes_per_pixel() > 1) {
        (_, false) => Cow::Borrowed(image),
        (false, true) => Cow::Owned(DynamicImage::from(image.to_rgb8())),
        (true, true) => Cow::Owned(DynamicImage::from(image.to_rgba8())),
    }
}

fn write_png(image: &DynamicImage, writer: impl Write) -> Result<(), image::ImageError> {
    let encoder = image::codecs::png::PngEncoder::new_with_quality(
        writer,
        image::codecs::png::CompressionType::Best,
        image::codecs::png::FilterType::Adaptive,
    );

    let image = to_8bit(image);
    let (width, height) = image.dimensions();
    encoder.write_image(image.as_bytes(), width, height, image.color())
}

fn write_webp(image: &DynamicImage, mut writer: impl Write) -> Result<(), std::io::Error> {
    // libwebp only takes interleaved RGB or RGBA, so grayscale input gets expanded too.
    let (layout, image) = if image.color().has_alpha() {
        (
            webp::PixelLayout::Rgba,
            DynamicImage::from(image.to_rgba8()),
        )
    } else {
        (webp::PixelLayout::Rgb, DynamicImage::from(image.to_rgb8()))
    };

    let (width, height) = image.dimensions();
    let encoder = webp::Encoder::new(image.as_bytes(), layout, width, height);
    let output = encoder.encode(WEBP_QUALITY);

    writer.write_all(&output)
}

fn write_jpeg(image: &DynamicImage, mut writer: impl Write) -> Result<(), image::ImageError> {
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);

    // JPEG has no alpha channel.
    let image = match image.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
        _ => Cow::Owned(DynamicImage::from(image.to_rgb8())),
    };
    let (width, height) = image.dimensions();

    encoder.write_image(image.as_bytes(), width, height, image.color())
}

pub fn write_image(
    image: &DynamicImage,
    output_format: OutputFormat,
    writer: impl Write,
) -> Result<(), EncodeError> {
    match output_format {
        OutputFormat::Png => write_png(image, writer)?,
        OutputFormat::Webp => write_webp(image, writer)?,
        OutputFormat::Jpeg => write_jpeg(image, writer)?,
    };

    Ok(())
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error(transparent)]
    ImageError(image::ImageError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl From<image::ImageError> for EncodeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => EncodeError::IoError(e),
            _ => EncodeError::ImageError(err),
        }
    }
}
