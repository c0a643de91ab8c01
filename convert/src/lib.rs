use image::{DynamicImage, GenericImageView, ImageFormat};

pub use error::Error;
pub use resize::{fit_dimensions, resize_to_fit, FitBox};
pub use write_format::{EncodeError, OutputFormat};

pub mod error;
pub mod resize;
pub mod write_format;

/// A decoded source image along with the container format it was read from.
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

/// The encoded bytes of a single variant.
#[derive(Debug)]
pub struct ConvertedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
}

pub fn image_from_bytes(bytes: &[u8]) -> Result<DecodedImage, Error> {
    let format = image::guess_format(bytes).map_err(|e| Error::read_error(None, e))?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| Error::read_error(Some(format), e))?;

    Ok(DecodedImage { image, format })
}

/// Fit `image` inside `size` and encode it.
pub fn convert(
    image: &DynamicImage,
    format: OutputFormat,
    size: &FitBox,
) -> Result<ConvertedImage, EncodeError> {
    let resized = resize_to_fit(image, size);
    let (width, height) = resized.dimensions();

    let mut output = Vec::new();
    write_format::write_image(&resized, format, &mut output)?;

    Ok(ConvertedImage {
        bytes: output,
        width,
        height,
        format,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbImage};

    use super::*;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 200) as u8, (y % 200) as u8, 90])
        }));
        let mut output = Cursor::new(Vec::new());
        image.write_to(&mut output, format).unwrap();
        output.into_inner()
    }

    #[test]
    fn decode_reports_source_format() {
        let png = image_from_bytes(&encoded(20, 10, ImageFormat::Png)).unwrap();
        assert_eq!(png.format, ImageFormat::Png);
        assert_eq!(png.image.dimensions(), (20, 10));

        let jpeg = image_from_bytes(&encoded(20, 10, ImageFormat::Jpeg)).unwrap();
        assert_eq!(jpeg.format, ImageFormat::Jpeg);
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = image_from_bytes(b"definitely not an image").err().unwrap();
        assert!(matches!(err, Error::Read { format: None, .. }));
    }

    #[test]
    fn decode_rejects_truncated_image() {
        let mut bytes = encoded(64, 64, ImageFormat::Png);
        bytes.truncate(bytes.len() / 2);
        let err = image_from_bytes(&bytes).err().unwrap();
        assert!(matches!(
            err,
            Error::Read {
                format: Some(ImageFormat::Png),
                ..
            }
        ));
    }

    #[test]
    fn convert_fits_and_encodes() {
        let source = image_from_bytes(&encoded(400, 300, ImageFormat::Jpeg)).unwrap();
        let output = convert(&source.image, OutputFormat::Jpeg, &FitBox::new(100, 100)).unwrap();

        assert_eq!((output.width, output.height), (100, 75));
        assert_eq!(
            image::guess_format(&output.bytes).unwrap(),
            ImageFormat::Jpeg
        );
        let decoded = image::load_from_memory(&output.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 75));
    }

    #[test]
    #[cfg(feature = "test-slow")]
    fn convert_large_jpeg_into_every_tier() {
        let source = image_from_bytes(&encoded(4000, 3000, ImageFormat::Jpeg)).unwrap();
        let expected = [
            (FitBox::new(800, 800), (800, 600)),
            (FitBox::new(350, 350), (350, 262)),
            (FitBox::new(100, 100), (100, 75)),
        ];

        for (size, dims) in expected {
            let format = OutputFormat::for_source(source.format, false);
            let output = convert(&source.image, format, &size).unwrap();
            assert_eq!(output.format, OutputFormat::Jpeg);
            assert_eq!((output.width, output.height), dims);
        }
    }
}
