use std::borrow::Cow;

use image::{imageops, DynamicImage, GenericImageView};

/// A bounding box that an image must fit inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitBox {
    pub max_width: u32,
    pub max_height: u32,
}

impl FitBox {
    pub const fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

/// Compute the output size of fitting `width` x `height` into `bounds`, preserving aspect ratio.
///
/// Images that already fit keep their size. Otherwise the bounding dimension takes the box size
/// exactly and the other one is scaled down and truncated, never going below 1.
pub fn fit_dimensions(width: u32, height: u32, bounds: &FitBox) -> (u32, u32) {
    if width <= bounds.max_width && height <= bounds.max_height {
        return (width, height);
    }

    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(bounds.max_width), u64::from(bounds.max_height));

    if w * max_h > h * max_w {
        let scaled_height = (h * max_w / w).max(1);
        (bounds.max_width, scaled_height as u32)
    } else {
        let scaled_width = (w * max_h / h).max(1);
        (scaled_width as u32, bounds.max_height)
    }
}

pub fn resize_to_fit<'a>(input: &'a DynamicImage, bounds: &FitBox) -> Cow<'a, DynamicImage> {
    let (width, height) = input.dimensions();
    let (target_width, target_height) = fit_dimensions(width, height, bounds);

    if (target_width, target_height) == (width, height) {
        return Cow::Borrowed(input);
    }

    Cow::Owned(input.resize_exact(
        target_width,
        target_height,
        imageops::FilterType::Lanczos3,
    ))
}
