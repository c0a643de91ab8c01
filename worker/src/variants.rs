use variant_worker_convert::FitBox;
use variant_worker_db::ImageVariant;

/// A size tier that every original is resized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub variant: ImageVariant,
    pub max_width: u32,
    pub max_height: u32,
}

impl VariantSpec {
    pub fn name(&self) -> &'static str {
        self.variant.as_str()
    }

    pub fn fit_box(&self) -> FitBox {
        FitBox::new(self.max_width, self.max_height)
    }
}

/// The variants generated for each original, in the order they are produced.
pub static VARIANTS: &[VariantSpec] = &[
    VariantSpec {
        variant: ImageVariant::Medium,
        max_width: 800,
        max_height: 800,
    },
    VariantSpec {
        variant: ImageVariant::Small,
        max_width: 350,
        max_height: 350,
    },
    VariantSpec {
        variant: ImageVariant::Thumb,
        max_width: 100,
        max_height: 100,
    },
];

/// `{stem}_{variant}.{extension}`
pub fn variant_filename(stem: &str, spec: &VariantSpec, extension: &str) -> String {
    format!("{}_{}.{}", stem, spec.name(), extension)
}

/// Place `filename` in the same directory as `original_path`.
pub fn sibling_path(original_path: &str, filename: &str) -> String {
    match original_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => format!("{dir}/{filename}"),
        _ => filename.to_string(),
    }
}
