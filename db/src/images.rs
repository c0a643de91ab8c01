use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

pub use crate::schema::images::*;
use crate::{
    enums::{ImageVariant, ProcessingStatus},
    schema::*,
};

#[derive(Clone, Debug, Queryable, Selectable, Identifiable)]
#[diesel(table_name = images)]
pub struct ImageRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// The kind of object that owns the image, e.g. "product" or "service".
    pub imageable_type: String,
    pub imageable_id: Uuid,
    /// For derived variants, the original image this was generated from.
    pub parent_id: Option<Uuid>,
    pub variant: ImageVariant,

    /// The stored filename, including the extension.
    pub filename: String,
    /// The filename as uploaded by the user.
    pub original_filename: Option<String>,
    pub mime_type: String,
    /// The file extension, without the leading dot.
    pub extension: String,

    pub width: Option<i32>,
    pub height: Option<i32>,
    pub file_size: Option<i64>,

    pub storage_driver: String,
    /// The path of the image relative to the root of the storage backend.
    pub storage_path: String,
    pub public_url: Option<String>,

    pub processing_status: ProcessingStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Only originals that have not been picked up yet can go through the pipeline.
    pub fn is_eligible_for_processing(&self) -> bool {
        self.variant == ImageVariant::Original
            && self.processing_status == ProcessingStatus::Pending
    }

    /// The filename without its extension.
    pub fn file_stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && ext.eq_ignore_ascii_case(&self.extension) => {
                stem
            }
            _ => &self.filename,
        }
    }
}

/// A derived image row, written once the variant's bytes are in storage.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = images)]
pub struct NewVariantImage {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub imageable_type: String,
    pub imageable_id: Uuid,
    pub parent_id: Uuid,
    pub variant: ImageVariant,
    pub filename: String,
    pub original_filename: Option<String>,
    pub mime_type: String,
    pub extension: String,
    pub width: i32,
    pub height: i32,
    pub file_size: i64,
    pub storage_driver: String,
    pub storage_path: String,
    pub public_url: String,
    pub processing_status: ProcessingStatus,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use crate::test::original_image;

    #[test]
    fn file_stem_strips_matching_extension() {
        let mut image = original_image("tenants/a/photo.jpeg");
        image.filename = "photo.jpeg".to_string();
        image.extension = "jpeg".to_string();
        assert_eq!(image.file_stem(), "photo");

        image.filename = "PHOTO.JPEG".to_string();
        assert_eq!(image.file_stem(), "PHOTO");
    }

    #[test]
    fn file_stem_keeps_unrelated_names() {
        let mut image = original_image("tenants/a/photo");
        image.filename = "photo".to_string();
        image.extension = "png".to_string();
        assert_eq!(image.file_stem(), "photo");

        image.filename = "archive.tar.gz".to_string();
        image.extension = "png".to_string();
        assert_eq!(image.file_stem(), "archive.tar.gz");

        image.filename = ".png".to_string();
        assert_eq!(image.file_stem(), ".png");
    }

    #[test]
    fn eligibility() {
        let mut image = original_image("a.png");
        assert!(image.is_eligible_for_processing());

        image.processing_status = crate::ProcessingStatus::Processing;
        assert!(!image.is_eligible_for_processing());

        image.processing_status = crate::ProcessingStatus::Pending;
        image.variant = crate::ImageVariant::Small;
        assert!(!image.is_eligible_for_processing());
    }
}
