use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Utc;
use image::GenericImageView;
use tracing::{event, instrument, Level};
use uuid::Uuid;
use variant_worker_convert::{self as convert, DecodedImage, OutputFormat};
use variant_worker_db::{
    images::{ImageRecord, NewVariantImage},
    new_uuid, ImageStore, ImageVariant, ProcessingStatus,
};
use variant_worker_storage::BlobStore;

use crate::{
    variants::{sibling_path, variant_filename, VariantSpec, VARIANTS},
    Error, Result,
};

/// Why an image was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    /// Already processed, or not an original.
    Ineligible,
    /// Another worker claimed the image first.
    ClaimLost,
    /// The record store could not be reached, so nothing was changed.
    StoreUnavailable,
}

/// The step at which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    ReadOriginal,
    Decode,
    Variant(ImageVariant),
    /// All variants were stored but the final status could not be written.
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed { variants: usize },
    Failed(FailedStep),
    Skipped(SkipReason),
}

/// Everything written during one run, so it can be removed if a later step fails.
#[derive(Debug, Default)]
struct Attempt {
    paths: Vec<String>,
    rows: Vec<Uuid>,
}

/// Generates the variants of a single original image and tracks its processing status.
pub struct Pipeline {
    store: Arc<dyn ImageStore>,
    blobs: Arc<dyn BlobStore>,
    io_timeout: Duration,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ImageStore>, blobs: Arc<dyn BlobStore>, io_timeout: Duration) -> Self {
        Self {
            store,
            blobs,
            io_timeout,
        }
    }

    async fn io<T, E>(&self, step: &'static str, f: impl Future<Output = Result<T, E>>) -> Result<T>
    where
        Error: From<E>,
    {
        match tokio::time::timeout(self.io_timeout, f).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout(step)),
        }
    }

    #[instrument(skip(self))]
    pub async fn process(&self, image_id: Uuid) -> Outcome {
        let image = match self.io("load image", self.store.get_image(image_id)).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                event!(Level::DEBUG, "Image not found");
                return Outcome::Skipped(SkipReason::NotFound);
            }
            Err(e) => {
                event!(Level::ERROR, error=%e, kind=e.error_kind(), "Failed to load image");
                return Outcome::Skipped(SkipReason::StoreUnavailable);
            }
        };

        if !image.is_eligible_for_processing() {
            event!(
                Level::INFO,
                status=%image.processing_status,
                variant=%image.variant,
                "Image is not eligible for processing"
            );
            return Outcome::Skipped(SkipReason::Ineligible);
        }

        match self.io("claim image", self.store.mark_processing(image_id)).await {
            Ok(true) => {}
            Ok(false) => {
                event!(Level::INFO, "Image was claimed by another worker");
                return Outcome::Skipped(SkipReason::ClaimLost);
            }
            Err(e) => {
                event!(Level::ERROR, error=%e, kind=e.error_kind(), "Failed to claim image");
                return Outcome::Skipped(SkipReason::StoreUnavailable);
            }
        }

        let convert_webp = match self
            .io("read settings", self.store.get_tenant_convert_webp(image.tenant_id))
            .await
        {
            Ok(convert_webp) => convert_webp,
            Err(e) => {
                event!(Level::WARN, error=%e, tenant_id=%image.tenant_id, "Failed to read tenant settings, converting to WebP");
                true
            }
        };

        let mut attempt = Attempt::default();
        match self.generate(&image, convert_webp, &mut attempt).await {
            Ok(()) => self.finish(&image, attempt).await,
            Err((step, e)) => {
                event!(Level::ERROR, error=%e, kind=e.error_kind(), ?step, "Image processing failed");
                self.clean_up(attempt).await;
                self.mark_failed(image.id).await;
                Outcome::Failed(step)
            }
        }
    }

    async fn generate(
        &self,
        image: &ImageRecord,
        convert_webp: bool,
        attempt: &mut Attempt,
    ) -> Result<(), (FailedStep, Error)> {
        let bytes = self
            .io("read original", self.blobs.read(&image.storage_path))
            .await
            .map_err(|e| (FailedStep::ReadOriginal, e))?;

        let decoded = decode(bytes)
            .await
            .map_err(|e| (FailedStep::Decode, e))?;
        let (width, height) = decoded.image.dimensions();
        event!(Level::INFO, width, height, format=?decoded.format, "Decoded original");

        if let Err(e) = self
            .io("update dimensions", self.store.update_dimensions(image.id, width, height))
            .await
        {
            event!(Level::WARN, error=%e, "Failed to save original dimensions");
        }

        for spec in VARIANTS {
            self.generate_variant(image, &decoded, spec, convert_webp, attempt)
                .await
                .map_err(|e| (FailedStep::Variant(spec.variant), e))?;
        }

        Ok(())
    }

    #[instrument(skip_all, fields(variant = %spec.variant))]
    async fn generate_variant(
        &self,
        image: &ImageRecord,
        decoded: &Arc<DecodedImage>,
        spec: &VariantSpec,
        convert_webp: bool,
        attempt: &mut Attempt,
    ) -> Result<()> {
        let format = OutputFormat::for_source(decoded.format, convert_webp);
        let source = decoded.clone();
        let fit = spec.fit_box();
        let converted =
            tokio::task::spawn_blocking(move || convert::convert(&source.image, format, &fit))
                .await??;

        let extension = format.extension_for(&image.extension).into_owned();
        let filename = variant_filename(image.file_stem(), spec, &extension);
        let path = sibling_path(&image.storage_path, &filename);
        let file_size = converted.bytes.len();
        event!(
            Level::INFO,
            %path,
            width = converted.width,
            height = converted.height,
            file_size,
            "Writing variant"
        );

        // Recorded before the write so that a write which times out after landing is still removed.
        attempt.paths.push(path.clone());
        self.io(
            "write variant",
            self.blobs
                .write(&path, Bytes::from(converted.bytes), format.content_type()),
        )
        .await?;

        let row = NewVariantImage {
            id: new_uuid(),
            tenant_id: image.tenant_id,
            imageable_type: image.imageable_type.clone(),
            imageable_id: image.imageable_id,
            parent_id: image.id,
            variant: spec.variant,
            filename,
            original_filename: image.original_filename.clone(),
            mime_type: format.content_type().to_string(),
            extension,
            width: i32::try_from(converted.width).unwrap_or(i32::MAX),
            height: i32::try_from(converted.height).unwrap_or(i32::MAX),
            file_size: i64::try_from(file_size).unwrap_or(i64::MAX),
            storage_driver: image.storage_driver.clone(),
            public_url: self.blobs.public_url(&path),
            storage_path: path,
            processing_status: ProcessingStatus::Completed,
            processed_at: Utc::now(),
        };

        let row_id = self
            .io("insert variant", self.store.insert_variant(row))
            .await?;
        attempt.rows.push(row_id);

        Ok(())
    }

    async fn finish(&self, image: &ImageRecord, attempt: Attempt) -> Outcome {
        match self
            .io("mark completed", self.store.update_status_completed(image.id))
            .await
        {
            Ok(()) => {
                event!(Level::INFO, variants = attempt.rows.len(), "Image processing completed");
                Outcome::Completed {
                    variants: attempt.rows.len(),
                }
            }
            Err(e) => {
                event!(Level::ERROR, error=%e, kind=e.error_kind(), "Failed to mark image completed");
                Outcome::Failed(FailedStep::Finish)
            }
        }
    }

    /// Remove the files and rows written during a failed run. Failures here are logged only.
    async fn clean_up(&self, attempt: Attempt) {
        for path in attempt.paths.iter().rev() {
            if let Err(e) = self.io("delete variant file", self.blobs.delete(path)).await {
                event!(Level::WARN, error=%e, %path, "Failed to delete variant file");
            }
        }

        for id in attempt.rows.iter().rev() {
            if let Err(e) = self.io("delete variant row", self.store.delete_variant(*id)).await {
                event!(Level::WARN, error=%e, variant_id=%id, "Failed to delete variant row");
            }
        }
    }

    async fn mark_failed(&self, image_id: Uuid) {
        if let Err(e) = self
            .io("mark failed", self.store.update_status(image_id, ProcessingStatus::Failed))
            .await
        {
            event!(Level::ERROR, error=%e, "Failed to mark image as failed");
        }
    }
}

async fn decode(bytes: Bytes) -> Result<Arc<DecodedImage>> {
    let decoded = tokio::task::spawn_blocking(move || convert::image_from_bytes(&bytes)).await??;
    Ok(Arc::new(decoded))
}
