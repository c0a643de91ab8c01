use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    images::{self, ImageRecord, NewVariantImage},
    settings::{self, ImageSettings, IMAGES_CATEGORY},
    ImageVariant, Pool, PoolExt, ProcessingStatus,
};

/// Reads and writes image records. This is the only source of truth for processing status.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>>;

    /// Move a pending original to `processing`. Returns false if the record was not eligible,
    /// which includes another worker having claimed it first.
    async fn mark_processing(&self, id: Uuid) -> Result<bool>;

    async fn update_status(&self, id: Uuid, status: ProcessingStatus) -> Result<()>;

    /// Set the status to `completed` and stamp `processed_at`.
    async fn update_status_completed(&self, id: Uuid) -> Result<()>;

    async fn update_dimensions(&self, id: Uuid, width: u32, height: u32) -> Result<()>;

    async fn insert_variant(&self, variant: NewVariantImage) -> Result<Uuid>;

    /// Remove a derived variant row. Originals are never deleted.
    async fn delete_variant(&self, id: Uuid) -> Result<()>;

    /// Whether the tenant wants variants converted to WebP. Defaults to true.
    async fn get_tenant_convert_webp(&self, tenant_id: Uuid) -> Result<bool>;

    /// IDs of pending originals created before `created_before`, oldest first.
    async fn list_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>>;
}

pub(crate) fn clamp_dimension(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// [ImageStore] backed by the Postgres `images` and `settings` tables.
#[derive(Clone)]
pub struct PgImageStore {
    pool: Pool,
}

impl PgImageStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ImageStore for PgImageStore {
    async fn get_image(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        self.pool
            .interact(move |conn| {
                images::table
                    .find(id)
                    .select(ImageRecord::as_select())
                    .first(conn)
                    .optional()
                    .map_err(Into::into)
            })
            .await
    }

    async fn mark_processing(&self, id: Uuid) -> Result<bool> {
        let updated = self
            .pool
            .interact(move |conn| {
                diesel::update(images::table)
                    .filter(images::id.eq(id))
                    .filter(images::variant.eq(ImageVariant::Original))
                    .filter(images::processing_status.eq(ProcessingStatus::Pending))
                    .set((
                        images::processing_status.eq(ProcessingStatus::Processing),
                        images::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)
                    .map_err(Error::from)
            })
            .await?;

        Ok(updated > 0)
    }

    async fn update_status(&self, id: Uuid, status: ProcessingStatus) -> Result<()> {
        self.pool
            .interact(move |conn| {
                diesel::update(images::table)
                    .filter(images::id.eq(id))
                    .set((
                        images::processing_status.eq(status),
                        images::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn update_status_completed(&self, id: Uuid) -> Result<()> {
        self.pool
            .interact(move |conn| {
                diesel::update(images::table)
                    .filter(images::id.eq(id))
                    .set((
                        images::processing_status.eq(ProcessingStatus::Completed),
                        images::processed_at.eq(diesel::dsl::now),
                        images::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn update_dimensions(&self, id: Uuid, width: u32, height: u32) -> Result<()> {
        let (width, height) = (clamp_dimension(width), clamp_dimension(height));
        self.pool
            .interact(move |conn| {
                diesel::update(images::table)
                    .filter(images::id.eq(id))
                    .set((
                        images::width.eq(width),
                        images::height.eq(height),
                        images::updated_at.eq(diesel::dsl::now),
                    ))
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn insert_variant(&self, variant: NewVariantImage) -> Result<Uuid> {
        self.pool
            .interact(move |conn| {
                diesel::insert_into(images::table)
                    .values(&variant)
                    .returning(images::id)
                    .get_result(conn)
                    .map_err(Into::into)
            })
            .await
    }

    async fn delete_variant(&self, id: Uuid) -> Result<()> {
        self.pool
            .interact(move |conn| {
                diesel::delete(images::table)
                    .filter(images::id.eq(id))
                    .filter(images::parent_id.is_not_null())
                    .execute(conn)?;
                Ok(())
            })
            .await
    }

    async fn get_tenant_convert_webp(&self, tenant_id: Uuid) -> Result<bool> {
        let settings = self
            .pool
            .interact(move |conn| {
                settings::table
                    .filter(settings::tenant_id.eq(tenant_id))
                    .filter(settings::category.eq(IMAGES_CATEGORY))
                    .select(settings::data)
                    .first::<ImageSettings>(conn)
                    .optional()
                    .map_err(Error::from)
            })
            .await?;

        Ok(settings.unwrap_or_default().convert_webp())
    }

    async fn list_stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>> {
        self.pool
            .interact(move |conn| {
                images::table
                    .filter(images::processing_status.eq(ProcessingStatus::Pending))
                    .filter(images::variant.eq(ImageVariant::Original))
                    .filter(images::created_at.lt(created_before))
                    .order(images::created_at.asc())
                    .limit(limit)
                    .select(images::id)
                    .load(conn)
                    .map_err(Into::into)
            })
            .await
    }
}
