use async_trait::async_trait;
use bytes::Bytes;
use object_store::{path::Path, Attribute, Attributes, ObjectStore, PutOptions};
use tracing::{event, instrument, Level};

use crate::error::{Error, Result};

/// The operations the image pipeline needs from a storage backend.
///
/// Locations are `/`-separated paths relative to the root of the store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, location: &str) -> Result<Bytes>;

    async fn write(&self, location: &str, bytes: Bytes, content_type: &str) -> Result<()>;

    /// Delete an object. Deleting a location that does not exist succeeds.
    async fn delete(&self, location: &str) -> Result<()>;

    /// The URL at which the object at `location` is publicly reachable.
    fn public_url(&self, location: &str) -> String;
}

#[derive(Debug)]
pub struct Operator {
    pub operator: Box<dyn ObjectStore>,
    pub path_prefix: Option<Path>,
    /// Base URL for building public URLs. Object keys are appended to this.
    pub public_url_base: String,
    /// Send the content type along with each write. The local filesystem has nowhere to keep it.
    pub store_content_type: bool,
}

impl Operator {
    pub fn new(operator: Box<dyn ObjectStore>, public_url_base: impl Into<String>) -> Self {
        Self {
            operator,
            path_prefix: None,
            public_url_base: public_url_base.into(),
            store_content_type: true,
        }
    }

    pub fn with_store_content_type(mut self, store_content_type: bool) -> Self {
        self.store_content_type = store_content_type;
        self
    }

    pub fn with_path_prefix(mut self, prefix: Option<Path>) -> Self {
        self.path_prefix = prefix;
        self
    }

    fn make_full_path(&self, location: &str) -> Path {
        let location = Path::from(location);
        match &self.path_prefix {
            Some(prefix) => Path::from_iter(prefix.parts().chain(location.parts())),
            None => location,
        }
    }
}

#[async_trait]
impl BlobStore for Operator {
    #[instrument(skip(self))]
    async fn read(&self, location: &str) -> Result<Bytes> {
        let p = self.make_full_path(location);
        let result = self.operator.get(&p).await?;
        result.bytes().await.map_err(Error::from)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn write(&self, location: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        let p = self.make_full_path(location);
        let mut attributes = Attributes::new();
        if self.store_content_type {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }

        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.operator.put_opts(&p, bytes.into(), options).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, location: &str) -> Result<()> {
        let p = self.make_full_path(location);
        let err = match self.operator.delete(&p).await {
            Ok(()) => return Ok(()),
            Err(object_store::Error::NotFound { .. }) => None,
            Err(e) => Some(e),
        };

        // Some backends report a missing file as a generic delete failure, so check whether the
        // object is actually still there.
        if let Some(err) = err {
            match self.operator.head(&p).await {
                Err(object_store::Error::NotFound { .. }) => {}
                _ => return Err(Error::from(err)),
            }
        }

        event!(Level::DEBUG, %p, "Object was already absent");
        Ok(())
    }

    fn public_url(&self, location: &str) -> String {
        let p = self.make_full_path(location);
        join_url(&self.public_url_base, p.as_ref())
    }
}

pub(crate) fn join_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
